//! Passage retrieval.
//!
//! The lexical path ([`lexical`]) always works off the loaded text. The vector
//! path ([`vector`]) needs an embedder and a built index and returns nothing
//! when either is missing. Scores from the two paths are on different scales
//! and are never compared with each other.
pub mod lexical;
pub mod vector;

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::generation::GenerationError;

pub use lexical::LexicalRetriever;
pub use vector::{RetrievedChunk, VectorRetriever};

/// Which step produced the passage of an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Section,
    Title,
    Keyword,
    FlexibleTitle,
    Vector,
    FallbackRules,
    None,
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Section => "section",
            Self::Title => "title",
            Self::Keyword => "keyword",
            Self::FlexibleTitle => "flexible_title",
            Self::Vector => "vector",
            Self::FallbackRules => "fallback_rules",
            Self::None => "none",
        };
        f.write_str(name)
    }
}

/// Evidence text together with its owning document.
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    pub document_id: String,
    pub text: String,
    /// Relevance on the producing method's own scale.
    pub score: f64,
    pub method: MatchMethod,
}

/// A document left open for the caller to choose.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub document_id: String,
    pub relevance: f64,
    pub passage: Passage,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// One document won; its passage is the answer evidence.
    Resolved(Passage),
    /// Several documents are comparably relevant, sorted by relevance
    /// descending. The caller must pick one.
    Ambiguous(Vec<Candidate>),
}

impl SearchOutcome {
    #[must_use]
    pub fn candidate_ids(&self) -> Vec<String> {
        match self {
            Self::Resolved(p) => vec![p.document_id.clone()],
            Self::Ambiguous(candidates) => {
                candidates.iter().map(|c| c.document_id.clone()).collect()
            }
        }
    }
}

/// Why a search produced nothing. Each variant renders as the message shown
/// to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoMatch {
    Section {
        id: String,
        document: Option<String>,
    },
    Title {
        title: String,
    },
    General,
}

impl fmt::Display for NoMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Section { id, document: None } => write!(
                f,
                "I couldn't find any specific information about section {id}. Please try a different query."
            ),
            Self::Section {
                id,
                document: Some(doc),
            } => write!(
                f,
                "I couldn't find any specific information about section {id} in {doc}. Please try a different query."
            ),
            Self::Title { title } => write!(
                f,
                "I couldn't find specific information about '{title}'. Please try a different query or check the exact wording."
            ),
            Self::General => f.write_str(
                "I couldn't find specific information related to your query. Please try a different question.",
            ),
        }
    }
}

/// Per-query failure taxonomy. None of these reach the caller as an error;
/// the orchestrator turns each into a well-formed response.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("The document information is not available.")]
    DataUnavailable,

    #[error("{0}")]
    NoMatch(NoMatch),

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_match_messages() {
        assert_eq!(
            NoMatch::Title {
                title: "leave rules".into()
            }
            .to_string(),
            "I couldn't find specific information about 'leave rules'. Please try a different query or check the exact wording."
        );
        assert!(
            NoMatch::Section {
                id: "9Z".into(),
                document: None
            }
            .to_string()
            .contains("section 9Z.")
        );
    }

    #[test]
    fn test_candidate_ids() {
        let passage = |doc: &str| Passage {
            document_id: doc.to_string(),
            text: String::new(),
            score: 1.0,
            method: MatchMethod::Keyword,
        };
        let outcome = SearchOutcome::Ambiguous(vec![
            Candidate {
                document_id: "b".into(),
                relevance: 4.0,
                passage: passage("b"),
            },
            Candidate {
                document_id: "a".into(),
                relevance: 3.0,
                passage: passage("a"),
            },
        ]);
        assert_eq!(outcome.candidate_ids(), vec!["b", "a"]);
        assert_eq!(
            SearchOutcome::Resolved(passage("x")).candidate_ids(),
            vec!["x"]
        );
    }

    #[test]
    fn test_method_names() {
        assert_eq!(MatchMethod::FlexibleTitle.to_string(), "flexible_title");
        assert_eq!(
            serde_json::to_string(&MatchMethod::FallbackRules).unwrap(),
            "\"fallback_rules\""
        );
    }
}
