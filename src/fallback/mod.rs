//! Keyword-frequency matching over a static rule set.
//!
//! Used when vector retrieval cannot answer. A rule matches when one of its
//! keywords occurs as a substring of the lowercased query; its score is the
//! number of distinct keywords that occur.
pub mod structurer;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum RuleLoadError {
    #[error("failed to read rules file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid rules file {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

/// A rule payload as supplied: bare text, or text with a type and keywords.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleContent {
    PlainText(String),
    Structured {
        text: String,
        #[serde(rename = "type", default = "default_rule_kind")]
        kind: String,
        #[serde(default)]
        keywords: Vec<String>,
    },
}

fn default_rule_kind() -> String {
    "rule".to_string()
}

impl RuleContent {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::PlainText(text) | Self::Structured { text, .. } => text,
        }
    }

    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        match self {
            Self::PlainText(_) => None,
            Self::Structured { kind, .. } => Some(kind),
        }
    }

    fn raw_keywords(&self) -> &[String] {
        match self {
            Self::PlainText(_) => &[],
            Self::Structured { keywords, .. } => keywords,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleEntry {
    pub id: String,
    pub content: RuleContent,
    /// Case-folded, deduplicated, in first-seen order.
    pub keywords: Vec<String>,
}

impl RuleEntry {
    #[must_use]
    pub fn new(id: impl Into<String>, content: RuleContent) -> Self {
        let mut keywords: Vec<String> = Vec::new();
        for kw in content.raw_keywords() {
            let folded = kw.trim().to_lowercase();
            if !folded.is_empty() && !keywords.contains(&folded) {
                keywords.push(folded);
            }
        }
        Self {
            id: id.into(),
            content,
            keywords,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        self.content.text()
    }

    /// Number of this rule's keywords contained in `query_lower`.
    #[must_use]
    pub fn score(&self, query_lower: &str) -> usize {
        self.keywords
            .iter()
            .filter(|kw| query_lower.contains(kw.as_str()))
            .count()
    }
}

/// A rule that passed the threshold, with its score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch<'a> {
    pub rule: &'a RuleEntry,
    pub score: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleMatcher {
    rules: BTreeMap<String, RuleEntry>,
}

impl RuleMatcher {
    /// Insert or replace a rule.
    pub fn add_rule(&mut self, id: impl Into<String>, content: RuleContent) {
        let entry = RuleEntry::new(id, content);
        self.rules.insert(entry.id.clone(), entry);
    }

    pub fn extend(&mut self, rules: impl IntoIterator<Item = (String, RuleContent)>) {
        for (id, content) in rules {
            self.add_rule(id, content);
        }
    }

    /// Load a JSON object of `{id: "text" | {text, type, keywords}}`.
    pub fn from_json_file(path: &Path) -> Result<Self, RuleLoadError> {
        let data = std::fs::read_to_string(path).map_err(|source| RuleLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let raw: BTreeMap<String, RuleContent> =
            serde_json::from_str(&data).map_err(|source| RuleLoadError::Json {
                path: path.display().to_string(),
                source,
            })?;

        let mut matcher = Self::default();
        matcher.extend(raw);
        info!("Loaded {} fallback rules from {}", matcher.len(), path.display());
        Ok(matcher)
    }

    #[must_use]
    pub fn get_rule(&self, id: &str) -> Option<&RuleEntry> {
        self.rules.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rule id to rule text for every rule scoring above `threshold`.
    #[must_use]
    pub fn match_query(&self, query: &str, threshold: usize) -> BTreeMap<String, String> {
        self.match_scored(query, threshold)
            .into_iter()
            .map(|m| (m.rule.id.clone(), m.rule.text().to_string()))
            .collect()
    }

    /// Matching rules ordered by score, highest first, then by id.
    #[must_use]
    pub fn match_scored(&self, query: &str, threshold: usize) -> Vec<RuleMatch<'_>> {
        let query_lower = query.to_lowercase();
        let mut matches: Vec<RuleMatch<'_>> = self
            .rules
            .values()
            .filter_map(|rule| {
                let score = rule.score(&query_lower);
                (score > threshold).then_some(RuleMatch { rule, score })
            })
            .collect();
        matches.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.rule.id.cmp(&b.rule.id)));
        matches
    }
}
