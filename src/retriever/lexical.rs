//! Lexical retrieval: exact section lookup, then title, keyword and
//! flexible-title scoring over blank-line paragraphs.
//!
//! Each document contributes at most one passage. Documents are then ranked
//! by relevance; a clear winner (at least `disambiguation_ratio` times the
//! runner-up) is returned directly, otherwise every match is handed back for
//! the caller to choose from.
use tracing::debug;

use super::{Candidate, MatchMethod, NoMatch, Passage, QueryError, SearchOutcome};
use crate::config::RetrievalConfig;
use crate::corpus::{CorpusSnapshot, Document};
use crate::query::normalize::{char_prefix, paragraphs, title_case};
use crate::query::{ClassifiedQuery, QueryClassification, RouteMatch};

#[derive(Debug, Clone)]
pub struct LexicalRetriever {
    settings: RetrievalConfig,
}

/// Best paragraph of one document before cross-document ranking.
struct DocumentMatch<'a> {
    document_id: &'a str,
    score: f64,
    text: String,
    method: MatchMethod,
}

impl LexicalRetriever {
    #[must_use]
    pub fn new(settings: RetrievalConfig) -> Self {
        Self { settings }
    }

    /// Search `snapshot` for `query`.
    ///
    /// `selected` is an explicit caller choice and restricts every path to
    /// that document. Without it, a keyword-routed auto-selection restricts
    /// the title and keyword paths when that document is loaded.
    pub fn search(
        &self,
        snapshot: &CorpusSnapshot,
        query: &ClassifiedQuery,
        selected: Option<&str>,
    ) -> Result<SearchOutcome, QueryError> {
        if snapshot.is_empty() {
            return Err(QueryError::DataUnavailable);
        }

        match &query.classification {
            QueryClassification::Section { ids } => self.search_section(snapshot, ids, selected),
            QueryClassification::Title { title, keywords } => {
                self.search_text(snapshot, Some(title), keywords, &query.route, selected)
            }
            QueryClassification::FreeText { keywords } => {
                self.search_text(snapshot, None, keywords, &query.route, selected)
            }
        }
    }

    fn search_section(
        &self,
        snapshot: &CorpusSnapshot,
        ids: &[String],
        selected: Option<&str>,
    ) -> Result<SearchOutcome, QueryError> {
        let base_id = ids.first().map(String::as_str).unwrap_or_default();
        let section_passage = |document_id: &str, text: &str| Passage {
            document_id: document_id.to_string(),
            text: text.to_string(),
            score: 1.0,
            method: MatchMethod::Section,
        };

        if let Some(doc) = selected {
            if let Some(text) = ids.iter().find_map(|id| snapshot.sections.get(doc, id)) {
                return Ok(SearchOutcome::Resolved(section_passage(doc, text)));
            }

            // Any section of the chosen document whose id contains the request.
            let needle = base_id.to_lowercase();
            if let Some((sec_id, text)) = snapshot
                .sections
                .sections_of(doc)
                .find(|(sec_id, _)| sec_id.to_lowercase().contains(&needle))
            {
                debug!(requested = base_id, found = sec_id, "flexible section match");
                return Ok(SearchOutcome::Resolved(section_passage(doc, text)));
            }

            return Err(QueryError::NoMatch(NoMatch::Section {
                id: base_id.to_string(),
                document: Some(doc.to_string()),
            }));
        }

        let mut found: Vec<Passage> = snapshot
            .document_ids()
            .filter_map(|doc| {
                ids.iter()
                    .find_map(|id| snapshot.sections.get(doc, id))
                    .map(|text| section_passage(doc, text))
            })
            .collect();

        match found.len() {
            0 => Err(QueryError::NoMatch(NoMatch::Section {
                id: base_id.to_string(),
                document: None,
            })),
            1 => Ok(SearchOutcome::Resolved(found.remove(0))),
            _ => Ok(SearchOutcome::Ambiguous(
                found
                    .into_iter()
                    .map(|p| Candidate {
                        document_id: p.document_id.clone(),
                        relevance: p.score,
                        passage: p,
                    })
                    .collect(),
            )),
        }
    }

    fn search_text(
        &self,
        snapshot: &CorpusSnapshot,
        title: Option<&String>,
        keywords: &[String],
        route: &RouteMatch,
        selected: Option<&str>,
    ) -> Result<SearchOutcome, QueryError> {
        let title = title.map(String::as_str);
        let selected = selected.or_else(|| {
            route
                .auto_selected
                .as_deref()
                .filter(|doc| snapshot.document(doc).is_some())
        });

        let search_docs: Vec<&Document> = match selected {
            Some(doc) => snapshot.document(doc).into_iter().collect(),
            None => snapshot.documents.values().collect(),
        };

        let mut matches: Vec<DocumentMatch<'_>> = Vec::new();

        if let Some(title) = title {
            matches.extend(search_docs.iter().filter_map(|doc| {
                self.title_passage(&doc.text, title).map(|text| DocumentMatch {
                    document_id: &doc.id,
                    score: self.settings.title_match_score,
                    text,
                    method: MatchMethod::Title,
                })
            }));
        }

        if matches.is_empty() {
            matches.extend(search_docs.iter().filter_map(|doc| {
                best_paragraph(&doc.text, |para, lower| {
                    let hits = keywords
                        .iter()
                        .filter(|kw| lower.contains(kw.as_str()))
                        .count() as f64;
                    let bonus = match title {
                        Some(t) if lower.contains(t) || para.contains(&t.to_uppercase()) => {
                            self.settings.title_bonus
                        }
                        _ => 0.0,
                    };
                    hits + bonus
                })
                .map(|(score, text)| DocumentMatch {
                    document_id: &doc.id,
                    score,
                    text: text.to_string(),
                    method: MatchMethod::Keyword,
                })
            }));
        }

        if matches.is_empty() {
            let Some(title) = title else {
                return Err(QueryError::NoMatch(NoMatch::General));
            };

            let words: Vec<String> = title
                .split_whitespace()
                .filter(|w| w.chars().count() > 3)
                .map(str::to_lowercase)
                .collect();
            let weight = self.settings.flexible_word_weight;

            if !words.is_empty() {
                debug!(?words, "flexible title-word search");
                matches.extend(search_docs.iter().filter_map(|doc| {
                    best_paragraph(&doc.text, |_, lower| {
                        words.iter().filter(|w| lower.contains(w.as_str())).count() as f64 * weight
                    })
                    .map(|(score, text)| DocumentMatch {
                        document_id: &doc.id,
                        score,
                        text: text.to_string(),
                        method: MatchMethod::FlexibleTitle,
                    })
                }));
            }

            if matches.is_empty() {
                return Err(QueryError::NoMatch(NoMatch::Title {
                    title: title.to_string(),
                }));
            }
        }

        if let Some(doc) = selected {
            if let Some(pos) = matches.iter().position(|m| m.document_id == doc) {
                let m = matches.swap_remove(pos);
                return Ok(SearchOutcome::Resolved(Passage {
                    document_id: m.document_id.to_string(),
                    text: m.text,
                    score: m.score,
                    method: m.method,
                }));
            }
        }

        Ok(self.rank(matches, route))
    }

    /// Order matches by relevance and decide between one answer and a choice.
    fn rank(&self, matches: Vec<DocumentMatch<'_>>, route: &RouteMatch) -> SearchOutcome {
        let mut candidates: Vec<Candidate> = matches
            .into_iter()
            .map(|m| {
                let bonus = if route.routed.iter().any(|r| r == m.document_id) {
                    self.settings.route_bonus
                } else {
                    0.0
                };
                let relevance = m.score + bonus;
                Candidate {
                    document_id: m.document_id.to_string(),
                    relevance,
                    passage: Passage {
                        document_id: m.document_id.to_string(),
                        text: m.text,
                        score: relevance,
                        method: m.method,
                    },
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.relevance
                .total_cmp(&a.relevance)
                .then_with(|| a.document_id.cmp(&b.document_id))
        });
        debug!(
            ranking = ?candidates.iter().map(|c| (&c.document_id, c.relevance)).collect::<Vec<_>>(),
            "ranked documents"
        );

        let clear_winner = match candidates.as_slice() {
            [_] => true,
            [best, second, ..] => best.relevance >= second.relevance * self.settings.disambiguation_ratio,
            [] => false,
        };

        if clear_winner {
            SearchOutcome::Resolved(candidates.swap_remove(0).passage)
        } else {
            SearchOutcome::Ambiguous(candidates)
        }
    }

    /// The paragraph holding the title plus the paragraphs after it, bounded
    /// by the configured paragraph and character limits.
    fn title_passage(&self, text: &str, title: &str) -> Option<String> {
        let mut variants = vec![title.to_string()];
        for v in [title.to_uppercase(), title.to_lowercase(), title_case(title)] {
            if !variants.contains(&v) {
                variants.push(v);
            }
        }

        let variant = variants.iter().find(|v| text.contains(v.as_str()))?;
        let paragraph = paragraphs(text).find(|p| p.contains(variant.as_str()))?;
        let start = text.find(paragraph)?;

        let window = char_prefix(&text[start..], self.settings.title_context_chars);
        let passage = paragraphs(window)
            .take(self.settings.title_context_paragraphs)
            .collect::<Vec<_>>()
            .join("\n\n");
        Some(passage)
    }
}

/// Highest-scoring paragraph of `text`; the earliest wins ties. `score` gets
/// the paragraph and its lowercase form. Zero scores never match.
fn best_paragraph<F>(text: &str, score: F) -> Option<(f64, &str)>
where
    F: Fn(&str, &str) -> f64,
{
    let mut best: Option<(f64, &str)> = None;
    for para in paragraphs(text) {
        let s = score(para, &para.to_lowercase());
        if s > 0.0 && best.is_none_or(|(b, _)| s > b) {
            best = Some((s, para));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DocumentRoute;
    use crate::corpus::extract_sections;
    use crate::query::{DocumentRouter, QueryClassifier};

    fn snapshot(docs: &[(&str, &str)]) -> CorpusSnapshot {
        let mut snapshot = CorpusSnapshot::empty();
        for (id, text) in docs {
            snapshot.documents.insert(
                id.to_string(),
                Document {
                    id: id.to_string(),
                    text: text.to_string(),
                },
            );
            snapshot.sections.extend(extract_sections(text, id));
        }
        snapshot
    }

    fn classify(query: &str, routes: &[(&str, &[&str])]) -> ClassifiedQuery {
        let routes = routes
            .iter()
            .map(|(doc, kws)| DocumentRoute {
                document_id: doc.to_string(),
                keywords: kws.iter().map(|k| k.to_string()).collect(),
            })
            .collect();
        QueryClassifier::new(DocumentRouter::new(routes)).classify(query)
    }

    fn retriever() -> LexicalRetriever {
        LexicalRetriever::new(RetrievalConfig::default())
    }

    fn resolved(outcome: SearchOutcome) -> Passage {
        match outcome {
            SearchOutcome::Resolved(p) => p,
            other => panic!("expected a resolved passage, got {other:?}"),
        }
    }

    #[test]
    fn test_section_query_returns_section_verbatim() {
        let text = "3A. Consolidated Allowance to Ministers. Ministers receive X.";
        let snap = snapshot(&[("docA", text)]);
        let outcome = retriever()
            .search(&snap, &classify("what is 3A", &[]), None)
            .unwrap();

        assert_eq!(outcome.candidate_ids(), vec!["docA"]);
        let passage = resolved(outcome);
        assert_eq!(passage.text, text);
        assert_eq!(passage.method, MatchMethod::Section);
    }

    #[test]
    fn test_section_in_two_documents_is_ambiguous() {
        let snap = snapshot(&[
            ("alpha", "4. Leave. Alpha leave text."),
            ("beta", "4. Pay. Beta pay text."),
        ]);
        let outcome = retriever()
            .search(&snap, &classify("section 4", &[]), None)
            .unwrap();
        assert!(matches!(outcome, SearchOutcome::Ambiguous(_)));
        assert_eq!(outcome.candidate_ids(), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_selected_document_narrows_section_lookup() {
        let snap = snapshot(&[
            ("alpha", "4. Leave. Alpha leave text."),
            ("beta", "4. Pay. Beta pay text."),
        ]);
        let passage = resolved(
            retriever()
                .search(&snap, &classify("section 4", &[]), Some("beta"))
                .unwrap(),
        );
        assert_eq!(passage.document_id, "beta");
        assert!(passage.text.contains("Beta pay"));
    }

    #[test]
    fn test_flexible_section_match_in_selected_document() {
        let snap = snapshot(&[("rules", "12B. Special pay. Paid quarterly.")]);
        let passage = resolved(
            retriever()
                .search(&snap, &classify("section 12", &[]), Some("rules"))
                .unwrap(),
        );
        assert!(passage.text.starts_with("12B. Special pay"));
    }

    #[test]
    fn test_unknown_section_is_no_match() {
        let snap = snapshot(&[("rules", "1. Title. Text.")]);
        let err = retriever()
            .search(&snap, &classify("what is 9Z", &[]), None)
            .unwrap_err();
        assert!(matches!(
            err,
            QueryError::NoMatch(NoMatch::Section { ref id, document: None }) if id == "9Z"
        ));
    }

    #[test]
    fn test_title_match_takes_following_paragraphs() {
        let text = "Intro.\n\nLeave Travel Concession\n\nOnce in four years.\n\nHome town only.\n\nA\n\nB\n\nC";
        let snap = snapshot(&[("leave", text)]);
        let passage = resolved(
            retriever()
                .search(&snap, &classify("tell me about leave travel concession", &[]), None)
                .unwrap(),
        );

        assert_eq!(passage.method, MatchMethod::Title);
        assert_eq!(passage.score, 10.0);
        assert_eq!(
            passage.text,
            "Leave Travel Concession\n\nOnce in four years.\n\nHome town only.\n\nA\n\nB"
        );
    }

    #[test]
    fn test_clear_winner_is_resolved() {
        let snap = snapshot(&[
            ("alpha", "Pension gratuity and leave are settled together."),
            ("beta", "Pension is paid monthly."),
        ]);
        let passage = resolved(
            retriever()
                .search(&snap, &classify("pension gratuity leave", &[]), None)
                .unwrap(),
        );
        assert_eq!(passage.document_id, "alpha");
        assert_eq!(passage.method, MatchMethod::Keyword);
        assert_eq!(passage.score, 3.0);
    }

    #[test]
    fn test_comparable_documents_are_ambiguous_and_sorted() {
        let snap = snapshot(&[
            ("alpha", "Pension gratuity leave."),
            ("beta", "Pension gratuity leave and allowance."),
        ]);
        let outcome = retriever()
            .search(&snap, &classify("pension gratuity leave allowance", &[]), None)
            .unwrap();

        let SearchOutcome::Ambiguous(candidates) = outcome else {
            panic!("expected ambiguity");
        };
        assert_eq!(candidates[0].document_id, "beta");
        assert_eq!(candidates[0].relevance, 4.0);
        assert_eq!(candidates[1].document_id, "alpha");
        assert_eq!(candidates[1].relevance, 3.0);
    }

    #[test]
    fn test_route_bonus_breaks_a_tie() {
        let snap = snapshot(&[
            ("alpha", "Pension and gratuity rules."),
            ("beta", "Pension and gratuity rules."),
            ("gamma", "Nothing relevant."),
        ]);
        // Both alpha and gamma are routed, so nothing is auto-selected, but
        // alpha earns the bonus: 2 + 3 = 5 >= 1.5 * 2.
        let query = classify(
            "pension gratuity",
            &[("alpha", &["pension"]), ("gamma", &["gratuity"])],
        );
        assert!(query.route.auto_selected.is_none());
        let passage = resolved(retriever().search(&snap, &query, None).unwrap());
        assert_eq!(passage.document_id, "alpha");
        assert_eq!(passage.score, 5.0);
    }

    #[test]
    fn test_auto_selection_restricts_search() {
        let snap = snapshot(&[
            ("alpha", "Pension gratuity leave allowance."),
            ("beta", "Pension mentioned once."),
        ]);
        let query = classify("pension rules", &[("beta", &["pension"])]);
        let passage = resolved(retriever().search(&snap, &query, None).unwrap());
        assert_eq!(passage.document_id, "beta");
    }

    #[test]
    fn test_auto_selection_of_unloaded_document_is_ignored() {
        let snap = snapshot(&[("alpha", "Pension paid monthly.")]);
        let query = classify("pension", &[("missing", &["pension"])]);
        let passage = resolved(retriever().search(&snap, &query, None).unwrap());
        assert_eq!(passage.document_id, "alpha");
    }

    #[test]
    fn test_flexible_title_words() {
        // No keyword hits and the full phrase is absent, so only the
        // individual title words can match.
        let snap = snapshot(&[("rules", "Other text.\n\nHousing for officers.")]);
        let query = ClassifiedQuery {
            text: "housing allowance rules".to_string(),
            classification: QueryClassification::Title {
                title: "housing allowance rules".to_string(),
                keywords: Vec::new(),
            },
            route: RouteMatch::default(),
        };
        let passage = resolved(retriever().search(&snap, &query, None).unwrap());
        assert_eq!(passage.method, MatchMethod::FlexibleTitle);
        assert_eq!(passage.score, 2.0);
        assert_eq!(passage.text, "Housing for officers.");
    }

    #[test]
    fn test_title_anywhere_in_text_wins_over_keywords() {
        let snap = snapshot(&[
            ("alpha", "Housing is covered elsewhere."),
            ("beta", "Pay.\n\nHOUSING\n\nQuarters are allotted by seniority."),
        ]);
        let outcome = retriever()
            .search(&snap, &classify("show me housing", &[]), None)
            .unwrap();
        // Both documents contain a case variant of the title, each scores 10.
        assert!(matches!(outcome, SearchOutcome::Ambiguous(ref c) if c.len() == 2));
    }

    #[test]
    fn test_title_not_found_message() {
        let snap = snapshot(&[("rules", "Completely unrelated text.")]);
        let err = retriever()
            .search(&snap, &classify("tell me about zebra crossings", &[]), None)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "I couldn't find specific information about 'zebra crossings'. Please try a different query or check the exact wording."
        );
    }

    #[test]
    fn test_free_text_not_found_message() {
        let snap = snapshot(&[("rules", "Completely unrelated text.")]);
        let err = retriever()
            .search(&snap, &classify("pension", &[]), None)
            .unwrap_err();
        assert!(matches!(err, QueryError::NoMatch(NoMatch::General)));
    }

    #[test]
    fn test_empty_corpus_is_data_unavailable() {
        let err = retriever()
            .search(&CorpusSnapshot::empty(), &classify("anything", &[]), None)
            .unwrap_err();
        assert!(matches!(err, QueryError::DataUnavailable));
    }

    #[test]
    fn test_best_paragraph_prefers_earliest_on_tie() {
        let text = "pension one\n\npension two";
        let (score, para) = best_paragraph(text, |_, lower| {
            if lower.contains("pension") { 1.0 } else { 0.0 }
        })
        .unwrap();
        assert_eq!(score, 1.0);
        assert_eq!(para, "pension one");
    }
}
