//! Query classification.
//!
//! Two ordered pattern tables decide what a query targets: the section table
//! runs first, then the title table. Within a table the first matching
//! pattern wins, so more specific patterns sit at the top.
use std::sync::LazyLock;

use regex::Regex;

use super::normalize::{clean_text, push_unique, section_id_variants};
use super::routing::{DocumentRouter, RouteMatch};

/// A named pattern plus the capture group that holds the extracted value.
pub struct QueryPattern {
    pub name: &'static str,
    pub regex: Regex,
    pub group: usize,
}

impl QueryPattern {
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            regex: Regex::new(pattern).expect("query pattern is valid"),
            group: 1,
        }
    }

    /// Run the pattern against an already-lowercased query.
    pub fn extract<'q>(&self, query: &'q str) -> Option<&'q str> {
        self.regex
            .captures(query)
            .and_then(|caps| caps.get(self.group))
            .map(|m| m.as_str())
    }
}

pub static SECTION_PATTERNS: LazyLock<Vec<QueryPattern>> = LazyLock::new(|| {
    vec![
        QueryPattern::new("what_is_section", r"what\s+is\s+(?:section\s+)?(\d+[a-z]*)"),
        QueryPattern::new(
            "tell_me_about_section",
            r"tell\s+(?:me\s+)?(?:about\s+)?(?:section\s+)?(\d+[a-z]*)",
        ),
        QueryPattern::new("section_keyword", r"section\s+(\d+[a-z]*)"),
        QueryPattern::new("bare_id", r"(?:^|\s)(\d+[a-z]*)(?:\s|$)"),
    ]
});

pub static TITLE_PATTERNS: LazyLock<Vec<QueryPattern>> = LazyLock::new(|| {
    vec![
        QueryPattern::new(
            "details_about",
            r"(?:information|details|points|content) (?:about|on|in|for|regarding) (.+)$",
        ),
        QueryPattern::new("tell_me_about", r"tell me about (.+)$"),
        QueryPattern::new("what_is", r"what (?:is|are) (.+)$"),
        QueryPattern::new("show_me", r"show me (.+)$"),
        QueryPattern::new(
            "give_me_all",
            r"give me (?:all|the) (?:information|details|points|content) (?:about|on|in|for|regarding) (.+)$",
        ),
    ]
});

/// What a query is after. Exactly one variant per query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryClassification {
    /// A specific section id, expanded to every lookup spelling.
    Section { ids: Vec<String> },
    /// A named section or topic. `keywords` carries the base keywords plus
    /// the title words and the full title phrase.
    Title { title: String, keywords: Vec<String> },
    FreeText { keywords: Vec<String> },
}

impl QueryClassification {
    #[must_use]
    pub fn keywords(&self) -> &[String] {
        match self {
            Self::Section { .. } => &[],
            Self::Title { keywords, .. } | Self::FreeText { keywords } => keywords,
        }
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Title { title, .. } => Some(title),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedQuery {
    pub text: String,
    pub classification: QueryClassification,
    pub route: RouteMatch,
}

#[derive(Debug, Clone, Default)]
pub struct QueryClassifier {
    router: DocumentRouter,
}

impl QueryClassifier {
    #[must_use]
    pub fn new(router: DocumentRouter) -> Self {
        Self { router }
    }

    pub fn classify(&self, query: &str) -> ClassifiedQuery {
        let query = query.trim();
        let route = self.router.route(query);
        let classification = classify_text(query);
        tracing::debug!(?classification, ?route, "classified query");

        ClassifiedQuery {
            text: query.to_string(),
            classification,
            route,
        }
    }
}

/// Classification without document routing.
#[must_use]
pub fn classify_text(query: &str) -> QueryClassification {
    let lowered = query.trim().to_lowercase();

    if let Some(ids) = detect_section(&lowered) {
        return QueryClassification::Section { ids };
    }

    let title = detect_title(&lowered);
    let keywords = extract_keywords(&lowered, title.as_deref());

    match title {
        Some(title) => QueryClassification::Title { title, keywords },
        None => QueryClassification::FreeText { keywords },
    }
}

fn detect_section(lowered: &str) -> Option<Vec<String>> {
    SECTION_PATTERNS.iter().find_map(|p| {
        let id = p.extract(lowered)?;
        tracing::trace!(pattern = p.name, id, "section pattern matched");
        let ids = section_id_variants(id);
        (!ids.is_empty()).then_some(ids)
    })
}

fn detect_title(lowered: &str) -> Option<String> {
    TITLE_PATTERNS.iter().find_map(|p| {
        let raw = p.extract(lowered)?;
        let title = raw.trim().trim_end_matches(['?', '.', '!']).trim();
        tracing::trace!(pattern = p.name, title, "title pattern matched");
        (!title.is_empty()).then(|| title.to_string())
    })
}

/// Base keywords are the cleaned tokens longer than three characters; title
/// words and the full title phrase are appended after them.
fn extract_keywords(lowered: &str, title: Option<&str>) -> Vec<String> {
    let cleaned = clean_text(lowered);
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();

    let mut keywords = Vec::new();
    for token in tokens.iter().filter(|t| t.chars().count() > 3) {
        push_unique(&mut keywords, *token);
    }

    if let Some(title) = title {
        for word in title.split_whitespace().filter(|w| w.chars().count() > 2) {
            push_unique(&mut keywords, word);
        }
        push_unique(&mut keywords, title);
    }

    if keywords.is_empty() {
        for token in tokens {
            push_unique(&mut keywords, token);
        }
    }

    keywords
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn classifier() -> QueryClassifier {
        QueryClassifier::new(DocumentRouter::new(Config::default().document_routes))
    }

    #[test]
    fn test_what_is_section() {
        assert_eq!(
            classify_text("what is 3A"),
            QueryClassification::Section {
                ids: vec!["3A".into(), "3a".into(), "3A.".into(), "3a.".into()]
            }
        );
    }

    #[test]
    fn test_section_keyword_pattern() {
        let c = classify_text("Please show Section 12 of the rules");
        assert_eq!(
            c,
            QueryClassification::Section {
                ids: vec!["12".into(), "12.".into()]
            }
        );
    }

    #[test]
    fn test_tell_me_about_section() {
        match classify_text("tell me about 9AB") {
            QueryClassification::Section { ids } => assert_eq!(ids[0], "9AB"),
            other => panic!("expected section, got {other:?}"),
        }
    }

    #[test]
    fn test_bare_id_token() {
        match classify_text("4B") {
            QueryClassification::Section { ids } => assert!(ids.contains(&"4b".to_string())),
            other => panic!("expected section, got {other:?}"),
        }
    }

    #[test]
    fn test_section_patterns_are_ordered() {
        // "what is section 5" must be captured by the first pattern, not the bare-id one.
        let first = &SECTION_PATTERNS[0];
        assert_eq!(first.extract("what is section 5"), Some("5"));
    }

    #[test]
    fn test_title_query_extracts_phrase_and_keywords() {
        match classify_text("Tell me about leave travel concession?") {
            QueryClassification::Title { title, keywords } => {
                assert_eq!(title, "leave travel concession");
                assert!(keywords.contains(&"leave".to_string()));
                assert!(keywords.contains(&"travel".to_string()));
                assert!(keywords.contains(&"concession".to_string()));
                assert_eq!(keywords.last().unwrap(), "leave travel concession");
                // Base keywords come before the appended title words
                assert_eq!(keywords[0], "tell");
            }
            other => panic!("expected title, got {other:?}"),
        }
    }

    #[test]
    fn test_details_about_pattern_wins_first() {
        let c = classify_text("give me all details about house rent");
        assert_eq!(c.title(), Some("house rent"));
    }

    #[test]
    fn test_free_text_keywords() {
        match classify_text("salary of ministers") {
            QueryClassification::FreeText { keywords } => {
                assert_eq!(keywords, vec!["salary".to_string(), "ministers".to_string()]);
            }
            other => panic!("expected free text, got {other:?}"),
        }
    }

    #[test]
    fn test_free_text_short_tokens_fallback() {
        match classify_text("pay da") {
            QueryClassification::FreeText { keywords } => {
                assert_eq!(keywords, vec!["pay".to_string(), "da".to_string()]);
            }
            other => panic!("expected free text, got {other:?}"),
        }
    }

    #[test]
    fn test_classifier_routes_documents() {
        let q = classifier().classify("minister salary");
        assert_eq!(
            q.route.auto_selected.as_deref(),
            Some("Gujarat_Ministers_Salaries_and_All")
        );
        assert!(matches!(
            q.classification,
            QueryClassification::FreeText { .. }
        ));
    }
}
