//! Derive fallback rules from raw document text.
//!
//! Sentences introduced by policy/procedure/requirement/rule wording become
//! typed rules. A document with none of those falls back to one rule per
//! substantial paragraph. Each rule carries its five most frequent
//! non-stopword terms as keywords.
use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::RuleContent;
use crate::query::normalize::paragraphs;

/// Ordered (rule type, pattern) table. Ids are numbered across the whole table.
static RULE_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("policy", r"(?i)(?:policy|policies)[\s:]+(.*?)(?:\.|$)"),
        ("procedure", r"(?i)(?:procedure|process)[\s:]+(.*?)(?:\.|$)"),
        (
            "requirement",
            r"(?i)(?:require|requirement|must|shall)[\s:]+(.*?)(?:\.|$)",
        ),
        ("rule", r"(?i)(?:rule\s+\d+[.\d]*|rule)[\s:]+(.*?)(?:\.|$)"),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("rule pattern is valid")))
    .collect()
});

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-zA-Z]{3,}\b").expect("word regex is valid"));

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "if", "because", "as", "what", "when", "where", "how",
    "all", "any", "both", "each", "few", "more", "some", "such", "no", "nor", "too", "very",
    "can", "will", "just", "should", "now", "to", "from", "of", "for", "with", "by", "about",
    "against", "between", "into", "through", "during", "before", "after", "above", "below", "on",
    "off", "over", "under", "again", "further", "then", "once", "here", "there", "why", "is",
    "are", "was", "were", "be", "been", "being", "have", "has", "had", "having", "do", "does",
    "did", "doing", "this", "that", "these", "those", "which",
];

const MAX_KEYWORDS: usize = 5;
const MIN_PARAGRAPH_CHARS: usize = 20;

/// Rules for one document, ids namespaced as `"{document}:{type}_{n}"`.
#[must_use]
pub fn derive_rules(document_id: &str, text: &str) -> Vec<(String, RuleContent)> {
    let mut rules = Vec::new();
    let mut counter = 1usize;

    for (kind, pattern) in RULE_PATTERNS.iter() {
        for m in pattern.find_iter(text) {
            let rule_text = m.as_str();
            rules.push((
                format!("{document_id}:{kind}_{counter}"),
                RuleContent::Structured {
                    text: rule_text.to_string(),
                    kind: (*kind).to_string(),
                    keywords: extract_keywords(rule_text),
                },
            ));
            counter += 1;
        }
    }

    if rules.is_empty() {
        for (i, paragraph) in paragraphs(text).enumerate() {
            let paragraph = paragraph.trim();
            if paragraph.chars().count() > MIN_PARAGRAPH_CHARS {
                rules.push((
                    format!("{document_id}:paragraph_{}", i + 1),
                    RuleContent::Structured {
                        text: paragraph.to_string(),
                        kind: "paragraph".to_string(),
                        keywords: extract_keywords(paragraph),
                    },
                ));
            }
        }
    }

    rules
}

/// The most frequent words of three or more letters, stopwords removed.
/// Ties keep first-occurrence order.
#[must_use]
pub fn extract_keywords(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for word in WORD_RE.find_iter(&lowered).map(|m| m.as_str()) {
        if STOPWORDS.contains(&word) {
            continue;
        }
        let count = counts.entry(word).or_insert(0);
        if *count == 0 {
            order.push(word);
        }
        *count += 1;
    }

    // Stable sort keeps first-seen order among equal counts.
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    order
        .into_iter()
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_by_frequency_without_stopwords() {
        let kws = extract_keywords("The leave policy: leave is granted. Leave needs approval and approval is rare.");
        assert_eq!(kws[0], "leave");
        assert_eq!(kws[1], "approval");
        assert!(!kws.contains(&"the".to_string()));
        assert!(kws.len() <= 5);
    }

    #[test]
    fn test_keyword_ties_keep_first_seen_order() {
        assert_eq!(
            extract_keywords("zeta alpha beta"),
            vec!["zeta", "alpha", "beta"]
        );
    }

    #[test]
    fn test_typed_rules_are_numbered_across_types() {
        let text = "Leave policy: apart from holidays no leave is paid. Employees must submit forms.";
        let rules = derive_rules("hr", text);
        let ids: Vec<&str> = rules.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["hr:policy_1", "hr:requirement_2"]);
        assert_eq!(rules[0].1.kind(), Some("policy"));
        assert!(rules[0].1.text().starts_with("policy: apart from holidays"));
    }

    #[test]
    fn test_paragraph_fallback() {
        let text = "Ministers are entitled to a residence.\n\nShort.\n\nA car is provided for official use.";
        let rules = derive_rules("ministers", text);
        let ids: Vec<&str> = rules.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["ministers:paragraph_1", "ministers:paragraph_3"]);
        assert_eq!(rules[1].1.kind(), Some("paragraph"));
    }

    #[test]
    fn test_empty_text_has_no_rules() {
        assert!(derive_rules("empty", "").is_empty());
    }
}
