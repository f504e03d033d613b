//! Section extraction.
//!
//! A section header is a run of digits with optional uppercase letters, a
//! period and whitespace (`3A. Consolidated Allowance ...`). Its content runs
//! until the next line that starts with another header, or the end of text.
//!
//! Every discovered id is committed under all of its lookup spellings, and the
//! spellings share one `Arc<str>` so they can never diverge.
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::query::normalize::section_id_variants;

/// Candidate ids anywhere in the text (table-of-contents style scan).
static TOC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+[A-Z]*)\.\s+").expect("toc regex is valid"));
/// Headers at the start of a line.
static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(\d+[A-Z]*)\.\s+").expect("header regex is valid"));
/// Where a section ends: a newline followed by the next header id.
static BOUNDARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\d+[A-Z]*\.").expect("boundary regex is valid"));

/// Sections of every loaded document, keyed `"{document}:{section}"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionMap {
    entries: BTreeMap<String, Arc<str>>,
}

impl SectionMap {
    #[must_use]
    pub fn key(document_id: &str, section_id: &str) -> String {
        format!("{document_id}:{section_id}")
    }

    pub fn get(&self, document_id: &str, section_id: &str) -> Option<&str> {
        self.entries
            .get(&Self::key(document_id, section_id))
            .map(|s| &**s)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// `(section id, content)` pairs belonging to one document, sorted by id.
    pub fn sections_of<'a>(
        &'a self,
        document_id: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        let prefix = format!("{document_id}:");
        self.entries
            .range(prefix.clone()..)
            .take_while(move |(k, _)| k.starts_with(&prefix))
            .map(move |(k, v)| (&k[document_id.len() + 1..], &**v))
    }

    /// Distinct section ids of one document in their canonical spelling
    /// (uppercase, no trailing period).
    #[must_use]
    pub fn section_ids(&self, document_id: &str) -> Vec<String> {
        let ids: BTreeSet<String> = self
            .sections_of(document_id)
            .map(|(id, _)| id.trim_end_matches('.').to_uppercase())
            .collect();
        ids.into_iter().collect()
    }

    /// Store `content` under every spelling of `section_id`.
    pub fn commit(&mut self, document_id: &str, section_id: &str, content: &str) {
        let shared: Arc<str> = Arc::from(content);
        for variant in section_id_variants(section_id) {
            self.entries
                .insert(Self::key(document_id, &variant), Arc::clone(&shared));
        }
    }

    /// Merge another map in; later entries overwrite.
    pub fn extend(&mut self, other: SectionMap) {
        self.entries.extend(other.entries);
    }
}

/// Extract every section of `text` into a map keyed by `document_id`.
///
/// Returns an empty map when the text has no recognizable headers.
#[must_use]
pub fn extract_sections(text: &str, document_id: &str) -> SectionMap {
    let boundaries: Vec<usize> = BOUNDARY_RE.find_iter(text).map(|m| m.start()).collect();
    let mut sections = SectionMap::default();

    // Pass 1: collect candidate ids, then re-search each one. Later occurrences
    // overwrite earlier ones so a body header beats its table-of-contents line.
    let mut candidate_ids: Vec<&str> = Vec::new();
    for caps in TOC_RE.captures_iter(text) {
        if let Some(id) = caps.get(1).map(|m| m.as_str()) {
            if !candidate_ids.contains(&id) {
                candidate_ids.push(id);
            }
        }
    }

    for id in candidate_ids {
        for start in occurrences(text, id) {
            let content = section_body(text, start, &boundaries);
            if !content.is_empty() {
                sections.commit(document_id, id, content);
            }
        }
    }

    // Pass 2: line-anchored headers the first pass missed. First writer wins.
    for caps in HEADER_RE.captures_iter(text) {
        let Some(id) = caps.get(1) else { continue };
        if sections.contains_key(&SectionMap::key(document_id, id.as_str())) {
            continue;
        }
        let content = section_body(text, id.start(), &boundaries);
        if !content.is_empty() {
            sections.commit(document_id, id.as_str(), content);
        }
    }

    sections
}

/// Byte offsets where `id` appears as a header (`id.` + whitespace) and is
/// not the tail of a longer id such as `13A` for `3A`.
fn occurrences(text: &str, id: &str) -> Vec<usize> {
    let pattern = format!(r"{}\.\s+", regex::escape(id));
    let Ok(re) = Regex::new(&pattern) else {
        return Vec::new();
    };

    re.find_iter(text)
        .map(|m| m.start())
        .filter(|&start| {
            text[..start]
                .chars()
                .next_back()
                .is_none_or(|prev| !prev.is_ascii_digit() && !prev.is_ascii_uppercase())
        })
        .collect()
}

fn section_body<'t>(text: &'t str, start: usize, boundaries: &[usize]) -> &'t str {
    let end = boundaries
        .iter()
        .copied()
        .find(|&b| b > start)
        .unwrap_or(text.len());
    text[start..end].trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: &str = "\
1. Short title.
2. Definitions.
3A. Consolidated Allowance to Ministers.

1. Short title. These rules may be called the Ministers Rules.
2. Definitions. In these rules, unless the context otherwise requires.
3A. Consolidated Allowance to Ministers. Each Minister shall receive a consolidated allowance.
It is payable monthly.
13A. Travelling allowance. Ministers travelling on duty are entitled to an allowance.";

    #[test]
    fn test_all_variants_identical() {
        let map = extract_sections(RULES, "ministers");
        let canonical = map.get("ministers", "3A").unwrap();
        for variant in ["3A", "3a", "3A.", "3a."] {
            assert_eq!(map.get("ministers", variant), Some(canonical), "variant {variant}");
        }
    }

    #[test]
    fn test_body_occurrence_beats_toc_line() {
        let map = extract_sections(RULES, "ministers");
        let section = map.get("ministers", "3A").unwrap();
        assert!(section.starts_with("3A. Consolidated Allowance to Ministers. Each Minister"));
        assert!(section.ends_with("It is payable monthly."));
    }

    #[test]
    fn test_id_suffix_is_not_confused_with_longer_id() {
        let map = extract_sections(RULES, "ministers");
        let section = map.get("ministers", "3A").unwrap();
        assert!(!section.contains("Travelling"));
        assert!(map.get("ministers", "13a").unwrap().starts_with("13A. Travelling"));
    }

    #[test]
    fn test_single_paragraph_document() {
        let text = "3A. Consolidated Allowance to Ministers. Ministers receive X.";
        let map = extract_sections(text, "docA");
        assert_eq!(map.get("docA", "3a."), Some(text));
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn test_no_headers_is_empty() {
        let map = extract_sections("Plain prose with no numbered clauses at all.", "doc");
        assert!(map.is_empty());
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let a = extract_sections(RULES, "ministers");
        let b = extract_sections(RULES, "ministers");
        assert_eq!(a, b);
    }

    #[test]
    fn test_sections_of_document() {
        let mut map = extract_sections(RULES, "ministers");
        map.extend(extract_sections("7. Leave. Leave is a privilege.", "leave"));
        let ids: Vec<&str> = map.sections_of("leave").map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["7", "7."]);
        assert!(map.sections_of("ministers").all(|(_, body)| !body.contains("privilege")));
    }

    #[test]
    fn test_section_ids_are_canonical_and_distinct() {
        let map = extract_sections(RULES, "ministers");
        assert_eq!(map.section_ids("ministers"), vec!["1", "13A", "2", "3A"]);
        assert!(map.section_ids("missing").is_empty());
    }
}
