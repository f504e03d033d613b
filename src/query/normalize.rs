//! Text normalization shared by the classifier, the section store and the
//! lexical ranker.
use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static NON_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\s]").expect("non-word regex is valid"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex is valid"));
static PARAGRAPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("paragraph regex is valid"));

/// All spellings a section id may be looked up under.
///
/// Order is stable: uppercase, lowercase, then both with a trailing period.
/// Duplicates (e.g. purely numeric ids) are collapsed.
#[must_use]
pub fn section_id_variants(id: &str) -> Vec<String> {
    let base = id.trim().trim_end_matches('.');
    if base.is_empty() {
        return Vec::new();
    }

    let upper = base.to_uppercase();
    let lower = base.to_lowercase();
    let candidates = [
        upper.clone(),
        lower.clone(),
        format!("{upper}."),
        format!("{lower}."),
    ];

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

/// Replace punctuation and digits with spaces and collapse whitespace.
#[must_use]
pub fn clean_text(text: &str) -> String {
    let stripped = NON_WORD_RE.replace_all(text, " ");
    WHITESPACE_RE.replace_all(&stripped, " ").trim().to_string()
}

/// Split a document into blank-line delimited paragraphs.
pub fn paragraphs(text: &str) -> impl Iterator<Item = &str> {
    PARAGRAPH_RE.split(text)
}

/// Capitalize the first letter of every whitespace-separated word.
#[must_use]
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}

/// Take at most `max_chars` characters from the start of `text`.
#[must_use]
pub fn char_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Append `word` unless it is already present.
pub(crate) fn push_unique(list: &mut Vec<String>, word: impl Into<String>) {
    let word = word.into();
    if !word.is_empty() && !list.contains(&word) {
        list.push(word);
    }
}
