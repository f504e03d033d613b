//! Embedding-based retrieval over the chunk index.
//!
//! Over-fetches `3 * top_k` neighbors, drops anything past the distance
//! cutoff, collapses near-duplicate chunks, and prefers chunks that share a
//! term with the query before backfilling with the rest.
use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::embedder::Embedder;
use crate::store::ChunkStore;

/// Tokens of the sorted-token fingerprint used for de-duplication.
const FINGERPRINT_TOKENS: usize = 20;
/// Query and chunk terms shorter than this are not counted as overlap.
const MIN_TERM_CHARS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub document_id: String,
    pub text: String,
    /// Squared L2 distance to the query embedding.
    pub distance: f32,
}

#[derive(Clone)]
pub struct VectorRetriever {
    embedder: Option<Arc<dyn Embedder>>,
    max_distance: f32,
}

impl VectorRetriever {
    pub fn new(embedder: Option<Arc<dyn Embedder>>, max_distance: f32) -> Self {
        Self {
            embedder,
            max_distance,
        }
    }

    /// Whether this retriever can answer against `store` at all.
    #[must_use]
    pub fn is_available(&self, store: &ChunkStore) -> bool {
        self.embedder.is_some() && store.is_indexed()
    }

    /// Up to `top_k` chunks relevant to `query`, nearest first within each
    /// preference tier. Empty whenever the model or index is missing or the
    /// query cannot be embedded.
    #[must_use]
    pub fn retrieve(&self, store: &ChunkStore, query: &str, top_k: usize) -> Vec<RetrievedChunk> {
        self.retrieve_in(store, query, top_k, None)
    }

    /// [`retrieve`](Self::retrieve) restricted to the chunks of `document`.
    /// The restriction applies before `top_k` truncation, so the whole index
    /// is searched when a document is given.
    #[must_use]
    pub fn retrieve_in(
        &self,
        store: &ChunkStore,
        query: &str,
        top_k: usize,
        document: Option<&str>,
    ) -> Vec<RetrievedChunk> {
        let Some(embedder) = &self.embedder else {
            debug!("No embedder configured, vector path unavailable");
            return Vec::new();
        };
        if !store.is_indexed() || top_k == 0 {
            return Vec::new();
        }

        let query_vec = match embedder.embed(query) {
            Ok(v) => v,
            Err(e) => {
                warn!("Query embedding failed: {e}");
                return Vec::new();
            }
        };

        let fetch = match document {
            Some(_) => store.len(),
            None => (top_k * 3).min(store.len()),
        };
        let hits = match store.search(&query_vec, fetch) {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Vector search failed: {e}");
                return Vec::new();
            }
        };

        let query_terms = terms(query);
        let mut seen = HashSet::new();
        let mut overlapping = Vec::new();
        let mut others = Vec::new();

        for (chunk, distance) in hits {
            if distance > self.max_distance {
                continue;
            }
            if document.is_some_and(|doc| chunk.document_id != doc) {
                continue;
            }
            if !seen.insert(fingerprint(&chunk.content)) {
                continue;
            }

            let retrieved = RetrievedChunk {
                document_id: chunk.document_id.clone(),
                text: chunk.content.clone(),
                distance,
            };
            if terms(&chunk.content).is_disjoint(&query_terms) {
                others.push(retrieved);
            } else {
                overlapping.push(retrieved);
            }
        }

        debug!(
            overlapping = overlapping.len(),
            others = others.len(),
            "vector candidates after filtering"
        );

        overlapping.extend(others);
        overlapping.truncate(top_k);
        overlapping
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|t| t.trim_matches(|c: char| c.is_ascii_punctuation()))
        .filter(|t| t.chars().count() >= MIN_TERM_CHARS)
        .map(str::to_lowercase)
        .collect()
}

/// First tokens of the sorted lowercase token list.
fn fingerprint(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut tokens: Vec<&str> = lowered.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.truncate(FINGERPRINT_TOKENS);
    tokens.join(" ")
}
