//! Chunk storage and the nearest-neighbor index built over it.
//!
//! A `ChunkStore` is immutable once built. The index, when present, holds
//! exactly one vector per chunk in chunk order; re-indexing produces a new
//! store instead of mutating this one.
pub mod flat;
pub mod models;
pub mod persist;

use thiserror::Error;

pub use flat::FlatIndex;
pub use models::{Chunk, Neighbor};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid index dimension: {0}")]
    InvalidDimension(usize),

    #[error("vector {position} has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        position: usize,
        expected: usize,
        actual: usize,
    },

    #[error("index holds {vectors} vectors but there are {chunks} chunks")]
    CountMismatch { vectors: usize, chunks: usize },

    #[error("chunk store has no vector index")]
    NotIndexed,

    #[error("corrupt index data: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkStore {
    chunks: Vec<Chunk>,
    index: Option<FlatIndex>,
}

impl ChunkStore {
    /// A store without embeddings. Only the lexical path can use it.
    #[must_use]
    pub fn unindexed(chunks: Vec<Chunk>) -> Self {
        Self {
            chunks,
            index: None,
        }
    }

    pub fn indexed(chunks: Vec<Chunk>, index: FlatIndex) -> Result<Self, StoreError> {
        if index.len() != chunks.len() {
            return Err(StoreError::CountMismatch {
                vectors: index.len(),
                chunks: chunks.len(),
            });
        }
        Ok(Self {
            chunks,
            index: Some(index),
        })
    }

    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    #[must_use]
    pub fn index(&self) -> Option<&FlatIndex> {
        self.index.as_ref()
    }

    #[must_use]
    pub fn is_indexed(&self) -> bool {
        self.index.as_ref().is_some_and(|i| !i.is_empty())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Whether `other` holds the same chunk texts for the same documents.
    /// Used to decide whether a persisted index still matches the corpus.
    #[must_use]
    pub fn same_chunks(&self, other: &[Chunk]) -> bool {
        self.chunks.len() == other.len()
            && self
                .chunks
                .iter()
                .zip(other)
                .all(|(a, b)| a.document_id == b.document_id && a.content == b.content)
    }

    /// Nearest chunks to `query`, closest first, with squared L2 distances.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(&Chunk, f32)>, StoreError> {
        let index = self.index.as_ref().ok_or(StoreError::NotIndexed)?;
        let hits = index.search(query, k)?;
        Ok(hits
            .into_iter()
            .filter_map(|n| self.chunks.get(n.index).map(|c| (c, n.distance)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(doc: &str, position: usize, content: &str) -> Chunk {
        Chunk {
            document_id: doc.to_string(),
            position,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_indexed_rejects_count_mismatch() {
        let index = FlatIndex::build(2, &[vec![1.0, 0.0]]).unwrap();
        let err = ChunkStore::indexed(vec![chunk("a", 0, "x"), chunk("a", 1, "y")], index)
            .unwrap_err();
        assert!(matches!(err, StoreError::CountMismatch { vectors: 1, chunks: 2 }));
    }

    #[test]
    fn test_search_maps_back_to_chunks() {
        let index = FlatIndex::build(2, &[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        let store =
            ChunkStore::indexed(vec![chunk("a", 0, "east"), chunk("b", 0, "north")], index)
                .unwrap();
        let hits = store.search(&[0.0, 1.0], 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.content, "north");
        assert_eq!(hits[0].1, 0.0);
    }

    #[test]
    fn test_unindexed_search_errors() {
        let store = ChunkStore::unindexed(vec![chunk("a", 0, "x")]);
        assert!(!store.is_indexed());
        assert!(matches!(store.search(&[1.0], 1), Err(StoreError::NotIndexed)));
    }

    #[test]
    fn test_same_chunks_ignores_positions() {
        let store = ChunkStore::unindexed(vec![chunk("a", 0, "x")]);
        assert!(store.same_chunks(&[chunk("a", 7, "x")]));
        assert!(!store.same_chunks(&[chunk("b", 0, "x")]));
        assert!(!store.same_chunks(&[]));
    }
}
