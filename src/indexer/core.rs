use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::corpus::Document;
use crate::embedder::{Embedder, EmbedderError};
use crate::indexer::chunker::{ChunkOptions, chunk_document};
use crate::store::{Chunk, ChunkStore, FlatIndex, StoreError, persist};

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// How the chunk store for a snapshot was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSource {
    /// Loaded from `index_dir` and matching the current chunks.
    Persisted,
    /// Embedded from scratch.
    Built,
    /// No embedder available; lexical retrieval only.
    Unindexed,
}

pub struct Indexer<'a, E: Embedder + ?Sized> {
    pub embedder: &'a E,
    pub options: ChunkOptions,
}

impl<'a, E: Embedder + ?Sized> Indexer<'a, E> {
    pub fn new(embedder: &'a E, options: ChunkOptions) -> Self {
        Self { embedder, options }
    }

    /// Embed every chunk and build a fresh index. The result is complete
    /// before it is returned; nothing is published on failure.
    pub fn build(&self, chunks: Vec<Chunk>) -> Result<ChunkStore, IndexError> {
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let vectors = self.embedder.embed_batch(&texts)?;
        let index = FlatIndex::build(self.embedder.dimensions(), &vectors)?;
        info!(
            "Indexed {} chunks ({} dims)",
            chunks.len(),
            self.embedder.dimensions()
        );
        Ok(ChunkStore::indexed(chunks, index)?)
    }

    /// Reuse the persisted index in `index_dir` when it matches `chunks`,
    /// otherwise embed from scratch.
    pub fn build_or_reuse(
        &self,
        chunks: Vec<Chunk>,
        index_dir: &Path,
    ) -> Result<(ChunkStore, IndexSource), IndexError> {
        if persist::exists(index_dir) {
            match persist::load(index_dir) {
                Ok(store)
                    if store.same_chunks(&chunks)
                        && store
                            .index()
                            .is_some_and(|i| i.dimension() == self.embedder.dimensions()) =>
                {
                    info!("Reusing persisted index from {}", index_dir.display());
                    return Ok((store, IndexSource::Persisted));
                }
                Ok(_) => debug!("Persisted index is stale, rebuilding"),
                Err(e) => warn!("Ignoring unreadable index in {}: {e}", index_dir.display()),
            }
        }

        Ok((self.build(chunks)?, IndexSource::Built))
    }
}

/// Chunk every document in id order.
#[must_use]
pub fn chunk_corpus(documents: &BTreeMap<String, Document>, options: &ChunkOptions) -> Vec<Chunk> {
    documents
        .values()
        .flat_map(|doc| chunk_document(&doc.id, &doc.text, options))
        .collect()
}
