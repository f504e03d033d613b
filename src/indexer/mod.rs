//! Chunking and index construction.
pub mod chunker;
pub mod core;

pub use chunker::{ChunkOptions, chunk_document};
pub use self::core::{IndexError, IndexSource, Indexer, chunk_corpus};
