//! The loaded corpus as an immutable, versioned snapshot.
//!
//! Queries clone the current `Arc<CorpusSnapshot>` once and work against it
//! for their whole lifetime. A reload builds a complete new snapshot off to
//! the side and swaps it in with a single write, so readers never observe a
//! half-built index.
pub mod loader;
pub mod sections;

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{Mutex as TokioMutex, MutexGuard};

use crate::fallback::RuleMatcher;
use crate::store::ChunkStore;

pub use loader::{CorpusLoader, LoadReport};
pub use sections::{SectionMap, extract_sections};

#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("corpus directory unavailable: {0}")]
    DataUnavailable(String),

    #[error("failed to extract {path}: {source}")]
    Extraction {
        path: String,
        source: std::io::Error,
    },

    #[error("corpus reload interrupted: {0}")]
    Interrupted(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// File stem of the source file.
    pub id: String,
    pub text: String,
}

/// Human-readable form of a document id.
#[must_use]
pub fn display_name(document_id: &str) -> String {
    document_id.replace('_', " ")
}

#[derive(Debug, Clone)]
pub struct CorpusSnapshot {
    pub version: u64,
    pub loaded_at: DateTime<Utc>,
    pub documents: BTreeMap<String, Document>,
    pub sections: SectionMap,
    pub chunks: ChunkStore,
    pub rules: RuleMatcher,
}

impl CorpusSnapshot {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            version: 0,
            loaded_at: Utc::now(),
            documents: BTreeMap::new(),
            sections: SectionMap::default(),
            chunks: ChunkStore::default(),
            rules: RuleMatcher::default(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    #[must_use]
    pub fn document(&self, id: &str) -> Option<&Document> {
        self.documents.get(id)
    }

    pub fn document_ids(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }

    /// Whether the vector path has an index to search.
    #[must_use]
    pub fn has_vector_index(&self) -> bool {
        self.chunks.is_indexed()
    }
}

/// Process-wide handle to the current snapshot.
#[derive(Debug)]
pub struct Corpus {
    current: RwLock<Arc<CorpusSnapshot>>,
    /// Held from the start of a load until its snapshot is published.
    reload: TokioMutex<()>,
}

impl Corpus {
    /// Publish `initial` as version 1.
    #[must_use]
    pub fn new(mut initial: CorpusSnapshot) -> Self {
        initial.version = 1;
        Self {
            current: RwLock::new(Arc::new(initial)),
            reload: TokioMutex::new(()),
        }
    }

    /// Serialize reloads so a load that read older files can never publish
    /// after one that read newer files.
    pub async fn lock_reload(&self) -> MutexGuard<'_, ()> {
        self.reload.lock().await
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<CorpusSnapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Replace the current snapshot wholesale and return its version.
    /// In-flight readers keep the snapshot they already hold.
    pub fn publish(&self, mut snapshot: CorpusSnapshot) -> u64 {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        snapshot.version = guard.version + 1;
        let version = snapshot.version;
        *guard = Arc::new(snapshot);
        version
    }
}

impl Default for Corpus {
    fn default() -> Self {
        Self::new(CorpusSnapshot::empty())
    }
}
