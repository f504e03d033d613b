/// Embedder trait, its implementations, and construction from config.
pub mod download;
pub mod mock;
pub mod onnx;
pub mod tokenizer;

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::{EmbedderConfig, EmbedderKind};

#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("model load failed: {0}")]
    ModelLoadFailed(String),

    #[error("tokenizer error: {0}")]
    TokenizerError(String),
}

/// Text embedding backend.
///
/// Implementations must be `Send + Sync` so one instance can be shared
/// behind `Arc` by the indexer and concurrent queries.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError>;

    fn dimensions(&self) -> usize;
}

/// Build the configured embedder.
///
/// Returns `None` when embeddings are disabled or the model cannot be
/// loaded; the vector path then reports itself unavailable.
pub fn from_config(config: &EmbedderConfig) -> Option<Arc<dyn Embedder>> {
    match config.kind {
        EmbedderKind::None => {
            info!("Embeddings disabled, vector retrieval unavailable");
            None
        }
        EmbedderKind::Hashing => {
            info!("Using feature-hashing embedder ({} dims)", config.dimensions);
            Some(Arc::new(mock::MockEmbedder::new(config.dimensions)))
        }
        EmbedderKind::Onnx => {
            let model_dir = Path::new(&config.model_dir);
            if config.auto_download && !download::all_files_present(model_dir) {
                if let Err(e) = download::download_model_files(model_dir) {
                    warn!("Model download failed: {e:#}");
                    return None;
                }
            }

            match onnx::OnnxEmbedder::new(model_dir, config.dimensions) {
                Ok(embedder) => Some(Arc::new(embedder)),
                Err(e) => {
                    warn!("Sentence model unavailable, vector retrieval disabled: {e}");
                    None
                }
            }
        }
    }
}
