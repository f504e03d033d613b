/// WordPiece tokenizer for the sentence-embedding model.
///
/// Wraps the HuggingFace `tokenizers` crate and pads every batch to its
/// longest member so one ONNX run can embed the whole batch.
use std::path::Path;

use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

use super::EmbedderError;

/// Sequence length the MiniLM sentence model was trained with.
const MAX_LENGTH: usize = 256;

pub struct SentenceTokenizer {
    inner: Tokenizer,
}

/// Token ids and attention masks for a padded batch, flattened row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBatch {
    pub batch_size: usize,
    pub seq_len: usize,
    pub input_ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
}

impl SentenceTokenizer {
    /// Load `tokenizer.json` from the model directory.
    pub fn from_model_dir(model_dir: &Path) -> Result<Self, EmbedderError> {
        let tokenizer_path = model_dir.join("tokenizer.json");
        if !tokenizer_path.exists() {
            return Err(EmbedderError::TokenizerError(format!(
                "tokenizer.json not found in {}",
                model_dir.display()
            )));
        }

        let mut inner = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EmbedderError::TokenizerError(format!("failed to load tokenizer: {e}")))?;

        inner
            .with_truncation(Some(TruncationParams {
                max_length: MAX_LENGTH,
                ..Default::default()
            }))
            .map_err(|e| EmbedderError::TokenizerError(format!("truncation config: {e}")))?;

        inner.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        Ok(Self { inner })
    }

    pub fn encode_batch(&self, texts: &[&str]) -> Result<EncodedBatch, EmbedderError> {
        let encodings = self
            .inner
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbedderError::TokenizerError(format!("failed to encode batch: {e}")))?;

        let seq_len = encodings.first().map_or(0, |e| e.get_ids().len());
        let mut input_ids = Vec::with_capacity(texts.len() * seq_len);
        let mut attention_mask = Vec::with_capacity(texts.len() * seq_len);

        for enc in &encodings {
            if enc.get_ids().len() != seq_len {
                return Err(EmbedderError::TokenizerError(
                    "batch was not padded to a common length".to_string(),
                ));
            }
            input_ids.extend(enc.get_ids().iter().map(|&id| i64::from(id)));
            attention_mask.extend(enc.get_attention_mask().iter().map(|&m| i64::from(m)));
        }

        Ok(EncodedBatch {
            batch_size: encodings.len(),
            seq_len,
            input_ids,
            attention_mask,
        })
    }

    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::download::default_model_dir;

    #[test]
    fn test_tokenizer_missing_file() {
        let result = SentenceTokenizer::from_model_dir(Path::new("/nonexistent/path"));
        assert!(matches!(result, Err(EmbedderError::TokenizerError(_))));
    }

    /// Requires downloaded model files.
    #[test]
    #[ignore]
    fn test_encode_batch_pads_to_longest() {
        let model_dir = default_model_dir();
        if !model_dir.join("tokenizer.json").exists() {
            eprintln!("Skipping: model files not downloaded");
            return;
        }

        let tokenizer = SentenceTokenizer::from_model_dir(&model_dir).unwrap();
        let batch = tokenizer
            .encode_batch(&["allowance", "consolidated allowance to ministers"])
            .unwrap();

        assert_eq!(batch.batch_size, 2);
        assert_eq!(batch.input_ids.len(), 2 * batch.seq_len);
        // The short text is padded, so its mask ends in zeros
        assert_eq!(batch.attention_mask[batch.seq_len - 1], 0);
    }
}
