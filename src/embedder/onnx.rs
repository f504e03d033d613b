/// ONNX Runtime sentence embedder using the `ort` crate.
///
/// Runs a MiniLM sentence-transformer over a padded batch, mean-pools the
/// token states under the attention mask, and L2-normalizes each row.
use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;
use tracing::info;

use super::tokenizer::SentenceTokenizer;
use super::{Embedder, EmbedderError};

/// Texts per inference call. Keeps padding waste and peak memory bounded.
const BATCH_SIZE: usize = 32;

pub struct OnnxEmbedder {
    session: Mutex<Session>,
    tokenizer: SentenceTokenizer,
    dimensions: usize,
}

impl OnnxEmbedder {
    /// Load `model.onnx` and `tokenizer.json` from `model_dir`.
    pub fn new(model_dir: &Path, dimensions: usize) -> Result<Self, EmbedderError> {
        let model_path = model_dir.join("model.onnx");

        if !model_path.exists() {
            return Err(EmbedderError::ModelLoadFailed(format!(
                "model.onnx not found in {}",
                model_dir.display()
            )));
        }

        info!("Initializing ONNX Runtime...");

        let session = Session::builder()
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("session builder error: {e}")))?
            .with_intra_threads(4)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("thread config error: {e}")))?
            .commit_from_file(&model_path)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("model load error: {e}")))?;

        let tokenizer = SentenceTokenizer::from_model_dir(model_dir)?;

        info!(
            "Sentence model loaded from {} (vocab size: {})",
            model_dir.display(),
            tokenizer.vocab_size()
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            dimensions,
        })
    }

    fn run_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let batch = self.tokenizer.encode_batch(texts)?;
        let shape = [batch.batch_size, batch.seq_len];

        let input_ids = Tensor::from_array((shape, batch.input_ids.clone()))
            .map_err(|e| EmbedderError::InferenceFailed(format!("input_ids error: {e}")))?;
        let attention_mask = Tensor::from_array((shape, batch.attention_mask.clone()))
            .map_err(|e| EmbedderError::InferenceFailed(format!("attention_mask error: {e}")))?;
        let token_type_ids = Tensor::from_array((shape, vec![0i64; batch.input_ids.len()]))
            .map_err(|e| EmbedderError::InferenceFailed(format!("token_type_ids error: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| EmbedderError::InferenceFailed(format!("lock poisoned: {e}")))?;
        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
                "token_type_ids" => token_type_ids,
            ])
            .map_err(|e| EmbedderError::InferenceFailed(format!("inference failed: {e}")))?;

        // last_hidden_state: [batch, seq_len, hidden]
        let (_shape, hidden) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedderError::InferenceFailed(format!("output extraction: {e}")))?;

        let row_len = batch.seq_len * self.dimensions;
        if hidden.len() != batch.batch_size * row_len {
            return Err(EmbedderError::InferenceFailed(format!(
                "unexpected output size {} for batch of {} x {} x {}",
                hidden.len(),
                batch.batch_size,
                batch.seq_len,
                self.dimensions
            )));
        }

        Ok((0..batch.batch_size)
            .map(|row| {
                let states = &hidden[row * row_len..(row + 1) * row_len];
                let mask = &batch.attention_mask[row * batch.seq_len..(row + 1) * batch.seq_len];
                l2_normalize(&mean_pooling(states, mask, self.dimensions))
            })
            .collect())
    }
}

impl Embedder for OnnxEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        self.run_batch(&[text])?
            .pop()
            .ok_or_else(|| EmbedderError::InferenceFailed("empty model output".to_string()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            vectors.extend(self.run_batch(batch)?);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Average token states over positions where the attention mask is set.
///
/// `states` has shape `[seq_len, hidden_size]`, flattened.
fn mean_pooling(states: &[f32], attention_mask: &[i64], hidden_size: usize) -> Vec<f32> {
    let mut result = vec![0.0f32; hidden_size];
    let mut mask_sum = 0.0f32;

    for (token, &mask) in states.chunks_exact(hidden_size).zip(attention_mask) {
        if mask == 0 {
            continue;
        }
        mask_sum += 1.0;
        for (acc, v) in result.iter_mut().zip(token) {
            *acc += v;
        }
    }

    if mask_sum > 0.0 {
        for v in &mut result {
            *v /= mask_sum;
        }
    }
    result
}

pub(crate) fn l2_normalize(vec: &[f32]) -> Vec<f32> {
    let norm_sq: f32 = vec.iter().map(|v| v * v).sum();
    if norm_sq == 0.0 {
        return vec.to_vec();
    }

    let inv_norm = 1.0 / norm_sq.sqrt();
    vec.iter().map(|v| v * inv_norm).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::download::default_model_dir;

    #[test]
    fn test_l2_normalize() {
        let normed = l2_normalize(&[3.0, 4.0]);
        assert!((normed[0] - 0.6).abs() < 1e-6);
        assert!((normed[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero() {
        assert_eq!(l2_normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_mean_pooling_skips_padding() {
        // 3 tokens, hidden_size=2, last token is padding
        let states = vec![1.0, 2.0, 3.0, 4.0, 100.0, 100.0];
        let result = mean_pooling(&states, &[1, 1, 0], 2);
        assert_eq!(result, vec![2.0, 3.0]);
    }

    #[test]
    fn test_missing_model_is_load_failure() {
        let result = OnnxEmbedder::new(Path::new("/nonexistent/model"), 384);
        assert!(matches!(result, Err(EmbedderError::ModelLoadFailed(_))));
    }

    /// Requires downloaded model files and an ONNX Runtime library.
    #[test]
    #[ignore]
    fn test_onnx_related_texts_are_closer() {
        let model_dir = default_model_dir();
        if !model_dir.join("model.onnx").exists() {
            eprintln!("Skipping: model files not downloaded");
            return;
        }

        let embedder = OnnxEmbedder::new(&model_dir, 384).unwrap();
        let vecs = embedder
            .embed_batch(&[
                "salary of ministers",
                "Ministers are paid a monthly salary.",
                "Disciplinary penalties for misconduct.",
            ])
            .unwrap();

        let dist = |a: &[f32], b: &[f32]| -> f32 {
            a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
        };
        assert_eq!(vecs[0].len(), 384);
        assert!(dist(&vecs[0], &vecs[1]) < dist(&vecs[0], &vecs[2]));
    }
}
