/// ONNX Runtime encoder for HuggingFace transformer exports.
///
/// Runs the model, takes its first output (`last_hidden_state`,
/// `[batch, seq_len, hidden_size]`) and averages it over the token axis.
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use ort::session::Session;
use ort::value::Tensor;
use serde::Deserialize;
use tracing::{debug, info};

use super::hub;
use super::pooling::{self, Pooling};
use super::tokenizer::{HubTokenizer, TokenBatch};
use super::{Encoder, EncoderError};
use crate::config::{ComputeConfig, Config, EncodingConfig};

/// Fields read from a model's `config.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelMetadata {
    #[serde(default)]
    pub hidden_size: Option<usize>,

    /// BART-style name for the hidden size.
    #[serde(default)]
    pub d_model: Option<usize>,

    /// DistilBERT-style name for the hidden size.
    #[serde(default)]
    pub dim: Option<usize>,

    #[serde(default)]
    pub max_position_embeddings: Option<usize>,

    #[serde(default)]
    pub type_vocab_size: Option<usize>,

    #[serde(default)]
    pub model_type: Option<String>,
}

impl ModelMetadata {
    /// Parse `config.json` from a model directory.
    pub fn from_model_dir(model_dir: &Path) -> anyhow::Result<Self> {
        let path = model_dir.join("config.json");
        let data = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("invalid JSON in {}", path.display()))
    }

    /// Hidden dimension: the first of `hidden_size`, `d_model`, `dim`.
    #[must_use]
    pub fn hidden_size(&self) -> Option<usize> {
        self.hidden_size.or(self.d_model).or(self.dim)
    }

    /// Whether the exported graph is expected to take `token_type_ids`.
    #[must_use]
    pub fn uses_token_type_ids(&self) -> bool {
        self.type_vocab_size.is_some_and(|n| n > 1)
    }
}

/// ONNX-backed encoder implementing the `Encoder` trait.
pub struct TransformerEncoder {
    session: Mutex<Session>,
    tokenizer: HubTokenizer,
    dimensions: usize,
    use_token_type_ids: bool,
    pooling: Pooling,
    normalize: bool,
}

impl TransformerEncoder {
    /// Resolve `model_name` (hub id or local directory) and load it.
    ///
    /// Downloads missing model files unless `config.offline` is set.
    pub fn new(model_name: &str, config: &Config) -> Result<Self, EncoderError> {
        let model_dir = hub::resolve_model(
            model_name,
            &config.models_dir(),
            &config.hub_url,
            config.offline,
        )
        .map_err(|e| EncoderError::ModelLoadFailed(format!("{model_name}: {e:#}")))?;

        info!("Transformer2Vec loads generic transformer exports, so not every model works.");
        info!("See `transformer2vec models` for the list of tested models.");

        Self::from_dir(&model_dir, &config.compute, &config.encoding)
    }

    /// Create a new `TransformerEncoder` from a model directory.
    ///
    /// Expects `model.onnx`, `tokenizer.json` and `config.json` in `model_dir`.
    pub fn from_dir(
        model_dir: &Path,
        compute: &ComputeConfig,
        encoding: &EncodingConfig,
    ) -> Result<Self, EncoderError> {
        let model_path = model_dir.join("model.onnx");

        if !model_path.exists() {
            return Err(EncoderError::ModelLoadFailed(format!(
                "model.onnx not found in {}",
                model_dir.display()
            )));
        }

        let metadata = ModelMetadata::from_model_dir(model_dir)
            .map_err(|e| EncoderError::ModelLoadFailed(format!("{e:#}")))?;
        let dimensions = metadata.hidden_size().ok_or_else(|| {
            EncoderError::ModelLoadFailed(format!(
                "cannot determine hidden size from {}/config.json",
                model_dir.display()
            ))
        })?;

        info!("Initializing ONNX Runtime...");

        let session = Session::builder()
            .map_err(|e| EncoderError::ModelLoadFailed(format!("session builder error: {e}")))?
            .with_intra_threads(compute.intra_threads)
            .map_err(|e| EncoderError::ModelLoadFailed(format!("thread config error: {e}")))?
            .with_inter_threads(compute.inter_threads)
            .map_err(|e| EncoderError::ModelLoadFailed(format!("thread config error: {e}")))?
            .commit_from_file(&model_path)
            .map_err(|e| EncoderError::ModelLoadFailed(format!("model load error: {e}")))?;

        info!("ONNX model loaded successfully");

        let tokenizer = HubTokenizer::from_model_dir(
            model_dir,
            encoding.max_length,
            metadata.max_position_embeddings,
        )
        .map_err(|e| EncoderError::ModelLoadFailed(format!("tokenizer error: {e:#}")))?;

        info!(
            "Tokenizer loaded (vocab size: {}, max length: {})",
            tokenizer.vocab_size(),
            tokenizer.max_length()
        );

        let use_token_type_ids = encoding
            .token_type_ids
            .unwrap_or_else(|| metadata.uses_token_type_ids());

        debug!(
            "model_type={:?} hidden_size={dimensions} token_type_ids={use_token_type_ids}",
            metadata.model_type
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            dimensions,
            use_token_type_ids,
            pooling: encoding.pooling,
            normalize: encoding.normalize,
        })
    }

    /// Maximum sequence length the tokenizer truncates to.
    #[must_use]
    pub fn max_length(&self) -> usize {
        self.tokenizer.max_length()
    }

    /// Run one forward pass and pool every row of the batch.
    fn forward(&self, tokens: &TokenBatch) -> Result<Vec<Vec<f32>>, EncoderError> {
        if let Some(vectors) = without_inference(tokens, self.dimensions) {
            return Ok(vectors);
        }

        // (shape, data) tuple form avoids ndarray version coupling with ort
        let shape = [tokens.batch_size, tokens.seq_len];
        let input_ids = Tensor::from_array((shape, tokens.input_ids.clone()))
            .map_err(|e| EncoderError::InferenceFailed(format!("input_ids error: {e}")))?;
        let attention_mask = Tensor::from_array((shape, tokens.attention_mask.clone()))
            .map_err(|e| EncoderError::InferenceFailed(format!("attention_mask error: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| EncoderError::InferenceFailed(format!("lock poisoned: {e}")))?;

        let outputs = if self.use_token_type_ids {
            let token_type_ids = Tensor::from_array((shape, tokens.token_type_ids.clone()))
                .map_err(|e| {
                    EncoderError::InferenceFailed(format!("token_type_ids error: {e}"))
                })?;
            session.run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
                "token_type_ids" => token_type_ids,
            ])
        } else {
            session.run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
            ])
        }
        .map_err(|e| EncoderError::InferenceFailed(format!("inference failed: {e}")))?;

        let (out_shape, hidden_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EncoderError::InferenceFailed(format!("output extraction: {e}")))?;

        pool_output(
            out_shape,
            hidden_data,
            tokens,
            self.dimensions,
            self.pooling,
            self.normalize,
        )
    }
}

/// Vectors for batches that need no forward pass: an empty batch yields
/// nothing, zero-length sequences yield zero vectors.
fn without_inference(tokens: &TokenBatch, dimensions: usize) -> Option<Vec<Vec<f32>>> {
    if tokens.batch_size == 0 {
        Some(Vec::new())
    } else if tokens.seq_len == 0 {
        Some(vec![vec![0.0; dimensions]; tokens.batch_size])
    } else {
        None
    }
}

/// Check the primary output against the batch and reduce it to one vector
/// per row.
fn pool_output(
    dims: &[i64],
    hidden_data: &[f32],
    tokens: &TokenBatch,
    dimensions: usize,
    pooling: Pooling,
    normalize: bool,
) -> Result<Vec<Vec<f32>>, EncoderError> {
    let expected = [
        tokens.batch_size as i64,
        tokens.seq_len as i64,
        dimensions as i64,
    ];
    if dims != expected {
        return Err(EncoderError::InferenceFailed(format!(
            "unexpected output shape {dims:?}, expected {expected:?}"
        )));
    }
    let len = tokens.batch_size * tokens.seq_len * dimensions;
    if hidden_data.len() != len {
        return Err(EncoderError::InferenceFailed(format!(
            "output holds {} values, shape {dims:?} needs {len}",
            hidden_data.len()
        )));
    }

    let mut vectors = pooling::pool(
        hidden_data,
        &tokens.attention_mask,
        tokens.batch_size,
        tokens.seq_len,
        dimensions,
        pooling,
    );

    if normalize {
        for v in &mut vectors {
            pooling::l2_normalize(v);
        }
    }

    Ok(vectors)
}

impl Encoder for TransformerEncoder {
    fn encode_text(&self, text: &str) -> Result<Vec<f32>, EncoderError> {
        let tokens = self
            .tokenizer
            .tokenize(text)
            .map_err(|e| EncoderError::TokenizerError(format!("{e:#}")))?;

        self.forward(&tokens)?
            .pop()
            .ok_or_else(|| EncoderError::InferenceFailed("model returned no vectors".into()))
    }

    fn bulk_encode(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EncoderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let tokens = self
            .tokenizer
            .tokenize_batch(texts)
            .map_err(|e| EncoderError::TokenizerError(format!("{e:#}")))?;

        debug!(
            "bulk encoding {} texts padded to {} tokens",
            tokens.batch_size, tokens.seq_len
        );

        self.forward(&tokens)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::TextInput;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_metadata_bert() {
        let meta: ModelMetadata = serde_json::from_str(
            r#"{"model_type": "bert", "hidden_size": 768, "max_position_embeddings": 512, "type_vocab_size": 2}"#,
        )
        .unwrap();
        assert_eq!(meta.hidden_size(), Some(768));
        assert!(meta.uses_token_type_ids());
    }

    #[test]
    fn test_metadata_bart_and_distilbert_aliases() {
        let bart: ModelMetadata =
            serde_json::from_str(r#"{"model_type": "bart", "d_model": 768}"#).unwrap();
        assert_eq!(bart.hidden_size(), Some(768));
        assert!(!bart.uses_token_type_ids());

        let distil: ModelMetadata =
            serde_json::from_str(r#"{"model_type": "distilbert", "dim": 768, "hidden_dim": 3072}"#)
                .unwrap();
        assert_eq!(distil.hidden_size(), Some(768));
        assert!(!distil.uses_token_type_ids());
    }

    #[test]
    fn test_metadata_with_several_hidden_size_keys() {
        let meta: ModelMetadata =
            serde_json::from_str(r#"{"hidden_size": 512, "d_model": 768, "dim": 1024}"#).unwrap();
        assert_eq!(meta.hidden_size(), Some(512));

        let meta: ModelMetadata = serde_json::from_str(r#"{"d_model": 768, "dim": 1024}"#).unwrap();
        assert_eq!(meta.hidden_size(), Some(768));
    }

    #[test]
    fn test_metadata_without_hidden_size() {
        let meta: ModelMetadata = serde_json::from_str(r#"{"model_type": "custom"}"#).unwrap();
        assert_eq!(meta.hidden_size(), None);
    }

    fn batch(batch_size: usize, seq_len: usize, attention_mask: Vec<i64>) -> TokenBatch {
        TokenBatch {
            batch_size,
            seq_len,
            input_ids: vec![1; batch_size * seq_len],
            attention_mask,
            token_type_ids: vec![0; batch_size * seq_len],
        }
    }

    #[test]
    fn test_empty_batch_skips_inference() {
        let tokens = batch(0, 0, vec![]);
        assert_eq!(without_inference(&tokens, 8), Some(vec![]));
    }

    #[test]
    fn test_zero_token_rows_get_zero_vectors() {
        let tokens = batch(2, 0, vec![]);
        assert_eq!(without_inference(&tokens, 3), Some(vec![vec![0.0; 3]; 2]));
    }

    #[test]
    fn test_real_tokens_need_inference() {
        let tokens = batch(1, 2, vec![1, 1]);
        assert_eq!(without_inference(&tokens, 3), None);
    }

    #[test]
    fn test_pool_output_mean_over_padded_batch() {
        // batch=2, seq_len=2, hidden=2; row 1 has one pad position
        let tokens = batch(2, 2, vec![1, 1, 1, 0]);
        let hidden = vec![1.0, 2.0, 3.0, 4.0, 10.0, 20.0, 0.0, 0.0];

        let mean = pool_output(&[2, 2, 2], &hidden, &tokens, 2, Pooling::Mean, false).unwrap();
        assert_eq!(mean, vec![vec![2.0, 3.0], vec![5.0, 10.0]]);

        let masked =
            pool_output(&[2, 2, 2], &hidden, &tokens, 2, Pooling::MaskedMean, false).unwrap();
        assert_eq!(masked, vec![vec![2.0, 3.0], vec![10.0, 20.0]]);
    }

    #[test]
    fn test_pool_output_normalizes() {
        let tokens = batch(1, 1, vec![1]);
        let out = pool_output(&[1, 1, 2], &[3.0, 4.0], &tokens, 2, Pooling::Mean, true).unwrap();
        assert!((out[0][0] - 0.6).abs() < 1e-6);
        assert!((out[0][1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_pool_output_rejects_shape_mismatch() {
        let tokens = batch(2, 2, vec![1; 4]);
        let hidden = vec![0.0; 8];

        for dims in [&[1i64, 2, 2][..], &[2, 2, 4][..], &[2, 4, 2][..], &[2, 2][..]] {
            let result = pool_output(dims, &hidden, &tokens, 2, Pooling::Mean, false);
            assert!(
                matches!(result, Err(EncoderError::InferenceFailed(_))),
                "shape {dims:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_pool_output_rejects_short_data() {
        let tokens = batch(1, 2, vec![1, 1]);
        let result = pool_output(&[1, 2, 2], &[0.0; 3], &tokens, 2, Pooling::Mean, false);
        assert!(matches!(result, Err(EncoderError::InferenceFailed(_))));
    }

    #[test]
    fn test_from_dir_missing_model() {
        let dir = tempdir().unwrap();
        let result = TransformerEncoder::from_dir(
            dir.path(),
            &ComputeConfig::default(),
            &EncodingConfig::default(),
        );
        assert!(matches!(result, Err(EncoderError::ModelLoadFailed(_))));
    }

    #[test]
    fn test_new_unresolvable_model_name() {
        let models = tempdir().unwrap();
        let config = Config {
            models_dir: Some(models.path().to_string_lossy().into_owned()),
            offline: true,
            ..Config::default()
        };
        let result = TransformerEncoder::new("no-such/model", &config);
        assert!(matches!(result, Err(EncoderError::ModelLoadFailed(_))));
    }

    fn bert_dir() -> PathBuf {
        std::env::var("TRANSFORMER2VEC_TEST_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("models/bert-base-uncased"))
    }

    /// Integration test requiring actual model files.
    #[test]
    #[ignore]
    fn test_transformer_encode() {
        let model_dir = bert_dir();
        if !hub::all_files_present(&model_dir) {
            eprintln!("Skipping: model files not downloaded");
            return;
        }

        let encoder = TransformerEncoder::from_dir(
            &model_dir,
            &ComputeConfig::default(),
            &EncodingConfig::default(),
        )
        .unwrap();

        let a = encoder
            .encode_text("I enjoy taking long walks along the beach with my dog.")
            .unwrap();
        let empty = encoder.encode_text("").unwrap();
        assert_eq!(a.len(), encoder.dimensions());
        assert_eq!(empty.len(), encoder.dimensions());
    }

    #[test]
    #[ignore]
    fn test_transformer_batch_matches_single() {
        let model_dir = bert_dir();
        if !hub::all_files_present(&model_dir) {
            return;
        }

        let encoding = EncodingConfig {
            pooling: Pooling::MaskedMean,
            ..EncodingConfig::default()
        };
        let encoder =
            TransformerEncoder::from_dir(&model_dir, &ComputeConfig::default(), &encoding).unwrap();

        let texts: &[&str] = &["hello", "a somewhat longer sentence about vectors"];
        let batch = encoder.encode(&TextInput::from(texts)).unwrap().into_vectors();
        assert_eq!(batch.len(), 2);

        for (text, from_batch) in texts.iter().zip(&batch) {
            let single = encoder.encode_text(text).unwrap();
            let max_diff = single
                .iter()
                .zip(from_batch)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0f32, f32::max);
            assert!(max_diff < 1e-3, "{text:?} differs by {max_diff}");
        }
    }
}
