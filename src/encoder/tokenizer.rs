/// Wrapper around the HuggingFace `tokenizers` crate.
///
/// Single texts are truncated only. Batches are truncated and padded to the
/// longest sequence rounded up to a multiple of the model's maximum length.
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tracing::debug;

/// Used when neither the tokenizer nor the model config declare a length.
pub const DEFAULT_MAX_LENGTH: usize = 512;

/// HuggingFace writes `int(1e30)` when `model_max_length` is unset; anything
/// above this is treated as unset.
const UNSET_MAX_LENGTH_THRESHOLD: f64 = 1e6;

/// Pad tokens looked up when `tokenizer.json` has no padding section.
const PAD_TOKEN_CANDIDATES: &[&str] = &["[PAD]", "<pad>", "<|endoftext|>"];

#[derive(Debug, Default, Deserialize)]
struct TokenizerConfigFile {
    #[serde(default)]
    model_max_length: Option<f64>,
}

/// Tokenizer for transformer models exported from the HuggingFace hub.
pub struct HubTokenizer {
    single: Tokenizer,
    batch: Tokenizer,
    max_length: usize,
}

/// Row-major token tensors for one forward pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBatch {
    pub batch_size: usize,
    pub seq_len: usize,
    /// `[batch_size * seq_len]` token ids.
    pub input_ids: Vec<i64>,
    /// 1 for real tokens, 0 for padding.
    pub attention_mask: Vec<i64>,
    pub token_type_ids: Vec<i64>,
}

#[cfg(test)]
impl TokenBatch {
    fn mask_row(&self, index: usize) -> &[i64] {
        &self.attention_mask[index * self.seq_len..(index + 1) * self.seq_len]
    }
}

impl HubTokenizer {
    /// Load `tokenizer.json` (and `tokenizer_config.json` if present) from
    /// the model directory.
    ///
    /// The maximum length is `max_length` if given, else the tokenizer
    /// config's `model_max_length`, else `fallback_max_length` (usually the
    /// model's `max_position_embeddings`), else [`DEFAULT_MAX_LENGTH`].
    pub fn from_model_dir(
        model_dir: &Path,
        max_length: Option<usize>,
        fallback_max_length: Option<usize>,
    ) -> Result<Self> {
        let tokenizer_path = model_dir.join("tokenizer.json");

        anyhow::ensure!(
            tokenizer_path.exists(),
            "tokenizer.json not found in {}",
            model_dir.display()
        );

        let inner = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;

        let max_length = match max_length {
            Some(n) => n,
            None => read_model_max_length(model_dir)?
                .or(fallback_max_length)
                .unwrap_or(DEFAULT_MAX_LENGTH),
        };

        Self::from_tokenizer(inner, max_length)
    }

    /// Wrap an already-loaded tokenizer.
    pub fn from_tokenizer(inner: Tokenizer, max_length: usize) -> Result<Self> {
        anyhow::ensure!(max_length > 0, "max_length must be positive");

        let truncation = TruncationParams {
            max_length,
            ..Default::default()
        };

        let padding = match inner.get_padding() {
            Some(existing) => PaddingParams {
                strategy: PaddingStrategy::BatchLongest,
                pad_to_multiple_of: Some(max_length),
                ..existing.clone()
            },
            None => {
                let (pad_token, pad_id) = PAD_TOKEN_CANDIDATES
                    .iter()
                    .find_map(|t| inner.token_to_id(t).map(|id| ((*t).to_string(), id)))
                    .unwrap_or_else(|| ("[PAD]".to_string(), 0));
                PaddingParams {
                    strategy: PaddingStrategy::BatchLongest,
                    pad_to_multiple_of: Some(max_length),
                    pad_id,
                    pad_token,
                    ..Default::default()
                }
            }
        };

        debug!(
            "tokenizer max_length={max_length}, pad_token={} (id {})",
            padding.pad_token, padding.pad_id
        );

        let mut single = inner.clone();
        single
            .with_truncation(Some(truncation.clone()))
            .map_err(|e| anyhow::anyhow!("invalid truncation config: {e}"))?;
        single.with_padding(None);

        let mut batch = inner;
        batch
            .with_truncation(Some(truncation))
            .map_err(|e| anyhow::anyhow!("invalid truncation config: {e}"))?;
        batch.with_padding(Some(padding));

        Ok(Self {
            single,
            batch,
            max_length,
        })
    }

    /// Tokenize a single text without padding.
    pub fn tokenize(&self, text: &str) -> Result<TokenBatch> {
        let encoding = self
            .single
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("failed to encode text: {e}"))?;

        Ok(TokenBatch {
            batch_size: 1,
            seq_len: encoding.len(),
            input_ids: widen(encoding.get_ids()).collect(),
            attention_mask: widen(encoding.get_attention_mask()).collect(),
            token_type_ids: widen(encoding.get_type_ids()).collect(),
        })
    }

    /// Tokenize multiple texts into one padded batch.
    pub fn tokenize_batch(&self, texts: &[&str]) -> Result<TokenBatch> {
        let encodings = self
            .batch
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("failed to encode batch: {e}"))?;

        let seq_len = encodings.first().map_or(0, |e| e.len());
        let mut out = TokenBatch {
            batch_size: encodings.len(),
            seq_len,
            input_ids: Vec::with_capacity(encodings.len() * seq_len),
            attention_mask: Vec::with_capacity(encodings.len() * seq_len),
            token_type_ids: Vec::with_capacity(encodings.len() * seq_len),
        };

        for (i, enc) in encodings.iter().enumerate() {
            anyhow::ensure!(
                enc.len() == seq_len,
                "batch item {i} has length {} after padding, expected {seq_len}",
                enc.len()
            );
            out.input_ids.extend(widen(enc.get_ids()));
            out.attention_mask.extend(widen(enc.get_attention_mask()));
            out.token_type_ids.extend(widen(enc.get_type_ids()));
        }

        Ok(out)
    }

    /// Get the vocabulary size.
    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.single.get_vocab_size(false)
    }

    /// Get the configured maximum sequence length.
    #[must_use]
    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

fn widen(values: &[u32]) -> impl Iterator<Item = i64> + '_ {
    values.iter().map(|&v| i64::from(v))
}

fn read_model_max_length(model_dir: &Path) -> Result<Option<usize>> {
    let path = model_dir.join("tokenizer_config.json");
    if !path.exists() {
        return Ok(None);
    }

    let data = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let cfg: TokenizerConfigFile = serde_json::from_str(&data)
        .with_context(|| format!("invalid JSON in {}", path.display()))?;

    Ok(cfg
        .model_max_length
        .filter(|&n| n >= 1.0 && n <= UNSET_MAX_LENGTH_THRESHOLD)
        .map(|n| n as usize))
}
