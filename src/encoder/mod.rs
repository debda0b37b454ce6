/// Encoder trait and shared types for text-to-vector encoding.
///
/// `encode` dispatches a [`TextInput`] to either the single-text path or the
/// batch path; implementations only provide those two.
pub mod guard;
pub mod hub;
pub mod mock;
pub mod pooling;
pub mod tokenizer;
pub mod transformer;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur during encoding operations.
#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("model load failed: {0}")]
    ModelLoadFailed(String),

    #[error("tokenizer error: {0}")]
    TokenizerError(String),
}

/// Text accepted by [`Encoder::encode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextInput {
    Single(String),
    Batch(Vec<String>),
}

impl From<&str> for TextInput {
    fn from(text: &str) -> Self {
        Self::Single(text.to_string())
    }
}

impl From<String> for TextInput {
    fn from(text: String) -> Self {
        Self::Single(text)
    }
}

impl From<Vec<String>> for TextInput {
    fn from(texts: Vec<String>) -> Self {
        Self::Batch(texts)
    }
}

impl From<&[&str]> for TextInput {
    fn from(texts: &[&str]) -> Self {
        Self::Batch(texts.iter().map(|t| (*t).to_string()).collect())
    }
}

impl TryFrom<Value> for TextInput {
    type Error = EncoderError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        const MSG: &str = "not a string or a list of strings, please enter valid data type";

        match value {
            Value::String(s) => Ok(Self::Single(s)),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    other => Err(EncoderError::InvalidArgument(format!(
                        "{MSG} (list element {other})"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Batch),
            other => Err(EncoderError::InvalidArgument(format!("{MSG} (got {other})"))),
        }
    }
}

/// Result of [`Encoder::encode`]: one vector per input string.
///
/// Serializes untagged, i.e. as a plain list or a list of lists.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Encoded {
    Vector(Vec<f32>),
    Vectors(Vec<Vec<f32>>),
}

impl Encoded {
    /// Number of vectors held.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Vector(_) => 1,
            Self::Vectors(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into a list of vectors, in input order.
    #[must_use]
    pub fn into_vectors(self) -> Vec<Vec<f32>> {
        match self {
            Self::Vector(v) => vec![v],
            Self::Vectors(v) => v,
        }
    }
}

/// Trait for text encoding implementations.
///
/// All implementations must be `Send + Sync` to allow concurrent use
/// behind `Arc`.
pub trait Encoder: Send + Sync {
    /// Encode a single text string into a vector.
    fn encode_text(&self, text: &str) -> Result<Vec<f32>, EncoderError>;

    /// Encode multiple text strings into vectors, one per input, in order.
    fn bulk_encode(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EncoderError>;

    /// Return the dimensionality of the output vectors.
    fn dimensions(&self) -> usize;

    /// Encode either a single string or a list of strings.
    fn encode(&self, input: &TextInput) -> Result<Encoded, EncoderError> {
        match input {
            TextInput::Single(text) => self.encode_text(text).map(Encoded::Vector),
            TextInput::Batch(texts) => {
                let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
                self.bulk_encode(&refs).map(Encoded::Vectors)
            }
        }
    }
}
