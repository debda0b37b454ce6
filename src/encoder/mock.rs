/// Mock encoder for testing purposes.
///
/// Generates deterministic vectors based on text hash, so callers can be
/// tested without loading an ONNX model.
use std::hash::{DefaultHasher, Hash, Hasher};

use super::{Encoder, EncoderError};

/// A mock encoder that produces deterministic vectors from text hashes.
pub struct MockEncoder {
    pub dimensions: usize,
}

impl MockEncoder {
    /// Create a new `MockEncoder` with the given dimensionality.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for MockEncoder {
    fn default() -> Self {
        // bert-base hidden size
        Self { dimensions: 768 }
    }
}

impl Encoder for MockEncoder {
    fn encode_text(&self, text: &str) -> Result<Vec<f32>, EncoderError> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let bytes = hasher.finish().to_le_bytes();

        Ok((0..self.dimensions)
            .map(|i| f32::from(bytes[i % 8]) / 255.0)
            .collect())
    }

    fn bulk_encode(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EncoderError> {
        texts.iter().map(|t| self.encode_text(t)).collect()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_encode_dimensions() {
        let encoder = MockEncoder::new(384);
        let result = encoder.encode_text("hello world").unwrap();
        assert_eq!(result.len(), 384);
    }

    #[test]
    fn test_mock_encode_deterministic() {
        let encoder = MockEncoder::new(32);
        let a = encoder.encode_text("hello").unwrap();
        let b = encoder.encode_text("hello").unwrap();
        assert_eq!(a, b, "same input should produce same output");
    }

    #[test]
    fn test_mock_encode_different_inputs() {
        let encoder = MockEncoder::new(32);
        let a = encoder.encode_text("hello").unwrap();
        let b = encoder.encode_text("world").unwrap();
        assert_ne!(a, b, "different inputs should produce different outputs");
    }

    #[test]
    fn test_mock_bulk_encode() {
        let encoder = MockEncoder::new(128);
        let results = encoder.bulk_encode(&["a", "b", "c"]).unwrap();
        assert_eq!(results.len(), 3);
        for vec in &results {
            assert_eq!(vec.len(), 128);
        }
    }

    #[test]
    fn test_mock_default_dimensions() {
        assert_eq!(MockEncoder::default().dimensions(), 768);
    }
}
