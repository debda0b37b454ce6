//! Models known to work with [`TransformerEncoder`](crate::encoder::transformer::TransformerEncoder)
//! and the documentation metadata shown by `transformer2vec info`.

/// Hub ids that the ignored `test_tested_models_encode` integration test
/// downloads and encodes with. `Xenova/bart-base` is the encoder half of an
/// encoder-decoder export.
#[must_use]
pub fn list_tested_models() -> &'static [&'static str] {
    &[
        "bert-base-uncased",
        "distilbert-base-uncased",
        "Xenova/bart-base",
    ]
}

/// Descriptive metadata for an encoder family.
#[derive(Debug, Clone, Copy)]
pub struct ModelDefinition {
    pub model_name: &'static str,
    pub vector_length: &'static str,
    pub description: &'static str,
    pub paper: &'static str,
    pub repo: &'static str,
    pub installation: &'static str,
    pub example: &'static str,
}

pub const TRANSFORMER_DEFINITION: ModelDefinition = ModelDefinition {
    model_name: "Transformer Models",
    vector_length: "Depends on model.",
    description: "ONNX exports of HuggingFace transformer models, mean-pooled over tokens.",
    paper: "https://arxiv.org/abs/1910.03771",
    repo: "https://huggingface.co/transformers/pretrained_models.html",
    installation: "cargo install transformer2vec",
    example: r#"use transformer2vec::config::Config;
use transformer2vec::encoder::Encoder;
use transformer2vec::encoder::transformer::TransformerEncoder;

let encoder = TransformerEncoder::new("bert-base-uncased", &Config::default())?;
let vector = encoder.encode_text("I enjoy taking long walks along the beach with my dog.")?;"#,
};

impl ModelDefinition {
    /// Render the definition as Markdown.
    #[must_use]
    pub fn create_docs(&self) -> String {
        let mut out = format!("# {}\n\n{}\n\n", self.model_name, self.description);
        out.push_str(&format!("**Vector length**: {}\n\n", self.vector_length));
        out.push_str(&format!("**Paper**: {}\n\n", self.paper));
        out.push_str(&format!("**Repository**: {}\n\n", self.repo));
        out.push_str(&format!("**Installation**: `{}`\n\n", self.installation));

        out.push_str("**Tested models**:\n\n");
        for name in list_tested_models() {
            out.push_str(&format!("- `{name}`\n"));
        }

        out.push_str(&format!("\n## Example\n\n```rust\n{}\n```\n", self.example));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tested_models() {
        let models = list_tested_models();
        assert_eq!(models.len(), 3);
        assert!(models.contains(&"bert-base-uncased"));
        assert!(models.contains(&"Xenova/bart-base"));
    }

    #[test]
    fn test_create_docs() {
        let docs = TRANSFORMER_DEFINITION.create_docs();
        assert!(docs.starts_with("# Transformer Models"));
        assert!(docs.contains("Depends on model."));
        assert!(docs.contains("- `distilbert-base-uncased`"));
        assert!(docs.contains("```rust"));
    }
}
