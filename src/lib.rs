//! # transformer2vec — text to vectors with pretrained transformers
//!
//! Loads a HuggingFace transformer exported to ONNX together with its
//! tokenizer and turns text into fixed-length vectors by averaging the
//! model's per-token hidden states.
//!
//! ## Architecture
//!
//! - **[`config`]** — Configuration loading, validation, and defaults
//! - **[`encoder`]** — `Encoder` trait, ONNX transformer encoder, tokenizer, pooling, hub download
//! - **[`registry`]** — Tested model list and model documentation

pub mod config;
pub mod encoder;
pub mod registry;
