/// Configuration module for transformer2vec.
///
/// Handles loading, validating, and providing default configuration values.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::encoder::hub::{DEFAULT_HUB_URL, default_models_dir};
use crate::encoder::pooling::Pooling;

/// Config file read when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "transformer2vec.json";

// ── Default value functions ──────────────────────────────────────────

fn default_model_name() -> String {
    "bert-base-uncased".to_string()
}

fn default_hub_url() -> String {
    DEFAULT_HUB_URL.to_string()
}

fn default_threads() -> usize {
    4
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Where hub models are cached. Defaults to the OS cache directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models_dir: Option<String>,

    #[serde(default = "default_hub_url")]
    pub hub_url: String,

    /// Never download; fail if the model is not cached.
    #[serde(default)]
    pub offline: bool,

    #[serde(default)]
    pub compute: ComputeConfig,

    #[serde(default)]
    pub encoding: EncodingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ComputeConfig {
    #[serde(default = "default_threads")]
    pub intra_threads: usize,

    #[serde(default = "default_threads")]
    pub inter_threads: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct EncodingConfig {
    #[serde(default)]
    pub pooling: Pooling,

    /// L2-normalize every output vector.
    #[serde(default)]
    pub normalize: bool,

    /// Overrides the tokenizer's `model_max_length`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    /// Force feeding (or not feeding) `token_type_ids` to the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type_ids: Option<bool>,

    /// Return placeholder vectors instead of failing on encode errors.
    #[serde(default)]
    pub fill_on_error: bool,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            model_name: default_model_name(),
            models_dir: None,
            hub_url: default_hub_url(),
            offline: false,
            compute: ComputeConfig::default(),
            encoding: EncodingConfig::default(),
        }
    }
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            intra_threads: default_threads(),
            inter_threads: default_threads(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to [`DEFAULT_CONFIG_PATH`].
    /// A missing file yields the default config; so does invalid JSON, with
    /// a warning.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            DEFAULT_CONFIG_PATH
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.model_name.is_empty(), "model_name must not be empty");
        anyhow::ensure!(!self.hub_url.is_empty(), "hub_url must not be empty");
        anyhow::ensure!(
            self.compute.intra_threads > 0,
            "compute.intra_threads must be positive"
        );
        anyhow::ensure!(
            self.compute.inter_threads > 0,
            "compute.inter_threads must be positive"
        );
        anyhow::ensure!(
            self.encoding.max_length != Some(0),
            "encoding.max_length must be positive"
        );
        Ok(())
    }

    /// Directory hub models are cached in.
    #[must_use]
    pub fn models_dir(&self) -> PathBuf {
        self.models_dir
            .as_ref()
            .map_or_else(default_models_dir, PathBuf::from)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
