/// Model file resolution and auto-download from the HuggingFace hub.
///
/// A model name is either a local directory or a hub id such as
/// `bert-base-uncased` or `Xenova/bart-base`. Hub models are cached under
/// the models directory and only missing files are fetched.
///
/// Encoder-decoder exports ship the encoder as `encoder_model.onnx`; it is
/// cached as `model.onnx` and its `last_hidden_state` is what gets pooled.
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

/// Default base URL for HuggingFace model files.
pub const DEFAULT_HUB_URL: &str = "https://huggingface.co";

/// A file the encoder reads from a model directory.
struct ModelFile {
    name: &'static str,
    /// Remote paths tried in order.
    remote: &'static [&'static str],
    required: bool,
}

const MODEL_FILES: &[ModelFile] = &[
    ModelFile {
        name: "model.onnx",
        remote: &[
            "onnx/model.onnx",
            "model.onnx",
            "onnx/encoder_model.onnx",
            "encoder_model.onnx",
        ],
        required: true,
    },
    ModelFile {
        name: "tokenizer.json",
        remote: &["tokenizer.json"],
        required: true,
    },
    ModelFile {
        name: "config.json",
        remote: &["config.json"],
        required: true,
    },
    ModelFile {
        name: "tokenizer_config.json",
        remote: &["tokenizer_config.json"],
        required: false,
    },
    ModelFile {
        name: "special_tokens_map.json",
        remote: &["special_tokens_map.json"],
        required: false,
    },
];

/// Return the default models directory (`<cache dir>/transformer2vec/models`).
#[must_use]
pub fn default_models_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("transformer2vec")
        .join("models")
}

/// Check that `model_name` is a usable hub id (`name` or `owner/name`).
pub fn validate_model_id(model_name: &str) -> Result<()> {
    anyhow::ensure!(!model_name.is_empty(), "model name is empty");

    let segments: Vec<&str> = model_name.split('/').collect();
    anyhow::ensure!(
        segments.len() <= 2,
        "invalid model id {model_name:?}: expected `name` or `owner/name`"
    );
    for segment in segments {
        anyhow::ensure!(
            !segment.is_empty() && segment != "." && segment != ".." && !segment.contains('\\'),
            "invalid model id {model_name:?}"
        );
    }
    Ok(())
}

/// Local cache directory for a hub model id.
#[must_use]
pub fn model_cache_dir(models_dir: &Path, model_name: &str) -> PathBuf {
    models_dir.join(model_name.replace('/', "--"))
}

/// Check whether all required model files exist in `model_dir`.
#[must_use]
pub fn all_files_present(model_dir: &Path) -> bool {
    MODEL_FILES
        .iter()
        .filter(|f| f.required)
        .all(|f| model_dir.join(f.name).exists())
}

/// Resolve a model name to a directory containing its files.
///
/// Existing directories are returned as-is. Hub ids are downloaded into
/// `models_dir` unless `offline` is set, in which case missing files are an
/// error.
pub fn resolve_model(
    model_name: &str,
    models_dir: &Path,
    hub_url: &str,
    offline: bool,
) -> Result<PathBuf> {
    let local = Path::new(model_name);
    if local.is_dir() {
        info!("Using local model directory {}", local.display());
        return Ok(local.to_path_buf());
    }

    validate_model_id(model_name)?;
    let model_dir = model_cache_dir(models_dir, model_name);

    if all_files_present(&model_dir) {
        info!("All model files found in {}", model_dir.display());
        return Ok(model_dir);
    }

    anyhow::ensure!(
        !offline,
        "model {model_name} is not cached in {} and offline mode is enabled",
        model_dir.display()
    );

    download_model_files(model_name, &model_dir, hub_url)?;
    Ok(model_dir)
}

/// Download model files from the hub if any are missing.
///
/// Creates the model directory if it doesn't exist.
/// Skips individual files that are already present.
pub fn download_model_files(model_name: &str, model_dir: &Path, hub_url: &str) -> Result<()> {
    info!("Checking model files in {}", model_dir.display());

    fs::create_dir_all(model_dir)
        .with_context(|| format!("failed to create models directory: {}", model_dir.display()))?;

    let base = format!("{}/{model_name}/resolve/main", hub_url.trim_end_matches('/'));
    info!("Downloading {model_name} from {base}");

    for file in MODEL_FILES {
        let dest = model_dir.join(file.name);

        if dest.exists() {
            info!("File already exists: {}", file.name);
            continue;
        }

        match download_first(&dest, &base, file.remote) {
            Ok(url) => info!("Downloaded {} from {url}", file.name),
            Err(e) if file.required => {
                return Err(e.context(format!("failed to download {}", file.name)));
            }
            Err(e) => warn!("Skipping optional file {}: {e:#}", file.name),
        }
    }

    info!("Model download complete");
    Ok(())
}

/// Try each remote path in turn, returning the URL that succeeded.
fn download_first(dest: &Path, base: &str, remote: &[&str]) -> Result<String> {
    let mut last_err = None;

    for path in remote {
        let url = format!("{base}/{path}");
        match download_file(dest, &url) {
            Ok(()) => return Ok(url),
            Err(e) => {
                warn!("{e:#}");
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("no remote path configured")))
}

/// Download a single file with a progress bar, streaming it to disk.
fn download_file(dest: &Path, url: &str) -> Result<()> {
    let mut resp =
        reqwest::blocking::get(url).with_context(|| format!("HTTP request failed: {url}"))?;

    if !resp.status().is_success() {
        anyhow::bail!("bad status: {} for {url}", resp.status());
    }

    let total = resp.content_length().unwrap_or(0);

    let pb = if total > 0 {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {percent}% ({bytes}/{total_bytes}) {msg}")
            .context("invalid progress template")?
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    } else {
        ProgressBar::new_spinner()
    };

    // Partial downloads must never sit under the final name.
    let partial = dest.with_extension("part");
    let written = write_partial(&partial, &mut resp, &pb);
    pb.finish_and_clear();

    if let Err(e) = written {
        let _ = fs::remove_file(&partial);
        return Err(e);
    }

    fs::rename(&partial, dest)
        .with_context(|| format!("failed to move {} into place", dest.display()))
}

fn write_partial(partial: &Path, body: &mut impl io::Read, pb: &ProgressBar) -> Result<()> {
    let file = fs::File::create(partial)
        .with_context(|| format!("failed to create file: {}", partial.display()))?;
    let mut writer = pb.wrap_write(file);
    io::copy(body, &mut writer).context("failed to write file")?;
    writer.flush().context("failed to flush file")?;
    Ok(())
}
