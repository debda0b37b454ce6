use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use transformer2vec::config::{Config, DEFAULT_CONFIG_PATH};
use transformer2vec::encoder::guard::CatchErrors;
use transformer2vec::encoder::transformer::TransformerEncoder;
use transformer2vec::encoder::{Encoder, TextInput, hub};
use transformer2vec::registry::{TRANSFORMER_DEFINITION, list_tested_models};

#[derive(Parser)]
#[command(name = "transformer2vec", version, about)]
struct Cli {
    /// Path to the JSON config file.
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encode text and print the vector(s) as JSON.
    Encode {
        /// Model hub id or local model directory (overrides the config).
        #[arg(short, long)]
        model: Option<String>,

        /// Raw JSON input: a string or a list of strings.
        #[arg(long, conflicts_with = "texts")]
        json: Option<String>,

        /// One text yields one vector, several yield a list of vectors.
        texts: Vec<String>,
    },
    /// Fetch model files into the local cache.
    Download {
        #[arg(short, long)]
        model: Option<String>,
    },
    /// List models known to work.
    Models,
    /// Print the model documentation.
    Info,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Models => {
            for name in list_tested_models() {
                println!("{name}");
            }
        }
        Command::Info => print!("{}", TRANSFORMER_DEFINITION.create_docs()),
        Command::Download { model } => {
            let config = load_config(&cli.config)?;
            let model = model.unwrap_or_else(|| config.model_name.clone());
            let dir = hub::resolve_model(&model, &config.models_dir(), &config.hub_url, false)
                .with_context(|| format!("failed to fetch {model}"))?;
            println!("{}", dir.display());
        }
        Command::Encode { model, json, texts } => {
            let input = parse_input(json, texts)?;
            let config = load_config(&cli.config)?;
            let model = model.unwrap_or_else(|| config.model_name.clone());

            info!("Loading {model}...");
            let encoder = CatchErrors::new(
                TransformerEncoder::new(&model, &config)?,
                config.encoding.fill_on_error,
            );
            info!("Vector length: {}", encoder.dimensions());

            let encoded = encoder.encode(&input)?;
            println!(
                "{}",
                serde_json::to_string(&encoded).context("failed to serialize vectors")?
            );
        }
    }

    Ok(())
}

fn load_config(path: &str) -> Result<Config> {
    let config = Config::load(path)?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn parse_input(json: Option<String>, mut texts: Vec<String>) -> Result<TextInput> {
    if let Some(raw) = json {
        let value: serde_json::Value =
            serde_json::from_str(&raw).context("--json is not valid JSON")?;
        return Ok(TextInput::try_from(value)?);
    }

    match texts.len() {
        0 => anyhow::bail!("no input text given"),
        1 => Ok(TextInput::Single(texts.remove(0))),
        _ => Ok(TextInput::Batch(texts)),
    }
}
