use clap::{CommandFactory, Parser, Subcommand};
use docs_rag::commands::{run_ask, run_ingest};
use docs_rag::config::{Config, mask_key};
use docs_rag::query::OutputFormat;
use docs_rag::{RagError, Result};
use std::path::{Path, PathBuf};
use tracing::info;

const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Parser)]
#[command(name = "docs-rag")]
#[command(about = "Ask questions about a local document corpus with retrieval-augmented generation")]
#[command(version)]
struct Cli {
    /// Path to the YAML (or .toml) configuration file
    #[arg(short, long)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed and store the documents under paths.data_dir
    Ingest {
        /// Drop the existing collection before ingesting
        #[arg(long)]
        rebuild: bool,
    },
    /// Answer a question from the ingested documents
    Ask {
        /// Question to ask
        #[arg(long)]
        q: Option<String>,
        /// Question to ask, when --q is not given
        #[arg(value_name = "QUESTION")]
        q_positional: Option<String>,
        /// Print the retrieved context after the answer
        #[arg(long)]
        show_context: bool,
        /// Print the answer and context as JSON
        #[arg(long)]
        json_context: bool,
    },
}

/// Load the config file, falling back to the environment for the API key
fn load_config(path: &Path) -> Result<Config> {
    let mut config = Config::load(path)?;
    let had_key = config
        .runtime
        .api_key
        .as_deref()
        .is_some_and(|key| !key.trim().is_empty());
    config.runtime.fill_api_key(std::env::var(API_KEY_ENV).ok());

    if !had_key {
        if let Some(key) = &config.runtime.api_key {
            info!("[CONFIG] key head/tail={} (from {})", mask_key(key), API_KEY_ENV);
        }
    }

    // Fail before any pipeline is built when no key is available at all
    config.provider_settings()?;
    Ok(config)
}

fn question_from_args(q: Option<String>, q_positional: Option<String>) -> Result<String> {
    let present = |question: &String| !question.trim().is_empty();
    q.filter(present)
        .or_else(|| q_positional.filter(present))
        .ok_or_else(|| {
            RagError::Validation("missing query. use --q '...' or positional".to_string())
        })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let config = load_config(&cli.config)?;

    match command {
        Commands::Ingest { rebuild } => {
            run_ingest(&config, rebuild).await?;
        }
        Commands::Ask {
            q,
            q_positional,
            show_context,
            json_context,
        } => {
            let question = question_from_args(q, q_positional)?;
            let format = OutputFormat::from_flags(show_context, json_context);
            let output = run_ask(&config, &question, format).await?;
            println!("{}", output);
        }
    }

    Ok(())
}
