//! # Harmony CLI (`harmony`)
//!
//! ## Usage
//!
//! ```bash
//! harmony --config ./config/harmony.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `harmony match <file>` | Match instruments; print matrix, crosswalk and statistics |
//! | `harmony negate "<text>"` | Print the negated form of a sentence |
//! | `harmony models` | List registered embedding models |
//!
//! ## Examples
//!
//! ```bash
//! # Match two instruments with the configured model
//! harmony match gad7_phq9.json
//!
//! # JSON output, stricter threshold, one match per item
//! harmony match gad7_phq9.json --threshold 0.7 --one-to-one --format json
//!
//! # Negation probe for a Portuguese item
//! harmony negate "Eu me sinto nervoso" --lang pt
//! ```
//!
//! Logging goes to stderr and is controlled with `RUST_LOG` (default `warn`).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use harmony_match::config;
use harmony_match::match_cmd::{self, MatchOverrides};
use tracing_subscriber::EnvFilter;

/// Harmony — polarity-aware questionnaire item matching.
#[derive(Parser)]
#[command(
    name = "harmony",
    about = "Harmony — polarity-aware questionnaire item matching",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/harmony.toml`; if that file does not exist the
    /// built-in defaults are used.
    #[arg(long, global = true, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match the items of one or more instruments.
    ///
    /// Reads a JSON array of instruments (or `{"instruments": [...]}`),
    /// builds the similarity-with-polarity matrix, and prints it with the
    /// crosswalk table and harmonisation statistics.
    Match {
        /// Instrument JSON file.
        file: PathBuf,

        /// Also score every item against this free-text query.
        #[arg(long)]
        query: Option<String>,

        /// Disable the negation probe (plain cosine similarity).
        #[arg(long)]
        no_negate: bool,

        /// Minimum score for a crosswalk match, in [-1, 1].
        #[arg(long)]
        threshold: Option<f32>,

        /// Also match items within the same instrument.
        #[arg(long)]
        within: bool,

        /// Keep at most one match per item.
        #[arg(long)]
        one_to_one: bool,

        /// Output format.
        #[arg(long, value_enum, default_value_t = Format::Table)]
        format: Format,
    },

    /// Print the negated form of a sentence.
    Negate {
        text: String,

        /// Language tag (`en`, `pt`, `es`, `it`, `fr`, `de`).
        #[arg(long, default_value = "en")]
        lang: String,
    },

    /// List the registered (framework, model) pairs.
    Models,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Table,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Negation needs no config
    if let Commands::Negate { text, lang } = &cli.command {
        match_cmd::run_negate(text, lang);
        return Ok(());
    }

    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Match {
            file,
            query,
            no_negate,
            threshold,
            within,
            one_to_one,
            format,
        } => {
            let overrides = MatchOverrides {
                query,
                no_negate,
                threshold,
                within,
                one_to_one,
            };
            match_cmd::run_match(&cfg, &file, &overrides, matches!(format, Format::Json)).await?;
        }
        Commands::Models => match_cmd::run_models(&cfg),
        Commands::Negate { .. } => {}
    }

    Ok(())
}
