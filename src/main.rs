//! # Exam Ingest CLI (`exi`)
//!
//! Converts the legacy question dump into a canonical dataset, verifies the
//! dataset's manifest, and imports it into the item store.
//!
//! ## Usage
//!
//! ```bash
//! exi --config ./config/exi.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `exi init` | Create the SQLite database and schema |
//! | `exi convert` | Convert the legacy dump into a canonical dataset |
//! | `exi verify` | Check every manifest checksum |
//! | `exi import` | Gated import of the dataset, then print the run report |
//! | `exi run` | `convert` followed by `import` |
//! | `exi stats` | Item counts by year and area |
//!
//! Exit status is non-zero when an import is refused by the integrity gate
//! or finishes with errors.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use exam_ingest::commands;
use exam_ingest::config;
use exam_ingest::progress::ProgressMode;
use exam_ingest::report;

/// Exam Ingest CLI: legacy conversion, checksummed datasets and
/// deduplicating import for exam items.
#[derive(Parser)]
#[command(
    name = "exi",
    about = "Exam Ingest: convert, verify and import standardized-exam items",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/exi.toml")]
    config: PathBuf,

    /// Progress output on stderr. Defaults to `human` on a terminal,
    /// otherwise `off`.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Convert the legacy dump into a canonical dataset.
    ///
    /// Writes `{year}/items.jsonl`, `{year}/gabarito.json`, copied assets
    /// and `manifest.json` under the output root.
    Convert {
        /// Legacy dump root. Overrides `[legacy].root`.
        #[arg(long)]
        legacy_root: Option<PathBuf>,

        /// Output dataset root. Defaults to `[dataset].root`.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Verify the dataset against its manifest checksums.
    Verify,

    /// Import the dataset: integrity gate, items, answer keys, report.
    Import {
        /// Print the aggregated import result as JSON.
        #[arg(long)]
        json: bool,

        /// Convert the legacy dump first.
        #[arg(long)]
        convert: bool,
    },

    /// Convert the legacy dump, then import it.
    Run {
        /// Print the aggregated import result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show persisted item counts by year and area.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let progress = cli
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    let ok = match cli.command {
        Commands::Init => {
            commands::run_init(&cfg).await?;
            true
        }
        Commands::Convert { legacy_root, out } => {
            commands::run_convert(&cfg, legacy_root, out, progress.as_ref())?;
            true
        }
        Commands::Verify => commands::run_verify(&cfg, progress.as_ref())?,
        Commands::Import { json, convert } => {
            commands::run_import(&cfg, convert, json, progress.as_ref()).await?
        }
        Commands::Run { json } => commands::run_import(&cfg, true, json, progress.as_ref()).await?,
        Commands::Stats => {
            report::run_stats(&cfg).await?;
            true
        }
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
