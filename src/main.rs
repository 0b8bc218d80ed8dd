//! # Seismograph CLI (`seismo`)
//!
//! ## Usage
//!
//! ```bash
//! seismo --config ./config/seismo.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `seismo init` | Create the SQLite database and schema |
//! | `seismo ingest [PATH]` | Ingest an NDJSON record stream (`-` or omitted: stdin) |
//! | `seismo stats` | Per-kind document and observation counts |
//! | `seismo get <kind> <identity>` | Print a stored document as JSON |
//!
//! Diagnostics go to stderr through `tracing`; set `RUST_LOG` to adjust
//! (default `info`). Command summaries go to stdout.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use seismograph::{config, get, ingest, migrate, stats};

/// Seismograph: ingest scraped community content into a document store.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/seismo.example.toml` for an example.
#[derive(Parser)]
#[command(
    name = "seismo",
    about = "Seismograph: ingest scraped community content into a document store",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/seismo.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Ingest records from an NDJSON file or stdin.
    ///
    /// Each line is one JSON object tagged with `kind` (`thread`,
    /// `submission`, `release`, `news`). Bad records are logged and
    /// skipped; the command fails only if the final write cannot reach
    /// the store.
    Ingest {
        /// Input file; `-` or omitted reads stdin.
        path: Option<PathBuf>,

        /// Override `[ingest].buffer_size` for this run.
        #[arg(long)]
        buffer_size: Option<usize>,

        /// Validate and count records without touching the store.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show document and observation counts per kind.
    Stats,

    /// Print a stored document.
    Get {
        /// Record kind: `thread`, `submission`, `release`, or `news`.
        kind: String,

        /// Stored identity. Release versions and news permalinks are
        /// accepted as-is.
        identity: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            path,
            buffer_size,
            dry_run,
        } => {
            ingest::run_ingest(&cfg, path.as_deref(), buffer_size, dry_run).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Get { kind, identity } => {
            get::run_get(&cfg, &kind, &identity).await?;
        }
    }

    Ok(())
}
