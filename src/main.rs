//! # Mirqab CLI (`mirqab`)
//!
//! The `mirqab` binary is the operational interface for the Mirqab
//! backend: database initialization, the HTTP API server, and terminal
//! access to the report store and the Moraqib assistant.
//!
//! ## Usage
//!
//! ```bash
//! mirqab --config ./config/mirqab.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mirqab init` | Create the SQLite database and run schema migrations |
//! | `mirqab serve` | Start the HTTP API server |
//! | `mirqab query "<question>"` | Ask Moraqib a question from the terminal |
//! | `mirqab reports` | List recent detection reports |
//! | `mirqab stats` | Show aggregate detection statistics |
//! | `mirqab devices` | List source devices that have reported |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use mirqab::{config, migrate, reports, server};

/// Mirqab — camouflaged-personnel detection backend.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/mirqab.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "mirqab",
    about = "Mirqab — camouflaged-personnel detection backend with the Moraqib report assistant",
    version,
    long_about = "Mirqab stores camouflaged-personnel detection reports from field devices, \
    serves them to an operations dashboard over a JSON HTTP API, and answers natural-language \
    questions about them through the Moraqib retrieval-augmented assistant."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/mirqab.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the detection report table
    /// and indexes. This command is idempotent — running it multiple
    /// times is safe.
    Init,

    /// Start the HTTP API server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// dashboard API, device ingestion, and the Moraqib query endpoint.
    Serve,

    /// Ask Moraqib a question about the stored detection reports.
    ///
    /// Runs the full retrieval and generation pipeline and prints the
    /// answer with the consulted report ids.
    Query {
        /// Natural-language question (e.g., "How many detections yesterday?").
        question: String,
    },

    /// List recent detection reports.
    Reports {
        /// Time range: a number with an `h` or `d` suffix, or `all`.
        #[arg(long, default_value = "24h")]
        time_range: String,

        /// Maximum number of reports to list.
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },

    /// Show aggregate detection statistics.
    Stats,

    /// List source devices that have submitted reports.
    Devices,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            let store = reports::open_store(&cfg).await?;
            server::run_server(&cfg, store).await?;
        }
        Commands::Query { question } => {
            reports::run_query(&cfg, &question).await?;
        }
        Commands::Reports { time_range, limit } => {
            reports::run_reports(&cfg, &time_range, limit).await?;
        }
        Commands::Stats => {
            reports::run_stats(&cfg).await?;
        }
        Commands::Devices => {
            reports::run_devices(&cfg).await?;
        }
    }

    Ok(())
}
