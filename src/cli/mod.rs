use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod replay;
pub mod show;
pub mod version;

#[derive(Parser)]
#[command(name = "govledger")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Governance ledger built from decoded DAO contract events", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply a JSON-lines event file to the snapshot
    Replay {
        /// Decoded events, one JSON object per line, in chain order
        #[arg(long)]
        events: PathBuf,

        /// Recorded chain read responses (JSON)
        #[arg(long)]
        chain: PathBuf,

        /// Directory of proposal metadata blobs named by content hash
        #[arg(long)]
        metadata: Option<PathBuf>,

        /// Path to config file (default: ~/.local/share/govledger/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Snapshot to resume from and write back (overrides config)
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },

    /// Print entities from the snapshot
    Show {
        /// Entity kind (proposal, gp-reward, dao, event, ...)
        #[arg(long)]
        kind: String,

        /// Entity id; lists every entity of the kind when omitted
        #[arg(long)]
        id: Option<String>,

        /// Maximum entries listed
        #[arg(long)]
        limit: Option<usize>,

        /// Snapshot to read (overrides config)
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Path to config file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Write a default config file
    InitConfig {
        /// Destination (default: ~/.local/share/govledger/config.toml)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display version information
    Version,
}

pub fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Replay {
            events,
            chain,
            metadata,
            config,
            snapshot,
        } => replay::execute(replay::ReplayArgs {
            events,
            chain,
            metadata,
            config,
            snapshot,
        }),
        Commands::Show {
            kind,
            id,
            limit,
            snapshot,
            config,
        } => show::execute(show::ShowArgs {
            kind,
            id,
            limit,
            snapshot,
            config,
        }),
        Commands::InitConfig { path, force } => init_config(path, force),
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}

fn init_config(path: Option<PathBuf>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = path.unwrap_or_else(config::default_config_path);
    if path.exists() && !force {
        return Err(format!(
            "Config file '{}' already exists (use --force to overwrite)",
            path.display()
        )
        .into());
    }
    let snapshot = path
        .parent()
        .map(|dir| dir.join("govledger.snapshot"))
        .unwrap_or_else(|| config::SnapshotConfig::default().path);
    config::LedgerConfig::create_default(&path, &snapshot)?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
/// Calling this twice keeps the first subscriber.
pub fn init_logging(logging: &config::LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| format!("Invalid log level '{}': {}", logging.level, e))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let result = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| format!("Failed to open log file '{}': {}", path.display(), e))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
    Ok(())
}
