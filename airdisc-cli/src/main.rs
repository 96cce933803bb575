//! airdisc CLI: train, evaluate and serve the airline discount model.

mod commands;

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// airdisc: discount prediction for airline passengers
#[derive(Parser, Debug)]
#[command(name = "airdisc", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Create the SQLite database and optionally load data into it
    InitDb {
        /// Load the three demo passengers, routes and discounts
        #[arg(long)]
        sample: bool,

        /// Insert N seeded synthetic discounts
        #[arg(long, value_name = "N")]
        synthetic: Option<usize>,

        /// Seed for --synthetic (defaults to model.seed)
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Fit the discount model on the database and save the artifact
    Train,
    /// Score the saved model on the database and compare against a mean baseline
    Evaluate {
        /// Artifact to evaluate (defaults to model.artifact_path)
        #[arg(long)]
        model: Option<PathBuf>,
    },
    /// Predict discounts for raw records
    Predict {
        /// JSON array, JSON Lines, or SQLite file of raw records
        #[arg(short, long)]
        input: PathBuf,

        /// Write predictions here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Artifact to load (defaults to model.artifact_path)
        #[arg(long)]
        model: Option<PathBuf>,

        /// SQL query when the input is a SQLite database
        #[arg(long)]
        query: Option<String>,

        /// Read at most this many records
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print the canonical feature frame for raw records
    Features {
        /// JSON array, JSON Lines, or SQLite file of raw records
        #[arg(short, long)]
        input: PathBuf,

        /// SQL query when the input is a SQLite database
        #[arg(long)]
        query: Option<String>,

        /// Read at most this many records
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write a default workspace config file
    Init,
    /// Show the merged configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "airdisc", "airdisc")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "airdisc.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = resolve_workspace(&cli.workspace)?;

    commands::handle_command(cli.command, &workspace, cli.config.as_deref()).await
}

/// Absolute form of `--workspace`; a missing directory is an error.
fn resolve_workspace(path: &Path) -> anyhow::Result<PathBuf> {
    let resolved = path
        .canonicalize()
        .with_context(|| format!("Workspace {} does not exist", path.display()))?;
    if !resolved.is_dir() {
        anyhow::bail!("Workspace {} is not a directory", path.display());
    }
    Ok(resolved)
}
