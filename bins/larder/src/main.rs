//! larder - offline-first cache for a remote JSON collection
//!
//! Keeps a local SQLite copy of a remote collection, refreshes it on
//! demand or on a schedule, and serves reads from the local copy.

use clap::{Parser, Subcommand};
use larder_core::config::Config;
use larder_telemetry::TelemetryConfig;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod context;
mod error;
mod probe;

use commands::{entities, refresh, status, watch};

/// Offline-first cache for a remote JSON collection
#[derive(Parser)]
#[command(name = "larder")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (defaults to ./larder.toml, then the user config dir)
    #[arg(short, long, global = true, env = "LARDER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the remote collection and merge it into the local cache
    Refresh,

    /// List cached entities
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one cached entity
    Get {
        /// Entity id
        id: String,
    },

    /// Remove one cached entity
    Delete {
        /// Entity id
        id: String,
    },

    /// Remove every cached entity
    Clear,

    /// Refresh in the background and print changes as they land
    Watch {
        /// Seconds between refreshes (overrides scheduler.period_secs)
        #[arg(short, long)]
        period: Option<u64>,
    },

    /// Show configuration, cache and journal status
    Status {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            return exit(larder_core::error::exit_codes::CONFIG_ERROR);
        }
    };

    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config.schema.telemetry.log_level.clone()
    };
    if let Err(e) = larder_telemetry::init_with_config(TelemetryConfig::with_level(level)) {
        eprintln!("{} {}", "Warning:".yellow().bold(), e);
    }

    let result = match cli.command {
        Commands::Refresh => refresh::run(&config).await,
        Commands::List { json } => entities::list(&config, json).await,
        Commands::Get { id } => entities::get(&config, &id).await,
        Commands::Delete { id } => entities::delete(&config, &id).await,
        Commands::Clear => entities::clear(&config).await,
        Commands::Watch { period } => watch::run(&config, period).await,
        Commands::Status { json } => status::run(&config, json).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            exit(error::exit_code(&e))
        }
    }
}

fn exit(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
