//! adserver - real-time ad auction and budget-pacing engine
//!
//! Serves one ad decision per placement request on the page-render
//! critical path, and runs the periodic control loop (quality, fraud,
//! trust, pacing, retention) that feeds the auction its signals.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;

use adserver::cli::commands;
use adserver::config::Config;

/// Ad auction and budget-pacing engine
#[derive(Parser)]
#[command(name = "adserver")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "adserver.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the auction server and the scheduled control loop
    Serve {
        /// Optional JSON inventory seed for local serving
        #[arg(long)]
        seed: Option<PathBuf>,
    },

    /// Run one control-loop cycle and print the summary
    ControlRun {
        /// Optional JSON inventory seed
        #[arg(long)]
        seed: Option<PathBuf>,
    },

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("adserver=info".parse().unwrap()),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve { seed } => commands::serve(&config, seed.as_deref()).await,
        Commands::ControlRun { seed } => commands::control_run(&config, seed.as_deref()).await,
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
