//! `harvest`: replay recorded browsing sessions through the harvester and
//! inspect the resulting ledgers.

mod config;
mod ledger;
mod replay;
mod script;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::replay::ReplayOptions;

#[derive(Parser)]
#[command(name = "harvest")]
#[command(about = "Incremental collection from live browser sessions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded session script
    Replay {
        script: PathBuf,
        /// Output directory (overrides HARVEST_OUTPUT_DIR)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Ledger snapshot path (overrides HARVEST_LEDGER)
        #[arg(long)]
        ledger: Option<PathBuf>,
        /// Harvest config JSON (overrides HARVEST_CONFIG)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Start with an empty ledger
        #[arg(long)]
        fresh: bool,
        /// Milliseconds to keep watching after the last step
        #[arg(long, default_value_t = 0)]
        linger_ms: u64,
    },

    /// Summarize a ledger snapshot
    Ledger {
        snapshot: PathBuf,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
        /// List every record
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,harvester=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            script,
            out,
            ledger,
            config,
            fresh,
            linger_ms,
        } => {
            let mut settings = Config::from_env().context("Failed to load configuration")?;
            if let Some(out) = out {
                settings = settings.with_output_dir(out);
            }
            if let Some(ledger) = ledger {
                settings.ledger_path = ledger;
            }
            if let Some(config) = config {
                settings.config_file = Some(config);
            }
            let options = ReplayOptions {
                fresh,
                linger: Duration::from_millis(linger_ms),
            };

            let summary = replay::run(&settings, &script, &options).await?;
            let stats = summary.stats;
            println!(
                "{} {} signals: {} collected, {} re-collected, {} skipped, {} dropped, {} failed",
                "✓".green().bold(),
                stats.signals,
                stats.collected.to_string().green(),
                stats.recollected.to_string().green(),
                stats.skipped,
                stats.dropped,
                if stats.failed > 0 {
                    stats.failed.to_string().red()
                } else {
                    stats.failed.to_string().normal()
                },
            );
            if stats.partial > 0 {
                println!("  {} partial extractions", stats.partial.to_string().yellow());
            }
            println!(
                "  payloads in {}, ledger at {}",
                settings.output_dir.display(),
                settings.ledger_path.display()
            );
            Ok(())
        }
        Commands::Ledger {
            snapshot,
            json,
            verbose,
        } => ledger::run(&snapshot, json, verbose).await,
    }
}
