//! CLI interface for market-sim
//!
//! Provides subcommands for:
//! - `backtest`: Replay Parquet history through the configured subscriptions
//! - `generate`: Write synthetic minute history
//! - `config`: Show configuration

mod backtest;
mod generate;

pub use backtest::{BacktestArgs, OutputFormat};
pub use generate::GenerateArgs;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "market-sim")]
#[command(about = "Deterministic multi-timeframe market data replay")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay historical bars
    Backtest(BacktestArgs),
    /// Generate synthetic history
    Generate(GenerateArgs),
    /// Show configuration
    Config,
}

/// Parse an RFC 3339 timestamp argument
pub(crate) fn parse_time(value: &str) -> anyhow::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| anyhow::anyhow!("Invalid timestamp {:?}: {}", value, e))
}
