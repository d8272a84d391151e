//! Configuration types for market-sim

use crate::aggregator::AggregatorConfig;
use crate::bar::TimeFrame;
use crate::market::{StaticSymbolProvider, SymbolInfo};
use crate::simulation::SimulationConfig;
use crate::telemetry::LogFormat;
use serde::Deserialize;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub aggregator: AggregatorSection,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Instrument metadata
    #[serde(default)]
    pub symbols: Vec<SymbolInfo>,
    /// Streams the backtest participant subscribes to
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionConfig>,
}

/// Bar aggregation configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AggregatorSection {
    /// Settings shared by every configured aggregator
    #[serde(flatten)]
    pub settings: AggregatorConfig,
    /// One aggregator per target
    #[serde(default)]
    pub targets: Vec<AggregationTarget>,
}

/// Symbol and timeframe to synthesize
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AggregationTarget {
    pub symbol: String,
    pub timeframe: TimeFrame,
}

/// One participant subscription
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SubscriptionConfig {
    pub symbol: String,
    pub timeframe: TimeFrame,
    /// Missing data is tolerated for optional subscriptions
    #[serde(default)]
    pub optional: bool,
}

/// Historical data configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// Directory holding `<SYMBOL>_<timeframe>.parquet` files
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Symbol provider over the configured instruments
    pub fn symbol_provider(&self) -> StaticSymbolProvider {
        StaticSymbolProvider::new(self.symbols.iter().cloned())
    }
}
