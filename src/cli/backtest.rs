//! Backtest command implementation

use super::parse_time;
use crate::aggregator::BarAggregator;
use crate::bar::{TimeFrame, TimedBar};
use crate::config::{Config, SubscriptionConfig};
use crate::data::{HistoricalSource, ParquetHistory};
use crate::market::SeriesKey;
use crate::participant::{MarketParticipant, ParticipantHandler, SeriesBinding};
use crate::simulation::{RunSummary, SimulatedMarket};
use chrono::{DateTime, Utc};
use clap::{Args, ValueEnum};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Summary output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Args, Debug)]
pub struct BacktestArgs {
    /// Directory containing Parquet files (defaults to `[data] dir`)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Start time override (RFC 3339)
    #[arg(long)]
    pub start: Option<String>,

    /// End time override (RFC 3339)
    #[arg(long)]
    pub end: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Logs every finished bar and counts them per series
#[derive(Default)]
struct BarLogger {
    finished: Mutex<BTreeMap<SeriesKey, u64>>,
}

impl BarLogger {
    fn record(&self, symbol: &str, timeframe: TimeFrame) {
        *self
            .finished
            .lock()
            .entry(SeriesKey::new(symbol, timeframe))
            .or_insert(0) += 1;
    }
}

impl ParticipantHandler for BarLogger {
    fn on_bar(&self, symbol: &str, timeframe: TimeFrame, bar: &TimedBar) {
        tracing::trace!(
            symbol,
            timeframe = %timeframe,
            open_time = %bar.open_time,
            close = bar.close,
            "Bar"
        );
    }

    fn on_bar_finished(&self, symbol: &str, timeframe: TimeFrame) {
        self.record(symbol, timeframe);
    }

    fn on_started(&self, time: DateTime<Utc>) {
        tracing::info!(%time, "Market started");
    }
}

impl BacktestArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let mut sim_config = config.simulation.clone();
        if let Some(start) = &self.start {
            sim_config.start = parse_time(start)?;
        }
        if let Some(end) = &self.end {
            sim_config.end = parse_time(end)?;
        }

        let data_dir = self.data_dir.clone().unwrap_or_else(|| config.data.dir.clone());
        tracing::info!("Running backtest on {:?}...", data_dir);
        let history = ParquetHistory::load_dir(&data_dir)
            .map_err(|e| anyhow::anyhow!("Failed to load history from {:?}: {}", data_dir, e))?;
        for (symbol, timeframe) in history.available() {
            tracing::info!(symbol = %symbol, timeframe = %timeframe, "History loaded");
        }
        for subscription in uncovered(&history, &config.subscriptions) {
            tracing::warn!(
                symbol = %subscription.symbol,
                timeframe = %subscription.timeframe,
                "No history can build subscription"
            );
        }

        let mut sim = SimulatedMarket::new(
            sim_config,
            Arc::new(config.symbol_provider()),
            Arc::new(history),
        )?;
        let market = Arc::clone(sim.market());

        let logger = Arc::new(BarLogger::default());
        let mut participant = MarketParticipant::new("backtest", logger.clone());
        for subscription in &config.subscriptions {
            participant.add_subscription(
                &subscription.symbol,
                subscription.timeframe,
                subscription.optional,
            )?;
        }
        participant.attach(Arc::clone(&market))?;

        let settings = &config.aggregator.settings;
        let mut aggregators = Vec::new();
        let mut bindings = Vec::new();
        for target in &config.aggregator.targets {
            let aggregator = BarAggregator::new(
                Arc::clone(&market),
                target.symbol.clone(),
                target.timeframe,
                settings.clone(),
            );
            aggregator.enable()?;

            let series = market.get_market_series(&target.symbol, target.timeframe)?;
            let sink = Arc::clone(&logger);
            bindings.push(SeriesBinding::bind(series, move |event| {
                if event.finished {
                    sink.record(&event.key.symbol, event.key.timeframe);
                }
            }));
            aggregators.push(aggregator);
        }

        let token = sim.cancellation_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, stopping after the current step");
                token.cancel();
            }
        });

        let summary: RunSummary = tokio::task::spawn_blocking(move || {
            let summary = sim.run();
            for aggregator in &aggregators {
                aggregator.finish();
            }
            drop(bindings);
            drop(participant);
            summary
        })
        .await?;

        for (key, count) in logger.finished.lock().iter() {
            tracing::info!(series = %key, bars = count, "Finished bars received");
        }

        match self.format {
            OutputFormat::Table => println!("{}", summary.format_table()),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        }
        Ok(())
    }
}

/// Subscriptions no stored (symbol, timeframe) can serve, directly or by merging
fn uncovered<'a>(
    history: &dyn HistoricalSource,
    subscriptions: &'a [SubscriptionConfig],
) -> Vec<&'a SubscriptionConfig> {
    let available = history.available();
    subscriptions
        .iter()
        .filter(|subscription| {
            let candidates = subscription.timeframe.finer_candidates();
            !available
                .iter()
                .any(|(symbol, tf)| *symbol == subscription.symbol && candidates.contains(tf))
        })
        .collect()
}
