//! Fine-to-coarse bar aggregation
//!
//! Builds bars of a coarser timeframe from a symbol's finest series and its
//! ticks, publishing partial bars while a period is open and a finished bar
//! once it closes.

mod handler;

pub use handler::BarAggregator;

use crate::bar::TimeFrame;
use serde::Deserialize;
use std::time::Duration;

/// Aggregator settings
#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorConfig {
    /// Series the bars are built from
    #[serde(default = "default_source_timeframe")]
    pub source_timeframe: TimeFrame,
    /// Wait after a period's last fine bar before publishing it as finished,
    /// so trailing ticks still land in it. Zero publishes immediately.
    #[serde(default, rename = "flush_delay_ms", with = "duration_ms")]
    pub flush_delay: Duration,
    /// Publish a partial bar on every tick
    #[serde(default)]
    pub tick_partials: bool,
}

fn default_source_timeframe() -> TimeFrame {
    TimeFrame::M1
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            source_timeframe: default_source_timeframe(),
            flush_delay: Duration::ZERO,
            tick_partials: false,
        }
    }
}

impl AggregatorConfig {
    pub fn with_flush_delay(mut self, delay: Duration) -> Self {
        self.flush_delay = delay;
        self
    }

    pub fn with_tick_partials(mut self, enabled: bool) -> Self {
        self.tick_partials = enabled;
        self
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
