//! Time-stepped historical playback
//!
//! A virtual clock advances in fixed steps; on every step each active series
//! that has crossed a period boundary pulls its next bar from history, merging
//! finer bars when the series' own timeframe is not stored.

mod engine;
mod feed;
mod playback;
mod summary;

pub use engine::SimulatedMarket;
pub use feed::{FeedRequest, SimulationFeed};
pub use playback::HistoricalPlaybackState;
pub use summary::{Progress, RunSummary};

use crate::bar::TimeFrame;
use crate::market::SymbolInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while setting up a simulation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("simulation start {start} must be before end {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("progress step must be within (0, 100], got {0}")]
    InvalidProgressStep(f64),
}

/// Lifecycle of a simulated market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationState {
    Uninitialized,
    Started,
    Running,
    Finished,
    /// Cancelled before reaching the end date
    Stopped,
}

/// How the synthetic ask is derived from a replayed close
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SpreadPolicy {
    /// Ask equals bid
    #[default]
    Zero,
    /// Constant price distance
    Fixed { value: f64 },
    /// Multiple of the instrument tick size
    Ticks { ticks: f64 },
}

impl SpreadPolicy {
    /// Spread to add to the bid for an instrument
    pub fn spread(&self, info: &SymbolInfo) -> f64 {
        match *self {
            SpreadPolicy::Zero => 0.0,
            SpreadPolicy::Fixed { value } => value,
            SpreadPolicy::Ticks { ticks } => ticks * info.tick_size,
        }
    }
}

/// Simulation range and clock settings
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    /// First time replayed after backfill
    pub start: DateTime<Utc>,
    /// Clock stops once it reaches this time
    pub end: DateTime<Utc>,
    /// Clock increment per step
    #[serde(default = "default_step")]
    pub step: TimeFrame,
    /// Window replayed before `start` during initialization
    #[serde(default)]
    pub backfill: Option<TimeFrame>,
    /// Minimum progress advance, in percent, between progress reports
    #[serde(default = "default_progress_step_pct")]
    pub progress_step_pct: f64,
    #[serde(default)]
    pub spread: SpreadPolicy,
}

fn default_step() -> TimeFrame {
    TimeFrame::M1
}
fn default_progress_step_pct() -> f64 {
    10.0
}

impl SimulationConfig {
    /// Minute-stepped config with no backfill
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            step: default_step(),
            backfill: None,
            progress_step_pct: default_progress_step_pct(),
            spread: SpreadPolicy::Zero,
        }
    }

    /// Set the clock step
    pub fn with_step(mut self, step: TimeFrame) -> Self {
        self.step = step;
        self
    }

    /// Set the backfill window
    pub fn with_backfill(mut self, backfill: TimeFrame) -> Self {
        self.backfill = Some(backfill);
        self
    }

    /// Set the spread policy
    pub fn with_spread(mut self, spread: SpreadPolicy) -> Self {
        self.spread = spread;
        self
    }

    /// Check the range and progress settings
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.start >= self.end {
            return Err(SimulationError::InvalidRange {
                start: self.start,
                end: self.end,
            });
        }
        if !(self.progress_step_pct > 0.0 && self.progress_step_pct <= 100.0) {
            return Err(SimulationError::InvalidProgressStep(self.progress_step_pct));
        }
        Ok(())
    }
}
