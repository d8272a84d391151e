//! Deterministic synthetic history

use crate::bar::{TimeFrame, TimedBar};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Parameters of a synthetic random walk
#[derive(Debug, Clone)]
pub struct SyntheticSpec {
    pub start: DateTime<Utc>,
    pub timeframe: TimeFrame,
    pub count: usize,
    pub initial_price: f64,
    /// Largest relative move per bar
    pub volatility: f64,
    pub seed: u64,
}

impl SyntheticSpec {
    /// Minute bars starting at `start`
    pub fn minutes(start: DateTime<Utc>, count: usize) -> Self {
        Self {
            start,
            timeframe: TimeFrame::M1,
            count,
            initial_price: 1.1,
            volatility: 0.0005,
            seed: 42,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Generate a random walk of bars; the same `SyntheticSpec` always yields the same bars
pub fn synthetic_bars(spec: &SyntheticSpec) -> Vec<TimedBar> {
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let start = spec.timeframe.period_start(spec.start);
    let mut close = spec.initial_price;

    (0..spec.count)
        .map(|i| {
            let open = close;
            close = open * (1.0 + rng.gen_range(-spec.volatility..=spec.volatility));
            let wick = open * spec.volatility * rng.gen_range(0.0..0.5);
            let high = open.max(close) + wick;
            let low = open.min(close) - wick;
            let volume = rng.gen_range(1..=100) as f64;
            let open_time = start + spec.timeframe.duration() * i as i32;
            TimedBar::new(open_time, open, high, low, close, volume)
        })
        .collect()
}
