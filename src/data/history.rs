//! Historical bar sources

use crate::bar::{TimeFrame, TimedBar};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Ordered historical bars for one (symbol, timeframe)
#[derive(Debug, Clone)]
pub struct HistoricalBars {
    symbol: String,
    timeframe: TimeFrame,
    bars: Vec<TimedBar>,
}

impl HistoricalBars {
    /// Build from bars in any order.
    ///
    /// Bars are sorted by open time; invalid bars are dropped and for
    /// duplicate open times the last one wins.
    pub fn new(symbol: impl Into<String>, timeframe: TimeFrame, mut bars: Vec<TimedBar>) -> Self {
        bars.retain(|b| b.is_valid());
        bars.sort_by_key(|b| b.open_time);
        let mut deduped: Vec<TimedBar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.open_time == bar.open_time => *last = bar,
                _ => deduped.push(bar),
            }
        }
        Self {
            symbol: symbol.into(),
            timeframe,
            bars: deduped,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> TimeFrame {
        self.timeframe
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Bar at a position
    pub fn get(&self, index: usize) -> Option<&TimedBar> {
        self.bars.get(index)
    }

    /// All bars, oldest first
    pub fn bars(&self) -> &[TimedBar] {
        &self.bars
    }

    /// Index of the first bar opening at or after `time`
    pub fn index_at_or_after(&self, time: DateTime<Utc>) -> Option<usize> {
        let index = self.bars.partition_point(|b| b.open_time < time);
        (index < self.bars.len()).then_some(index)
    }

    pub fn first_time(&self) -> Option<DateTime<Utc>> {
        self.bars.first().map(|b| b.open_time)
    }

    pub fn last_time(&self) -> Option<DateTime<Utc>> {
        self.bars.last().map(|b| b.open_time)
    }
}

/// Provider of historical bars.
///
/// Returning `None` for a timeframe is normal: the playback engine then tries
/// finer timeframes.
pub trait HistoricalSource: Send + Sync {
    /// Bars for (symbol, timeframe), if any are available
    fn bars(&self, symbol: &str, timeframe: TimeFrame) -> Option<Arc<HistoricalBars>>;

    /// Every (symbol, timeframe) this source can serve
    fn available(&self) -> Vec<(String, TimeFrame)>;
}

/// History held in memory
#[derive(Debug, Default, Clone)]
pub struct InMemoryHistory {
    series: HashMap<(String, TimeFrame), Arc<HistoricalBars>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the bars for a (symbol, timeframe)
    pub fn insert(&mut self, bars: HistoricalBars) {
        let key = (bars.symbol.clone(), bars.timeframe);
        self.series.insert(key, Arc::new(bars));
    }

    /// Builder form of `insert`
    pub fn with(mut self, symbol: &str, timeframe: TimeFrame, bars: Vec<TimedBar>) -> Self {
        self.insert(HistoricalBars::new(symbol, timeframe, bars));
        self
    }

    /// Number of series held
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl HistoricalSource for InMemoryHistory {
    fn bars(&self, symbol: &str, timeframe: TimeFrame) -> Option<Arc<HistoricalBars>> {
        self.series.get(&(symbol.to_string(), timeframe)).cloned()
    }

    fn available(&self) -> Vec<(String, TimeFrame)> {
        let mut keys: Vec<_> = self.series.keys().cloned().collect();
        keys.sort();
        keys
    }
}
