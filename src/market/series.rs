//! Per (symbol, timeframe) bar history

use super::observers::{ObserverId, Observers};
use super::types::{MarketError, SeriesKey};
use crate::bar::{TimeFrame, TimedBar};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Raised whenever a series appends or updates a bar
#[derive(Debug, Clone)]
pub struct BarEvent {
    pub key: SeriesKey,
    pub bar: TimedBar,
    /// Position of the bar in the series
    pub index: usize,
    /// False for an intra-period snapshot of a still-open bar
    pub finished: bool,
}

/// What `MarketSeries::push` did with a bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesUpdate {
    /// A new period was appended
    Appended,
    /// The last bar was replaced in place
    Updated,
    /// The bar was invalid and dropped
    Ignored,
}

/// Ordered, append-only bar history with change notification.
///
/// Open times are strictly increasing; a push with the same open time as the
/// last bar updates it in place, an earlier open time is rejected.
pub struct MarketSeries {
    key: SeriesKey,
    bars: RwLock<Vec<TimedBar>>,
    observers: Observers<BarEvent>,
}

impl MarketSeries {
    /// Create an empty series
    pub fn new(key: SeriesKey) -> Self {
        Self {
            key,
            bars: RwLock::new(Vec::new()),
            observers: Observers::new(),
        }
    }

    /// Series identity
    pub fn key(&self) -> &SeriesKey {
        &self.key
    }

    /// Symbol code
    pub fn symbol(&self) -> &str {
        &self.key.symbol
    }

    /// Bar timeframe
    pub fn timeframe(&self) -> TimeFrame {
        self.key.timeframe
    }

    /// Append a new bar or update the last one, then notify observers.
    pub fn push(&self, bar: TimedBar, finished: bool) -> Result<SeriesUpdate, MarketError> {
        if !bar.is_valid() {
            return Ok(SeriesUpdate::Ignored);
        }

        let (update, index) = {
            let mut bars = self.bars.write();
            let update = match bars.last() {
                None => SeriesUpdate::Appended,
                // A placeholder is only ever alone and gives way to any real bar
                Some(last) if !last.is_valid() => SeriesUpdate::Updated,
                Some(last) if bar.open_time == last.open_time => SeriesUpdate::Updated,
                Some(last) if bar.open_time > last.open_time => SeriesUpdate::Appended,
                Some(last) => {
                    return Err(MarketError::OutOfOrderBar {
                        key: self.key.clone(),
                        open_time: bar.open_time,
                        last_open_time: last.open_time,
                    });
                }
            };
            if update == SeriesUpdate::Appended {
                bars.push(bar);
            } else if let Some(last) = bars.last_mut() {
                *last = bar;
            }
            (update, bars.len() - 1)
        };

        self.observers.emit(&BarEvent {
            key: self.key.clone(),
            bar,
            index,
            finished,
        });
        Ok(update)
    }

    /// Seed an empty series with a placeholder point.
    ///
    /// Returns false (and does nothing) when the series already has bars.
    pub fn seed_placeholder(&self, open_time: DateTime<Utc>) -> bool {
        let mut bars = self.bars.write();
        if !bars.is_empty() {
            return false;
        }
        bars.push(TimedBar::placeholder(open_time));
        true
    }

    /// Most recent bar (may be a placeholder)
    pub fn last(&self) -> Option<TimedBar> {
        self.bars.read().last().copied()
    }

    /// Bar at a position
    pub fn bar(&self, index: usize) -> Option<TimedBar> {
        self.bars.read().get(index).copied()
    }

    /// Snapshot of the whole history
    pub fn bars(&self) -> Vec<TimedBar> {
        self.bars.read().clone()
    }

    /// Number of bars, placeholders included
    pub fn len(&self) -> usize {
        self.bars.read().len()
    }

    /// True when the series has no bars
    pub fn is_empty(&self) -> bool {
        self.bars.read().is_empty()
    }

    /// Register a bar observer
    pub fn on_bar<F>(&self, handler: F) -> ObserverId
    where
        F: Fn(&BarEvent) + Send + Sync + 'static,
    {
        self.observers.add(handler)
    }

    /// Remove a bar observer
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    /// Number of bar observers
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl std::fmt::Debug for MarketSeries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketSeries")
            .field("key", &self.key)
            .field("len", &self.len())
            .field("observers", &self.observer_count())
            .finish()
    }
}
