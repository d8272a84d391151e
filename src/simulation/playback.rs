//! Per-series playback cursor and the bar walk

use crate::bar::{TimeFrame, TimedBar};
use crate::data::{HistoricalBars, HistoricalSource};
use crate::market::{MarketSeries, Symbol};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Cursor into the history feeding one series.
///
/// When the history is finer than the series, `accumulator` holds the target
/// period being assembled; it is invalid between periods.
#[derive(Debug, Clone)]
pub struct HistoricalPlaybackState {
    source: Arc<HistoricalBars>,
    next_index: Option<usize>,
    accumulator: TimedBar,
}

/// Where emitted bars go
pub(crate) struct PlaybackTarget<'a> {
    pub series: &'a MarketSeries,
    pub symbol: &'a Symbol,
    pub spread: f64,
}

/// Outcome of looking for a history source
pub(crate) enum Resolution {
    Ready(HistoricalPlaybackState),
    /// No stored timeframe can build the series
    Missing,
    /// A source exists but cannot be merged into the series
    Rejected(TimeFrame),
}

/// Find the history for `target`, trying the series' own timeframe first and
/// then every finer timeframe that divides it.
pub(crate) fn resolve(history: &dyn HistoricalSource, symbol: &str, target: TimeFrame) -> Resolution {
    let Some(source) = target
        .finer_candidates()
        .into_iter()
        .find_map(|tf| history.bars(symbol, tf))
    else {
        return Resolution::Missing;
    };

    let source_tf = source.timeframe();
    if target.is_finer_than(source_tf) || !source_tf.divides(target) {
        return Resolution::Rejected(source_tf);
    }
    Resolution::Ready(HistoricalPlaybackState::new(source))
}

/// True when a series whose last bar is `last` needs a new bar at `time`.
///
/// A merged series only emits once the period after its last bar has
/// closed too, since that is the period being assembled.
pub(crate) fn is_due(
    last: Option<&TimedBar>,
    target: TimeFrame,
    merging: bool,
    time: DateTime<Utc>,
) -> bool {
    let boundary = target.period_start(time);
    let Some(last) = last else {
        return true;
    };
    if !last.is_valid() {
        return last.open_time <= boundary;
    }
    let periods = if merging { 2 } else { 1 };
    boundary >= last.open_time + target.duration() * periods
}

impl HistoricalPlaybackState {
    pub fn new(source: Arc<HistoricalBars>) -> Self {
        Self {
            source,
            next_index: None,
            accumulator: TimedBar::invalid(),
        }
    }

    pub fn source(&self) -> &Arc<HistoricalBars> {
        &self.source
    }

    pub fn source_timeframe(&self) -> TimeFrame {
        self.source.timeframe()
    }

    /// Next unread history position, `None` until first use
    pub fn next_index(&self) -> Option<usize> {
        self.next_index
    }

    /// Target bar being assembled from finer bars
    pub fn accumulator(&self) -> &TimedBar {
        &self.accumulator
    }

    /// True when the series must be built by merging finer bars
    pub fn is_merging(&self, target: TimeFrame) -> bool {
        self.source.timeframe() != target
    }

    /// Emit every bar due at `time` into the target series.
    ///
    /// Returns the number of bars pushed. Bars opening after the current
    /// boundary are left unread for a later step.
    pub(crate) fn advance(&mut self, target: &PlaybackTarget<'_>, time: DateTime<Utc>) -> usize {
        let timeframe = target.series.timeframe();
        let boundary = timeframe.period_start(time);
        let merging = self.is_merging(timeframe);

        let start = if merging {
            boundary - timeframe.duration()
        } else {
            boundary
        };
        let source = Arc::clone(&self.source);
        let Some(mut index) = self
            .next_index
            .or_else(|| source.index_at_or_after(start))
        else {
            return 0;
        };

        let mut emitted = 0;
        while let Some(bar) = source.get(index) {
            if merging {
                if bar.open_time >= boundary {
                    emitted += self.flush(target);
                    break;
                }
                let period = timeframe.period_start(bar.open_time);
                if self.accumulator.is_valid() && self.accumulator.open_time != period {
                    emitted += self.flush(target);
                }
                if self.accumulator.is_valid() {
                    self.accumulator.merge(bar);
                } else {
                    self.accumulator = bar.with_open_time(period);
                }
            } else {
                if bar.open_time > boundary {
                    break;
                }
                target.quote(bar);
                emitted += emit(target, *bar);
            }
            index += 1;
        }

        self.next_index = Some(index);
        emitted
    }

    fn flush(&mut self, target: &PlaybackTarget<'_>) -> usize {
        let bar = std::mem::replace(&mut self.accumulator, TimedBar::invalid());
        if !bar.is_valid() {
            return 0;
        }
        emit(target, bar)
    }
}

impl PlaybackTarget<'_> {
    /// Set the synthetic quote from a bar read straight from history.
    ///
    /// Merged bars do not quote; their period closed before the current step.
    fn quote(&self, bar: &TimedBar) {
        self.symbol
            .update_quote(bar.open_time, bar.close, bar.close + self.spread);
    }
}

/// Push the bar as finished
fn emit(target: &PlaybackTarget<'_>, bar: TimedBar) -> usize {
    match target.series.push(bar, true) {
        Ok(_) => 1,
        Err(e) => {
            tracing::error!(error = %e, "Replayed bar rejected by series");
            0
        }
    }
}
