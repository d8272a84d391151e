//! Feeding finished bars to streaming indicators

use super::ParticipantHandler;
use crate::bar::{TimeFrame, TimedBar};
use crate::market::SeriesKey;
use parking_lot::Mutex;

/// Streaming/batch indicator contract.
///
/// `on_bar_batch` writes one output per input; feeding a sequence in one batch
/// or one value at a time must give the same outputs.
pub trait BarIndicator: Send {
    /// Reset all internal state
    fn clear(&mut self);
    fn on_bar_batch(&mut self, inputs: &[f64], outputs: &mut [f64]);
    /// False until enough inputs were seen for a meaningful value
    fn is_ready(&self) -> bool;
}

struct IndicatorState<I> {
    indicator: I,
    /// Bar delivered by `on_bar`, consumed when it finishes
    pending: Option<TimedBar>,
    outputs: Vec<f64>,
}

/// Participant handler that feeds each finished close of one series to an
/// indicator, one call per bar in arrival order.
pub struct IndicatorParticipant<I: BarIndicator> {
    key: SeriesKey,
    state: Mutex<IndicatorState<I>>,
}

impl<I: BarIndicator> IndicatorParticipant<I> {
    pub fn new(symbol: &str, timeframe: TimeFrame, indicator: I) -> Self {
        Self {
            key: SeriesKey::new(symbol, timeframe),
            state: Mutex::new(IndicatorState {
                indicator,
                pending: None,
                outputs: Vec::new(),
            }),
        }
    }

    /// Series feeding the indicator
    pub fn key(&self) -> &SeriesKey {
        &self.key
    }

    /// Every output so far, one per finished bar
    pub fn outputs(&self) -> Vec<f64> {
        self.state.lock().outputs.clone()
    }

    /// Latest output
    pub fn latest(&self) -> Option<f64> {
        self.state.lock().outputs.last().copied()
    }

    pub fn is_ready(&self) -> bool {
        self.state.lock().indicator.is_ready()
    }

    /// Clear the indicator and drop recorded outputs
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.indicator.clear();
        state.pending = None;
        state.outputs.clear();
    }

    fn matches(&self, symbol: &str, timeframe: TimeFrame) -> bool {
        self.key.symbol.as_ref() == symbol && self.key.timeframe == timeframe
    }
}

impl<I: BarIndicator> ParticipantHandler for IndicatorParticipant<I> {
    fn on_bar(&self, symbol: &str, timeframe: TimeFrame, bar: &TimedBar) {
        if self.matches(symbol, timeframe) {
            self.state.lock().pending = Some(*bar);
        }
    }

    fn on_bar_finished(&self, symbol: &str, timeframe: TimeFrame) {
        if !self.matches(symbol, timeframe) {
            return;
        }
        let mut state = self.state.lock();
        let Some(bar) = state.pending.take() else {
            return;
        };
        let mut output = [f64::NAN];
        state.indicator.on_bar_batch(&[bar.close], &mut output);
        state.outputs.push(output[0]);
    }
}
