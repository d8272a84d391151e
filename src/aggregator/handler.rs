//! Aggregator bound to one symbol and one target timeframe

use super::AggregatorConfig;
use crate::bar::{Tick, TimeFrame, TimedBar};
use crate::market::{
    BarEvent, MarketBase, MarketError, MarketSeries, ObserverId, SubscriptionGuard, Symbol,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

/// Accumulation state shared with the series and tick observers
struct AggregatorCore {
    target: Arc<MarketSeries>,
    source_timeframe: TimeFrame,
    flush_delay: Duration,
    /// Held from taking a bar out of `state` until it is in `target`, so
    /// pushes reach the series in the order they were taken. Always locked
    /// before `state`.
    publishing: Mutex<()>,
    state: Mutex<AggregatorState>,
}

struct AggregatorState {
    /// Open target period; invalid between periods
    bar: TimedBar,
    server_time_from_fine_bar: Option<DateTime<Utc>>,
}

/// Bars to push into the target series, with their finished flag
type Outgoing = Vec<(TimedBar, bool)>;

impl AggregatorCore {
    fn timeframe(&self) -> TimeFrame {
        self.target.timeframe()
    }

    fn on_fine_bar(self: &Arc<Self>, event: &BarEvent) {
        // Intra-bar snapshots of the fine series are covered by ticks
        if !event.finished {
            return;
        }

        let timeframe = self.timeframe();
        let mut fine = event.bar;
        if fine.volume.is_nan() {
            fine.volume = 1.0;
        }
        let period = timeframe.period_start(fine.open_time);

        let publishing = self.publishing.lock();
        let mut outgoing = Outgoing::new();
        let rolled_over = {
            let mut state = self.state.lock();
            state.server_time_from_fine_bar = Some(fine.open_time);

            if state.bar.is_valid() && state.bar.open_time != period {
                if period < state.bar.open_time {
                    tracing::warn!(
                        series = %self.target.key(),
                        open_time = %fine.open_time,
                        "Fine bar older than the open period, dropped"
                    );
                    return;
                }
                let closed = std::mem::replace(&mut state.bar, TimedBar::invalid());
                outgoing.push((closed, true));
            }

            if state.bar.is_valid() {
                state.bar.merge(&fine);
            } else {
                state.bar = fine.with_open_time(period);
            }
            outgoing.push((state.bar, false));

            fine.open_time + self.source_timeframe.duration() >= period + timeframe.duration()
        };
        self.publish(outgoing);
        drop(publishing);

        if rolled_over {
            self.schedule_flush(period);
        }
    }

    fn on_tick(&self, tick: &Tick) {
        let _publishing = self.publishing.lock();
        let outgoing = {
            let mut state = self.state.lock();
            if !state.bar.is_valid()
                || self.timeframe().period_start(tick.time) != state.bar.open_time
            {
                return;
            }
            state.bar.update_price(tick.bid);
            vec![(state.bar, false)]
        };
        self.publish(outgoing);
    }

    /// Publish the period after the configured delay, or now when there is
    /// no delay or no runtime to wait on.
    fn schedule_flush(self: &Arc<Self>, period: DateTime<Utc>) {
        if !self.flush_delay.is_zero() {
            if let Ok(handle) = Handle::try_current() {
                let core = Arc::clone(self);
                let delay = self.flush_delay;
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    core.flush_period(period);
                });
                return;
            }
        }
        self.flush_period(period);
    }

    /// Publish the open bar as finished if it still belongs to `period`
    fn flush_period(&self, period: DateTime<Utc>) {
        let _publishing = self.publishing.lock();
        let closed = {
            let mut state = self.state.lock();
            if !state.bar.is_valid() || state.bar.open_time != period {
                return;
            }
            std::mem::replace(&mut state.bar, TimedBar::invalid())
        };
        self.publish(vec![(closed, true)]);
    }

    /// Publish whatever period is open as finished
    fn flush_open(&self) {
        let _publishing = self.publishing.lock();
        let closed = std::mem::replace(&mut self.state.lock().bar, TimedBar::invalid());
        if closed.is_valid() {
            self.publish(vec![(closed, true)]);
        }
    }

    fn reset(&self) {
        let mut state = self.state.lock();
        state.bar = TimedBar::invalid();
        state.server_time_from_fine_bar = None;
    }

    fn publish(&self, outgoing: Outgoing) {
        for (bar, finished) in outgoing {
            if let Err(e) = self.target.push(bar, finished) {
                tracing::error!(error = %e, "Aggregated bar rejected by series");
            }
        }
    }
}

/// Live observer registrations of an enabled aggregator
struct Binding {
    core: Arc<AggregatorCore>,
    _guard: SubscriptionGuard,
    fine: Arc<MarketSeries>,
    bar_observer: ObserverId,
    symbol: Arc<Symbol>,
    tick_observer: Option<ObserverId>,
}

/// Synthesizes `target` bars for one symbol from its finer series.
///
/// Bars are written to the market's `(symbol, target)` series. Finished bars
/// arrive once per period; partial bars may arrive any number of times before.
pub struct BarAggregator {
    market: Arc<MarketBase>,
    symbol: String,
    target: TimeFrame,
    config: AggregatorConfig,
    binding: Mutex<Option<Binding>>,
}

impl BarAggregator {
    pub fn new(
        market: Arc<MarketBase>,
        symbol: impl Into<String>,
        target: TimeFrame,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            market,
            symbol: symbol.into(),
            target,
            config,
            binding: Mutex::new(None),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn target_timeframe(&self) -> TimeFrame {
        self.target
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.binding.lock().is_some()
    }

    /// Subscribe to the source series (and ticks when enabled) and start
    /// aggregating. Enabling twice is a no-op.
    pub fn enable(&self) -> Result<(), MarketError> {
        let mut binding = self.binding.lock();
        if binding.is_some() {
            return Ok(());
        }

        let symbol = self.market.get_symbol(&self.symbol)?;
        let fine = symbol.series(self.config.source_timeframe);
        let core = Arc::new(AggregatorCore {
            target: symbol.series(self.target),
            source_timeframe: self.config.source_timeframe,
            flush_delay: self.config.flush_delay,
            publishing: Mutex::new(()),
            state: Mutex::new(AggregatorState {
                bar: TimedBar::invalid(),
                server_time_from_fine_bar: None,
            }),
        });

        let guard = self
            .market
            .subscribe(&self.symbol, self.config.source_timeframe);

        let bar_core = Arc::clone(&core);
        let bar_observer = fine.on_bar(move |event| bar_core.on_fine_bar(event));

        let tick_observer = self.config.tick_partials.then(|| {
            let tick_core = Arc::clone(&core);
            symbol.on_tick(move |tick| tick_core.on_tick(tick))
        });

        tracing::debug!(
            symbol = %self.symbol,
            source = %self.config.source_timeframe,
            target = %self.target,
            "Bar aggregator enabled"
        );

        *binding = Some(Binding {
            core,
            _guard: guard,
            fine,
            bar_observer,
            symbol,
            tick_observer,
        });
        Ok(())
    }

    /// Unbind observers, release the subscription and drop the open period
    pub fn disable(&self) {
        let Some(binding) = self.binding.lock().take() else {
            return;
        };
        binding.fine.remove_observer(binding.bar_observer);
        if let Some(id) = binding.tick_observer {
            binding.symbol.remove_tick_observer(id);
        }
        binding.core.reset();
        tracing::debug!(symbol = %self.symbol, target = %self.target, "Bar aggregator disabled");
    }

    /// Publish the open period as finished, e.g. at the end of a replay
    pub fn finish(&self) {
        if let Some(binding) = self.binding.lock().as_ref() {
            binding.core.flush_open();
        }
    }

    /// Target bar currently being built
    pub fn current_bar(&self) -> Option<TimedBar> {
        let binding = self.binding.lock();
        let bar = binding.as_ref()?.core.state.lock().bar;
        bar.is_valid().then_some(bar)
    }

    /// Open time of the latest fine bar seen
    pub fn server_time_from_fine_bar(&self) -> Option<DateTime<Utc>> {
        self.binding
            .lock()
            .as_ref()?
            .core
            .state
            .lock()
            .server_time_from_fine_bar
    }
}

impl Drop for BarAggregator {
    fn drop(&mut self) {
        self.disable();
    }
}
