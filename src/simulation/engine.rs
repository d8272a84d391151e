//! Simulated market: clock, active series set and step loop

use super::feed::{FeedRequest, SimulationFeed};
use super::playback::{self, HistoricalPlaybackState, PlaybackTarget, Resolution};
use super::summary::{Progress, ProgressTracker, RunSummary};
use super::{SimulationConfig, SimulationError, SimulationState};
use crate::data::HistoricalSource;
use crate::market::{
    MarketBase, MarketSeries, ObserverId, Observers, SeriesKey, Symbol, SymbolProvider,
};
use crate::telemetry::{increment_counter, set_gauge, CounterMetric, GaugeMetric};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// History lookup state of an active series
enum Playback {
    Pending,
    Ready(HistoricalPlaybackState),
    /// No history; stays empty for the rest of the run
    Unavailable,
}

struct ActiveSeries {
    series: Arc<MarketSeries>,
    symbol: Arc<Symbol>,
    playback: Playback,
    remove: bool,
}

impl ActiveSeries {
    fn key(&self) -> &SeriesKey {
        self.series.key()
    }

    /// Replay whatever is due at `time` for this series
    fn play(
        &mut self,
        time: DateTime<Utc>,
        history: &dyn HistoricalSource,
        config: &SimulationConfig,
    ) -> usize {
        let timeframe = self.series.timeframe();
        let merging = match &self.playback {
            Playback::Ready(state) => state.is_merging(timeframe),
            Playback::Unavailable => return 0,
            Playback::Pending => false,
        };
        let last = self.series.last();
        // The source is unknown until first use, so a pending series is
        // checked against the lenient same-timeframe rule.
        if !playback::is_due(last.as_ref(), timeframe, merging, time) {
            return 0;
        }

        if self.series.observer_count() == 0 {
            tracing::debug!(series = %self.key(), "Series has no observers, removing");
            self.remove = true;
            return 0;
        }

        if let Playback::Pending = self.playback {
            self.playback = match playback::resolve(history, self.series.symbol(), timeframe) {
                Resolution::Ready(state) => {
                    tracing::debug!(
                        series = %self.key(),
                        source = %state.source_timeframe(),
                        bars = state.source().len(),
                        "Resolved playback history"
                    );
                    Playback::Ready(state)
                }
                Resolution::Missing => {
                    tracing::warn!(series = %self.key(), "No history available for series");
                    Playback::Unavailable
                }
                Resolution::Rejected(source) => {
                    tracing::error!(
                        series = %self.key(),
                        source = %source,
                        "History timeframe cannot build series"
                    );
                    Playback::Unavailable
                }
            };
        }

        let Playback::Ready(state) = &mut self.playback else {
            return 0;
        };
        if state.is_merging(timeframe) && !playback::is_due(last.as_ref(), timeframe, true, time) {
            return 0;
        }

        let target = PlaybackTarget {
            series: &self.series,
            symbol: &self.symbol,
            spread: config.spread.spread(self.symbol.info()),
        };
        state.advance(&target, time)
    }
}

/// Market replayed from history on a virtual clock.
///
/// Consumers subscribe through [`SimulatedMarket::market`]; every subscribed
/// series becomes active on the next pass and is fed from `history`.
pub struct SimulatedMarket {
    config: SimulationConfig,
    market: Arc<MarketBase>,
    feed: Arc<SimulationFeed>,
    history: Arc<dyn HistoricalSource>,
    active: Vec<ActiveSeries>,
    time: DateTime<Utc>,
    state: SimulationState,
    steps: u64,
    bars_emitted: u64,
    played: HashSet<SeriesKey>,
    progress: ProgressTracker,
    tick_finished: Observers<DateTime<Utc>>,
    ticked: Observers<DateTime<Utc>>,
    progress_observers: Observers<Progress>,
    cancel: CancellationToken,
    wall_start: Option<Instant>,
}

impl SimulatedMarket {
    /// Create a simulated market named `simulation`
    pub fn new(
        config: SimulationConfig,
        provider: Arc<dyn SymbolProvider>,
        history: Arc<dyn HistoricalSource>,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        let feed = Arc::new(SimulationFeed::new());
        let market = Arc::new(MarketBase::new("simulation", provider, feed.clone()));
        let progress = ProgressTracker::new(config.start, config.end, config.progress_step_pct);
        Ok(Self {
            time: config.start,
            config,
            market,
            feed,
            history,
            active: Vec::new(),
            state: SimulationState::Uninitialized,
            steps: 0,
            bars_emitted: 0,
            played: HashSet::new(),
            progress,
            tick_finished: Observers::new(),
            ticked: Observers::new(),
            progress_observers: Observers::new(),
            cancel: CancellationToken::new(),
            wall_start: None,
        })
    }

    /// The market consumers attach to
    pub fn market(&self) -> &Arc<MarketBase> {
        &self.market
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Current simulation clock
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    /// Token that stops the run before the next step
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Keys of the series currently replayed
    pub fn active_series(&self) -> Vec<SeriesKey> {
        self.active.iter().map(|a| a.key().clone()).collect()
    }

    /// Playback cursor of an active series, once resolved
    pub fn playback_state(&self, key: &SeriesKey) -> Option<&HistoricalPlaybackState> {
        self.active
            .iter()
            .find(|a| a.key() == key)
            .and_then(|a| match &a.playback {
                Playback::Ready(state) => Some(state),
                _ => None,
            })
    }

    /// Called after a pass that emitted bars, before `on_ticked`
    pub fn on_tick_finished<F>(&self, handler: F) -> ObserverId
    where
        F: Fn(&DateTime<Utc>) + Send + Sync + 'static,
    {
        self.tick_finished.add(handler)
    }

    /// Called after a pass that emitted bars
    pub fn on_ticked<F>(&self, handler: F) -> ObserverId
    where
        F: Fn(&DateTime<Utc>) + Send + Sync + 'static,
    {
        self.ticked.add(handler)
    }

    /// Called on every throttled progress report
    pub fn on_progress<F>(&self, handler: F) -> ObserverId
    where
        F: Fn(&Progress) + Send + Sync + 'static,
    {
        self.progress_observers.add(handler)
    }

    /// Replay the backfill window and move the clock to the start date.
    ///
    /// Active series still empty afterwards get a placeholder at the period
    /// containing the start date. Fires the market started signal. Calling it twice is a no-op.
    pub fn initialize(&mut self) {
        if self.state != SimulationState::Uninitialized {
            return;
        }
        self.wall_start = Some(Instant::now());

        let backfill_start = match self.config.backfill {
            Some(backfill) => self.config.start - backfill.duration(),
            None => self.config.start,
        };
        tracing::info!(
            start = %self.config.start,
            end = %self.config.end,
            backfill_start = %backfill_start,
            step = %self.config.step,
            "Initializing simulation"
        );

        self.time = backfill_start;
        self.execute(backfill_start);

        self.apply_feed_requests();
        for active in &self.active {
            let open_time = active.series.timeframe().period_start(self.config.start);
            if active.series.seed_placeholder(open_time) {
                tracing::debug!(series = %active.key(), "Seeded placeholder bar");
            }
        }

        self.time = self.config.start;
        self.market.set_server_time(self.time);
        self.state = SimulationState::Started;
        self.market.mark_started(self.time);
        self.report_progress();
    }

    /// Advance the clock by one step and replay it.
    ///
    /// Returns false once the end date is reached or the run was cancelled.
    pub fn execute_next_step(&mut self) -> bool {
        if self.state == SimulationState::Uninitialized {
            self.initialize();
        }
        if matches!(
            self.state,
            SimulationState::Finished | SimulationState::Stopped
        ) {
            return false;
        }
        if self.cancel.is_cancelled() {
            tracing::info!(time = %self.time, "Simulation cancelled");
            self.state = SimulationState::Stopped;
            return false;
        }
        if self.time >= self.config.end {
            self.finish();
            return false;
        }

        self.state = SimulationState::Running;
        self.time += self.config.step.duration();
        self.steps += 1;
        self.execute(self.time);
        self.report_progress();

        let more = self.time < self.config.end;
        if !more {
            self.finish();
        }
        more
    }

    /// Step until finished or cancelled
    pub fn run(&mut self) -> RunSummary {
        while self.execute_next_step() {}
        self.summary()
    }

    /// Summary of the run so far
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            state: self.state,
            steps: self.steps,
            bars_emitted: self.bars_emitted,
            series_played: self.played.len(),
            started_at: self.config.start,
            finished_at: self.time,
            elapsed_ms: self
                .wall_start
                .map(|start| start.elapsed().as_millis() as u64)
                .unwrap_or(0),
        }
    }

    /// One replay pass at `time`; returns the number of bars emitted.
    pub fn execute(&mut self, time: DateTime<Utc>) -> usize {
        self.apply_feed_requests();
        self.market.set_server_time(time);

        let mut emitted = 0;
        for active in self.active.iter_mut() {
            let count = active.play(time, self.history.as_ref(), &self.config);
            if count > 0 {
                self.played.insert(active.key().clone());
            }
            emitted += count;
        }

        if emitted > 0 {
            self.bars_emitted += emitted as u64;
            increment_counter(CounterMetric::BarsEmitted, emitted as u64);
            self.tick_finished.emit(&time);
            self.ticked.emit(&time);
        }

        let before = self.active.len();
        self.active.retain(|a| !a.remove);
        let collected = before - self.active.len();
        if collected > 0 {
            increment_counter(CounterMetric::SeriesCollected, collected as u64);
        }
        set_gauge(GaugeMetric::ActiveSeries, self.active.len() as f64);

        emitted
    }

    fn finish(&mut self) {
        if self.state == SimulationState::Finished {
            return;
        }
        self.state = SimulationState::Finished;
        tracing::info!(
            time = %self.time,
            steps = self.steps,
            bars = self.bars_emitted,
            "Simulation finished"
        );
    }

    fn report_progress(&mut self) {
        let Some(progress) = self.progress.update(self.time) else {
            return;
        };
        set_gauge(GaugeMetric::ProgressPct, progress.percent);
        tracing::info!(time = %progress.time, percent = progress.percent, "Simulation progress");
        self.progress_observers.emit(&progress);
    }

    fn apply_feed_requests(&mut self) {
        for request in self.feed.drain() {
            match request {
                FeedRequest::Subscribe(key) => self.activate(key),
                FeedRequest::Unsubscribe(key) => {
                    self.active.retain(|a| a.key() != &key);
                    tracing::debug!(series = %key, "Series deactivated");
                }
            }
        }
    }

    fn activate(&mut self, key: SeriesKey) {
        if self.active.iter().any(|a| a.key() == &key) {
            return;
        }
        let symbol = match self.market.get_symbol(&key.symbol) {
            Ok(symbol) => symbol,
            Err(e) => {
                tracing::warn!(series = %key, error = %e, "Cannot replay series");
                return;
            }
        };
        let series = symbol.series(key.timeframe);
        tracing::debug!(series = %key, "Series activated");
        self.active.push(ActiveSeries {
            series,
            symbol,
            playback: Playback::Pending,
            remove: false,
        });
    }
}
