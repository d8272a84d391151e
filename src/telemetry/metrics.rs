//! Replay metrics
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! embedding application installs a recorder.

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Bars pushed into series by the playback engine
    BarsEmitted,
    /// Series dropped from the active set for lack of observers
    SeriesCollected,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Series currently replayed
    ActiveSeries,
    /// Replay progress, 0 to 100
    ProgressPct,
}

impl CounterMetric {
    fn name(self) -> &'static str {
        match self {
            CounterMetric::BarsEmitted => "marketsim_bars_emitted_total",
            CounterMetric::SeriesCollected => "marketsim_series_collected_total",
        }
    }
}

impl GaugeMetric {
    fn name(self) -> &'static str {
        match self {
            GaugeMetric::ActiveSeries => "marketsim_active_series",
            GaugeMetric::ProgressPct => "marketsim_progress_pct",
        }
    }
}

/// Increment a counter
pub fn increment_counter(metric: CounterMetric, value: u64) {
    if value == 0 {
        return;
    }
    metrics::counter!(metric.name()).increment(value);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(metric.name()).set(value);
}
