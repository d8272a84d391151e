//! Telemetry module
//!
//! Structured logging plus replay counters and gauges. No metrics exporter is
//! installed here; without a recorder the `metrics` calls are no-ops.

mod logging;
mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::{increment_counter, set_gauge, CounterMetric, GaugeMetric};

use crate::config::TelemetryConfig;

/// Held by the binary for the lifetime of the process
pub struct TelemetryGuard {
    format: LogFormat,
}

impl TelemetryGuard {
    pub fn format(&self) -> LogFormat {
        self.format
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::debug!("Telemetry shut down");
    }
}

/// Install the global subscriber from `[telemetry]`
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<TelemetryGuard> {
    init_logging(&config.log_level, config.format)?;
    tracing::debug!(level = %config.log_level, format = ?config.format, "Telemetry initialized");

    Ok(TelemetryGuard {
        format: config.format,
    })
}
