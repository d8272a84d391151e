//! Progress reporting and run summaries

use super::SimulationState;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Replay progress snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub time: DateTime<Utc>,
    /// 0 to 100
    pub percent: f64,
}

/// Throttles progress reports to whole-percent steps
#[derive(Debug, Clone)]
pub(crate) struct ProgressTracker {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step_pct: f64,
    last_reported: Option<f64>,
}

impl ProgressTracker {
    pub(crate) fn new(start: DateTime<Utc>, end: DateTime<Utc>, step_pct: f64) -> Self {
        Self {
            start,
            end,
            step_pct,
            last_reported: None,
        }
    }

    /// Progress at `time`, if it moved far enough since the last report
    pub(crate) fn update(&mut self, time: DateTime<Utc>) -> Option<Progress> {
        let total = (self.end - self.start).num_seconds().max(1) as f64;
        let done = (time - self.start).num_seconds() as f64;
        let percent = (done / total * 100.0).clamp(0.0, 100.0).floor();

        let report = match self.last_reported {
            None => true,
            Some(last) => percent >= last + self.step_pct || (percent >= 100.0 && last < 100.0),
        };
        if !report {
            return None;
        }
        self.last_reported = Some(percent);
        Some(Progress { time, percent })
    }
}

/// Outcome of a simulation run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub state: SimulationState,
    pub steps: u64,
    pub bars_emitted: u64,
    /// Series that received at least one replayed bar
    pub series_played: usize,
    pub started_at: DateTime<Utc>,
    /// Simulation clock when the run stopped
    pub finished_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds
    pub elapsed_ms: u64,
}

impl RunSummary {
    /// Format as table for CLI output
    pub fn format_table(&self) -> String {
        format!(
            r#"
══════════════════════════════════════════════════════
               SIMULATION RESULTS
══════════════════════════════════════════════════════

CLOCK
───────────────────────────────────────────────────────
State:            {:?}
Started At:       {}
Finished At:      {}
Steps:            {}

REPLAY
───────────────────────────────────────────────────────
Bars Emitted:     {}
Series Played:    {}
Elapsed:          {}ms
══════════════════════════════════════════════════════
"#,
            self.state,
            self.started_at.to_rfc3339(),
            self.finished_at.to_rfc3339(),
            self.steps,
            self.bars_emitted,
            self.series_played,
            self.elapsed_ms,
        )
    }
}
