//! Bar timeframes
//!
//! A timeframe is identified by its duration alone: two timeframes with the
//! same number of seconds are the same timeframe, whatever they are called.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MINUTE: u32 = 60;
const HOUR: u32 = 60 * MINUTE;
const DAY: u32 = 24 * HOUR;
const WEEK: u32 = 7 * DAY;

/// 1970-01-01 was a Thursday; weekly periods start on Monday.
const WEEK_OFFSET_SECS: i64 = 4 * DAY as i64;

/// Error parsing a timeframe name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid timeframe: {0}")]
pub struct ParseTimeFrameError(pub String);

/// A bar duration in whole seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeFrame {
    secs: u32,
}

impl TimeFrame {
    pub const S1: TimeFrame = TimeFrame::from_secs(1);
    pub const S5: TimeFrame = TimeFrame::from_secs(5);
    pub const S10: TimeFrame = TimeFrame::from_secs(10);
    pub const S15: TimeFrame = TimeFrame::from_secs(15);
    pub const S30: TimeFrame = TimeFrame::from_secs(30);
    pub const M1: TimeFrame = TimeFrame::from_secs(MINUTE);
    pub const M2: TimeFrame = TimeFrame::from_secs(2 * MINUTE);
    pub const M3: TimeFrame = TimeFrame::from_secs(3 * MINUTE);
    pub const M4: TimeFrame = TimeFrame::from_secs(4 * MINUTE);
    pub const M5: TimeFrame = TimeFrame::from_secs(5 * MINUTE);
    pub const M10: TimeFrame = TimeFrame::from_secs(10 * MINUTE);
    pub const M15: TimeFrame = TimeFrame::from_secs(15 * MINUTE);
    pub const M30: TimeFrame = TimeFrame::from_secs(30 * MINUTE);
    pub const H1: TimeFrame = TimeFrame::from_secs(HOUR);
    pub const H2: TimeFrame = TimeFrame::from_secs(2 * HOUR);
    pub const H3: TimeFrame = TimeFrame::from_secs(3 * HOUR);
    pub const H4: TimeFrame = TimeFrame::from_secs(4 * HOUR);
    pub const H6: TimeFrame = TimeFrame::from_secs(6 * HOUR);
    pub const H8: TimeFrame = TimeFrame::from_secs(8 * HOUR);
    pub const H12: TimeFrame = TimeFrame::from_secs(12 * HOUR);
    pub const D1: TimeFrame = TimeFrame::from_secs(DAY);
    pub const W1: TimeFrame = TimeFrame::from_secs(WEEK);

    /// Standard timeframes, finest first
    pub const STANDARD: [TimeFrame; 22] = [
        Self::S1,
        Self::S5,
        Self::S10,
        Self::S15,
        Self::S30,
        Self::M1,
        Self::M2,
        Self::M3,
        Self::M4,
        Self::M5,
        Self::M10,
        Self::M15,
        Self::M30,
        Self::H1,
        Self::H2,
        Self::H3,
        Self::H4,
        Self::H6,
        Self::H8,
        Self::H12,
        Self::D1,
        Self::W1,
    ];

    /// Create a timeframe from a number of seconds.
    ///
    /// Zero is bumped to one second so period arithmetic never divides by zero.
    pub const fn from_secs(secs: u32) -> Self {
        Self {
            secs: if secs == 0 { 1 } else { secs },
        }
    }

    /// Duration in seconds
    pub fn secs(&self) -> u32 {
        self.secs
    }

    /// Duration as a chrono `Duration`
    pub fn duration(&self) -> Duration {
        Duration::seconds(self.secs as i64)
    }

    /// Canonical short name (`s30`, `m1`, `h4`, `d1`, `w1`)
    pub fn name(&self) -> String {
        let secs = self.secs;
        if secs % WEEK == 0 {
            format!("w{}", secs / WEEK)
        } else if secs % DAY == 0 {
            format!("d{}", secs / DAY)
        } else if secs % HOUR == 0 {
            format!("h{}", secs / HOUR)
        } else if secs % MINUTE == 0 {
            format!("m{}", secs / MINUTE)
        } else {
            format!("s{}", secs)
        }
    }

    /// Start of the period containing `ts`
    pub fn period_start(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let secs = self.secs as i64;
        let offset = if self.secs % WEEK == 0 {
            WEEK_OFFSET_SECS
        } else {
            0
        };
        let shifted = ts.timestamp() - offset;
        let start = shifted.div_euclid(secs) * secs + offset;
        Utc.timestamp_opt(start, 0).single().unwrap_or(ts)
    }

    /// Start of the period following the one containing `ts`
    pub fn next_period_start(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        self.period_start(ts) + self.duration()
    }

    /// True if `ts` lies exactly on a period boundary
    pub fn is_aligned(&self, ts: DateTime<Utc>) -> bool {
        self.period_start(ts) == ts
    }

    /// True if this timeframe has a shorter duration than `other`
    pub fn is_finer_than(&self, other: TimeFrame) -> bool {
        self.secs < other.secs
    }

    /// True if a whole number of `self` periods make up one `other` period
    pub fn divides(&self, other: TimeFrame) -> bool {
        other.secs % self.secs == 0
    }

    /// Candidate source timeframes for building bars of this timeframe.
    ///
    /// Starts with `self`, then every standard timeframe that is finer and divides
    /// it evenly, coarsest first.
    pub fn finer_candidates(&self) -> Vec<TimeFrame> {
        let mut candidates = vec![*self];
        candidates.extend(
            Self::STANDARD
                .iter()
                .rev()
                .filter(|tf| tf.is_finer_than(*self) && tf.divides(*self))
                .copied(),
        );
        candidates
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for TimeFrame {
    type Err = ParseTimeFrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let mut chars = lower.chars();
        let Some(unit) = chars.next() else {
            return Err(ParseTimeFrameError(s.to_string()));
        };
        let count: u32 = chars
            .as_str()
            .parse()
            .map_err(|_| ParseTimeFrameError(s.to_string()))?;
        if count == 0 {
            return Err(ParseTimeFrameError(s.to_string()));
        }
        let unit_secs = match unit {
            's' | 't' => 1,
            'm' => MINUTE,
            'h' => HOUR,
            'd' => DAY,
            'w' => WEEK,
            _ => return Err(ParseTimeFrameError(s.to_string())),
        };
        count
            .checked_mul(unit_secs)
            .map(TimeFrame::from_secs)
            .ok_or_else(|| ParseTimeFrameError(s.to_string()))
    }
}

impl TryFrom<String> for TimeFrame {
    type Error = ParseTimeFrameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeFrame> for String {
    fn from(tf: TimeFrame) -> Self {
        tf.name()
    }
}
