//! Bar and tick value types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV sample for a fixed period.
///
/// Validity is carried in-band: a bar whose open is NaN is the "invalid"
/// sentinel, which lets accumulators start empty and be merged into in place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedBar {
    /// Period open time
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Traded volume, NaN when the source has none
    pub volume: f64,
}

impl TimedBar {
    /// Create a bar
    pub fn new(
        open_time: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// The invalid sentinel
    pub fn invalid() -> Self {
        Self::placeholder(DateTime::<Utc>::MIN_UTC)
    }

    /// An invalid bar that still carries an open time.
    ///
    /// Used to seed empty series so consumers waiting for a first bar see a
    /// point at the start of the run.
    pub fn placeholder(open_time: DateTime<Utc>) -> Self {
        Self {
            open_time,
            open: f64::NAN,
            high: f64::NAN,
            low: f64::NAN,
            close: f64::NAN,
            volume: f64::NAN,
        }
    }

    /// A flat bar at a single price
    pub fn from_price(open_time: DateTime<Utc>, price: f64, volume: f64) -> Self {
        Self::new(open_time, price, price, price, price, volume)
    }

    /// True unless this is the invalid sentinel or a placeholder
    pub fn is_valid(&self) -> bool {
        !self.open.is_nan()
    }

    /// Fold a later bar of the same period into this one.
    ///
    /// Merging into an invalid bar turns it into a copy of `other`. Otherwise the
    /// range widens, the close is overwritten and volumes add up; open and open
    /// time are kept.
    pub fn merge(&mut self, other: &TimedBar) {
        if !other.is_valid() {
            return;
        }
        if !self.is_valid() {
            *self = *other;
            return;
        }
        self.high = self.high.max(other.high);
        self.low = self.low.min(other.low);
        self.close = other.close;
        self.volume = match (self.volume.is_nan(), other.volume.is_nan()) {
            (true, true) => f64::NAN,
            (true, false) => other.volume,
            (false, true) => self.volume,
            (false, false) => self.volume + other.volume,
        };
    }

    /// Apply a trade/quote price to the bar
    pub fn update_price(&mut self, price: f64) {
        if price.is_nan() {
            return;
        }
        if !self.is_valid() {
            let open_time = self.open_time;
            *self = Self::from_price(open_time, price, f64::NAN);
            return;
        }
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
    }

    /// Copy of this bar with a different open time
    pub fn with_open_time(mut self, open_time: DateTime<Utc>) -> Self {
        self.open_time = open_time;
        self
    }
}

impl Default for TimedBar {
    fn default() -> Self {
        Self::invalid()
    }
}

/// A top-of-book quote update
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub time: DateTime<Utc>,
    pub bid: f64,
    pub ask: f64,
}

impl Tick {
    /// Create a tick
    pub fn new(time: DateTime<Utc>, bid: f64, ask: f64) -> Self {
        Self { time, bid, ask }
    }

    /// Mid price
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    /// Ask minus bid
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }
}
