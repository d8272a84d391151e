//! Market registry types

use crate::bar::TimeFrame;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Market registry errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarketError {
    /// No instrument metadata exists for the code
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),
    /// Neither the direct nor the inverse conversion symbol exists
    #[error("No conversion symbol between {from} and {to}")]
    ConversionUnavailable { from: String, to: String },
    /// The conversion symbol exists but has no usable quote yet
    #[error("No quote available for {0}")]
    QuoteUnavailable(String),
    /// A bar was pushed with an open time before the series' last bar
    #[error("Out of order bar for {key}: {open_time} is before last bar {last_open_time}")]
    OutOfOrderBar {
        key: SeriesKey,
        open_time: DateTime<Utc>,
        last_open_time: DateTime<Utc>,
    },
}

/// Identity of a series: symbol code plus timeframe
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    pub symbol: Arc<str>,
    pub timeframe: TimeFrame,
}

impl SeriesKey {
    /// Create a series key
    pub fn new(symbol: impl Into<Arc<str>>, timeframe: TimeFrame) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{}", self.symbol, self.timeframe)
    }
}

/// Direction of a trade, used to pick bid or ask when converting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Static instrument metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    /// Symbol code (e.g. "EURUSD")
    pub code: String,
    #[serde(default)]
    pub description: String,
    /// Currency the instrument is denominated in (first leg for FX)
    pub base_currency: String,
    /// Currency prices are quoted in
    pub quote_currency: String,
    /// Price decimal digits
    #[serde(default = "default_digits")]
    pub digits: u32,
    /// Minimum price increment
    #[serde(default = "default_tick_size")]
    pub tick_size: f64,
    /// Volume increment
    #[serde(default = "default_volume_step")]
    pub volume_step: f64,
    /// Minimum tradable volume
    #[serde(default = "default_volume_step")]
    pub volume_min: f64,
    /// Maximum tradable volume
    #[serde(default = "default_volume_max")]
    pub volume_max: f64,
    /// Account leverage available on the instrument
    #[serde(default = "default_leverage")]
    pub leverage: f64,
    /// Units of the base currency per unit of volume (contract size)
    #[serde(default = "default_quantity_per_volume")]
    pub quantity_per_volume: f64,
}

fn default_digits() -> u32 {
    5
}
fn default_tick_size() -> f64 {
    0.00001
}
fn default_volume_step() -> f64 {
    0.01
}
fn default_volume_max() -> f64 {
    100.0
}
fn default_leverage() -> f64 {
    1.0
}
fn default_quantity_per_volume() -> f64 {
    100_000.0
}

impl SymbolInfo {
    /// Metadata for an FX pair such as "EURUSD" with standard lot defaults
    pub fn fx(code: &str) -> Self {
        let (base, quote) = if code.len() == 6 {
            (code[..3].to_string(), code[3..].to_string())
        } else {
            (code.to_string(), String::new())
        };
        Self {
            code: code.to_string(),
            description: String::new(),
            base_currency: base,
            quote_currency: quote,
            digits: default_digits(),
            tick_size: default_tick_size(),
            volume_step: default_volume_step(),
            volume_min: default_volume_step(),
            volume_max: default_volume_max(),
            leverage: default_leverage(),
            quantity_per_volume: default_quantity_per_volume(),
        }
    }

    /// Convert lots to base currency units
    pub fn volume_to_quantity(&self, volume: f64) -> f64 {
        volume * self.quantity_per_volume
    }

    /// Convert base currency units to lots
    pub fn quantity_to_volume(&self, quantity: f64) -> f64 {
        if self.quantity_per_volume == 0.0 {
            return 0.0;
        }
        quantity / self.quantity_per_volume
    }

    /// Round a volume down to the volume step and clamp it to the allowed range.
    ///
    /// Returns 0 when the volume is below the minimum.
    pub fn normalize_volume(&self, volume: f64) -> f64 {
        if volume.is_nan() || volume < self.volume_min {
            return 0.0;
        }
        let steps = if self.volume_step > 0.0 {
            // Nudge to absorb representation error (0.3 / 0.1 = 2.9999...)
            (volume / self.volume_step + 1e-9).floor()
        } else {
            return volume.min(self.volume_max);
        };
        (steps * self.volume_step).clamp(self.volume_min, self.volume_max)
    }

    /// Round a price to the nearest tick
    pub fn round_price(&self, price: f64) -> f64 {
        if self.tick_size <= 0.0 {
            return price;
        }
        (price / self.tick_size).round() * self.tick_size
    }
}
