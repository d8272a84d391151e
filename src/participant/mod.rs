//! Market participants
//!
//! A participant declares the (symbol, timeframe) streams it wants; attaching
//! it to a market turns those into live subscriptions and observer bindings,
//! detaching releases every one of them.

mod binding;
mod indicator;
mod lifecycle;

pub use binding::SeriesBinding;
pub use indicator::{BarIndicator, IndicatorParticipant};
pub use lifecycle::{MarketDataSubscription, MarketParticipant, ParticipantState};

use crate::bar::{TimeFrame, TimedBar};
use crate::market::{MarketError, SeriesKey};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Callbacks a participant receives from the market
pub trait ParticipantHandler: Send + Sync {
    /// A bar was appended or updated on a subscribed series
    fn on_bar(&self, symbol: &str, timeframe: TimeFrame, bar: &TimedBar);

    /// The bar just delivered through `on_bar` closed its period
    fn on_bar_finished(&self, _symbol: &str, _timeframe: TimeFrame) {}

    /// The market started; called once per attachment
    fn on_started(&self, _time: DateTime<Utc>) {}
}

/// Participant attach errors
#[derive(Debug, Error)]
pub enum ParticipantError {
    #[error("mandatory subscription {key} unavailable: {source}")]
    MandatorySubscription {
        key: SeriesKey,
        #[source]
        source: MarketError,
    },

    #[error("participant already attached to market {0}")]
    AlreadyAttached(String),
}
