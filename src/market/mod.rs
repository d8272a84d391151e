//! Market module
//!
//! Symbol and series registries, quote state, observer wiring and
//! reference-counted data subscriptions

mod base;
mod currency;
mod observers;
mod series;
mod subscription;
mod symbol;
mod types;

pub use base::{MarketBase, StaticSymbolProvider, SymbolProvider};
pub use observers::{ObserverId, Observers};
pub use series::{BarEvent, MarketSeries, SeriesUpdate};
pub use subscription::{FeedHooks, NoopFeed, SubscriptionCounter, SubscriptionGuard};
pub use symbol::Symbol;
pub use types::{MarketError, SeriesKey, SymbolInfo, TradeSide};
