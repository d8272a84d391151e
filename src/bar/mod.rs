//! Bar module
//!
//! OHLCV bars, quote ticks and the timeframes bars are sampled at

mod timeframe;
mod types;

pub use timeframe::{ParseTimeFrameError, TimeFrame};
pub use types::{Tick, TimedBar};
