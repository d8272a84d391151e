//! Per-instrument state: quotes, tick fan-out and series cache

use super::observers::{ObserverId, Observers};
use super::series::MarketSeries;
use super::types::{SeriesKey, SymbolInfo};
use crate::bar::{Tick, TimeFrame};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
struct Quote {
    bid: f64,
    ask: f64,
    time: Option<DateTime<Utc>>,
}

/// A traded instrument
pub struct Symbol {
    info: SymbolInfo,
    code: Arc<str>,
    quote: RwLock<Quote>,
    ticks: Observers<Tick>,
    series: RwLock<HashMap<TimeFrame, Arc<MarketSeries>>>,
}

impl Symbol {
    /// Create a symbol with no quote yet
    pub fn new(info: SymbolInfo) -> Self {
        let code: Arc<str> = Arc::from(info.code.as_str());
        Self {
            info,
            code,
            quote: RwLock::new(Quote {
                bid: f64::NAN,
                ask: f64::NAN,
                time: None,
            }),
            ticks: Observers::new(),
            series: RwLock::new(HashMap::new()),
        }
    }

    /// Symbol code
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Static metadata
    pub fn info(&self) -> &SymbolInfo {
        &self.info
    }

    /// Current bid, NaN until the first quote
    pub fn bid(&self) -> f64 {
        self.quote.read().bid
    }

    /// Current ask, NaN until the first quote
    pub fn ask(&self) -> f64 {
        self.quote.read().ask
    }

    /// Ask minus bid
    pub fn spread(&self) -> f64 {
        let quote = self.quote.read();
        quote.ask - quote.bid
    }

    /// Time of the last quote
    pub fn last_quote_time(&self) -> Option<DateTime<Utc>> {
        self.quote.read().time
    }

    /// True once both sides are quoted
    pub fn has_quote(&self) -> bool {
        let quote = self.quote.read();
        !quote.bid.is_nan() && !quote.ask.is_nan()
    }

    /// Store a new quote and fan the tick out to tick observers
    pub fn update_quote(&self, time: DateTime<Utc>, bid: f64, ask: f64) {
        {
            let mut quote = self.quote.write();
            quote.bid = bid;
            quote.ask = ask;
            quote.time = Some(time);
        }
        self.ticks.emit(&Tick::new(time, bid, ask));
    }

    /// Register a tick observer
    pub fn on_tick<F>(&self, handler: F) -> ObserverId
    where
        F: Fn(&Tick) + Send + Sync + 'static,
    {
        self.ticks.add(handler)
    }

    /// Remove a tick observer
    pub fn remove_tick_observer(&self, id: ObserverId) -> bool {
        self.ticks.remove(id)
    }

    /// Number of tick observers
    pub fn tick_observer_count(&self) -> usize {
        self.ticks.len()
    }

    /// Series for a timeframe, created on first access
    pub fn series(&self, timeframe: TimeFrame) -> Arc<MarketSeries> {
        if let Some(series) = self.series.read().get(&timeframe) {
            return Arc::clone(series);
        }
        let mut map = self.series.write();
        Arc::clone(map.entry(timeframe).or_insert_with(|| {
            Arc::new(MarketSeries::new(SeriesKey::new(
                Arc::clone(&self.code),
                timeframe,
            )))
        }))
    }

    /// Series already created for this symbol
    pub fn cached_series(&self) -> Vec<Arc<MarketSeries>> {
        self.series.read().values().cloned().collect()
    }
}

impl std::fmt::Debug for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let quote = *self.quote.read();
        f.debug_struct("Symbol")
            .field("code", &self.code)
            .field("bid", &quote.bid)
            .field("ask", &quote.ask)
            .finish()
    }
}
