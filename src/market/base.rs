//! Symbol and series registry

use super::observers::{ObserverId, Observers};
use super::series::MarketSeries;
use super::subscription::{FeedHooks, SubscriptionCounter, SubscriptionGuard};
use super::symbol::Symbol;
use super::types::{MarketError, SeriesKey, SymbolInfo};
use crate::bar::TimeFrame;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Loads static instrument metadata for a market
pub trait SymbolProvider: Send + Sync {
    /// Metadata for `code`, or `MarketError::UnknownSymbol`
    fn symbol_info(&self, code: &str) -> Result<SymbolInfo, MarketError>;
}

/// Symbol provider backed by a fixed table
#[derive(Debug, Clone, Default)]
pub struct StaticSymbolProvider {
    symbols: HashMap<String, SymbolInfo>,
}

impl StaticSymbolProvider {
    /// Create a provider from a list of instruments
    pub fn new(symbols: impl IntoIterator<Item = SymbolInfo>) -> Self {
        Self {
            symbols: symbols
                .into_iter()
                .map(|info| (info.code.clone(), info))
                .collect(),
        }
    }

    /// Add or replace an instrument
    pub fn insert(&mut self, info: SymbolInfo) {
        self.symbols.insert(info.code.clone(), info);
    }

    /// Number of known instruments
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// True when no instrument is known
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl SymbolProvider for StaticSymbolProvider {
    fn symbol_info(&self, code: &str) -> Result<SymbolInfo, MarketError> {
        self.symbols
            .get(code)
            .cloned()
            .ok_or_else(|| MarketError::UnknownSymbol(code.to_string()))
    }
}

/// Single source of truth for quotes and bar histories of one market.
///
/// Shared by reference (`Arc`) between feeds, the playback engine and
/// participants; all lookups are get-or-create and safe to race.
pub struct MarketBase {
    name: String,
    provider: Arc<dyn SymbolProvider>,
    symbols: RwLock<HashMap<String, Arc<Symbol>>>,
    subscriptions: Arc<SubscriptionCounter>,
    server_time: RwLock<Option<DateTime<Utc>>>,
    started: AtomicBool,
    started_observers: Observers<DateTime<Utc>>,
}

impl MarketBase {
    /// Create a market
    pub fn new(
        name: impl Into<String>,
        provider: Arc<dyn SymbolProvider>,
        feed: Arc<dyn FeedHooks>,
    ) -> Self {
        Self {
            name: name.into(),
            provider,
            symbols: RwLock::new(HashMap::new()),
            subscriptions: Arc::new(SubscriptionCounter::new(feed)),
            server_time: RwLock::new(None),
            started: AtomicBool::new(false),
            started_observers: Observers::new(),
        }
    }

    /// Market name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cached symbol, or one built from the provider's metadata.
    ///
    /// Unknown codes are an error and nothing is cached for them.
    pub fn get_symbol(&self, code: &str) -> Result<Arc<Symbol>, MarketError> {
        if let Some(symbol) = self.symbols.read().get(code) {
            return Ok(Arc::clone(symbol));
        }

        let mut symbols = self.symbols.write();
        // Another caller may have won the race while we waited for the lock
        if let Some(symbol) = symbols.get(code) {
            return Ok(Arc::clone(symbol));
        }
        let info = self.provider.symbol_info(code)?;
        tracing::debug!(market = %self.name, symbol = code, "Creating symbol");
        let symbol = Arc::new(Symbol::new(info));
        symbols.insert(code.to_string(), Arc::clone(&symbol));
        Ok(symbol)
    }

    /// Cached symbol without creating it
    pub fn find_symbol(&self, code: &str) -> Option<Arc<Symbol>> {
        self.symbols.read().get(code).cloned()
    }

    /// All symbols created so far
    pub fn symbols(&self) -> Vec<Arc<Symbol>> {
        self.symbols.read().values().cloned().collect()
    }

    /// Series for (symbol, timeframe), created on first access
    pub fn get_market_series(
        &self,
        code: &str,
        timeframe: TimeFrame,
    ) -> Result<Arc<MarketSeries>, MarketError> {
        Ok(self.get_symbol(code)?.series(timeframe))
    }

    /// Series for a key
    pub fn series_for(&self, key: &SeriesKey) -> Result<Arc<MarketSeries>, MarketError> {
        self.get_market_series(&key.symbol, key.timeframe)
    }

    /// Register interest in a data stream; dropping the guard unsubscribes
    pub fn subscribe(&self, code: &str, timeframe: TimeFrame) -> SubscriptionGuard {
        self.subscriptions.acquire(SeriesKey::new(code, timeframe))
    }

    /// Live interest count for a key
    pub fn subscription_count(&self, key: &SeriesKey) -> usize {
        self.subscriptions.count(key)
    }

    /// Keys with live interest
    pub fn subscribed_keys(&self) -> Vec<SeriesKey> {
        self.subscriptions.active_keys()
    }

    /// Current market time
    pub fn server_time(&self) -> Option<DateTime<Utc>> {
        *self.server_time.read()
    }

    /// Move the market clock
    pub fn set_server_time(&self, time: DateTime<Utc>) {
        *self.server_time.write() = Some(time);
    }

    /// True once the market has started
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Register a started handler
    pub fn on_started<F>(&self, handler: F) -> ObserverId
    where
        F: Fn(&DateTime<Utc>) + Send + Sync + 'static,
    {
        self.started_observers.add(handler)
    }

    /// Remove a started handler
    pub fn remove_started_observer(&self, id: ObserverId) -> bool {
        self.started_observers.remove(id)
    }

    /// Flag the market as started; notifies observers on the first call only
    pub fn mark_started(&self, time: DateTime<Utc>) -> bool {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        tracing::info!(market = %self.name, %time, "Market started");
        self.started_observers.emit(&time);
        true
    }
}

impl std::fmt::Debug for MarketBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketBase")
            .field("name", &self.name)
            .field("symbols", &self.symbols.read().len())
            .field("started", &self.is_started())
            .finish()
    }
}
