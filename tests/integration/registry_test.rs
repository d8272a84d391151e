//! Integration tests for the symbol and series registry

use market_sim::bar::TimeFrame;
use market_sim::market::{
    FeedHooks, MarketBase, MarketError, SeriesKey, StaticSymbolProvider, SymbolInfo, TradeSide,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

#[derive(Default)]
struct CountingFeed {
    subscribed: AtomicUsize,
    unsubscribed: AtomicUsize,
}

impl FeedHooks for CountingFeed {
    fn subscribe(&self, _key: &SeriesKey) {
        self.subscribed.fetch_add(1, Ordering::SeqCst);
    }

    fn unsubscribe(&self, _key: &SeriesKey) {
        self.unsubscribed.fetch_add(1, Ordering::SeqCst);
    }
}

fn market(feed: Arc<CountingFeed>) -> Arc<MarketBase> {
    Arc::new(MarketBase::new(
        "registry",
        Arc::new(StaticSymbolProvider::new([
            SymbolInfo::fx("EURUSD"),
            SymbolInfo::fx("USDJPY"),
        ])),
        feed,
    ))
}

#[test]
fn test_resolution_is_idempotent_across_threads() {
    let market = market(Arc::new(CountingFeed::default()));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let market = Arc::clone(&market);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (
                    market.get_symbol("EURUSD").unwrap(),
                    market.get_market_series("EURUSD", TimeFrame::H1).unwrap(),
                )
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for (symbol, series) in &results[1..] {
        assert!(Arc::ptr_eq(symbol, &results[0].0));
        assert!(Arc::ptr_eq(series, &results[0].1));
    }
    assert_eq!(market.symbols().len(), 1);
}

#[test]
fn test_unknown_symbol_is_an_error() {
    let market = market(Arc::new(CountingFeed::default()));
    assert_eq!(
        market.get_market_series("XXXYYY", TimeFrame::M1).err(),
        Some(MarketError::UnknownSymbol("XXXYYY".to_string()))
    );
    assert!(market.find_symbol("XXXYYY").is_none());
}

#[test]
fn test_concurrent_subscriptions_fire_hooks_once() {
    const THREADS: usize = 16;
    const ROUNDS: usize = 50;

    let feed = Arc::new(CountingFeed::default());
    let market = market(feed.clone());
    let key = SeriesKey::new("EURUSD", TimeFrame::M1);
    let barrier = Arc::new(Barrier::new(THREADS));

    // Hold one subscription so the count never drops to zero mid-test
    let anchor = market.subscribe("EURUSD", TimeFrame::M1);

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let market = Arc::clone(&market);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..ROUNDS {
                    let guard = market.subscribe("EURUSD", TimeFrame::M1);
                    drop(guard);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(market.subscription_count(&key), 1);
    drop(anchor);
    assert_eq!(market.subscription_count(&key), 0);
    assert_eq!(feed.subscribed.load(Ordering::SeqCst), 1);
    assert_eq!(feed.unsubscribed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_n_subscribes_then_n_releases() {
    let feed = Arc::new(CountingFeed::default());
    let market = market(feed.clone());

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let market = Arc::clone(&market);
            thread::spawn(move || market.subscribe("USDJPY", TimeFrame::M5))
        })
        .collect();
    let guards: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(feed.subscribed.load(Ordering::SeqCst), 1);

    let handles: Vec<_> = guards
        .into_iter()
        .map(|guard| thread::spawn(move || drop(guard)))
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(feed.unsubscribed.load(Ordering::SeqCst), 1);
    assert!(market.subscribed_keys().is_empty());
}

#[test]
fn test_conversion_through_registry() {
    let market = market(Arc::new(CountingFeed::default()));
    let time = chrono::Utc::now();

    // No quotes yet
    assert!(matches!(
        market.convert(100.0, "EUR", "USD", TradeSide::Buy),
        Err(MarketError::QuoteUnavailable(_))
    ));

    market
        .get_symbol("EURUSD")
        .unwrap()
        .update_quote(time, 1.10, 1.12);
    market
        .get_symbol("USDJPY")
        .unwrap()
        .update_quote(time, 150.0, 151.0);

    let usd = market.convert(100.0, "EUR", "USD", TradeSide::Buy).unwrap();
    assert!((usd - 112.0).abs() < 1e-9);
    let eur = market.convert(110.0, "USD", "EUR", TradeSide::Sell).unwrap();
    assert!((eur - 100.0).abs() < 1e-9);
    let jpy = market.convert(2.0, "USD", "JPY", TradeSide::Sell).unwrap();
    assert!((jpy - 300.0).abs() < 1e-9);
    assert!(matches!(
        market.convert(1.0, "EUR", "JPY", TradeSide::Buy),
        Err(MarketError::ConversionUnavailable { .. })
    ));
}
