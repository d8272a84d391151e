//! Integration tests for fine-to-coarse bar aggregation

use chrono::{DateTime, Duration, TimeZone, Utc};
use market_sim::aggregator::{AggregatorConfig, BarAggregator};
use market_sim::bar::{TimeFrame, TimedBar};
use market_sim::data::InMemoryHistory;
use market_sim::market::{MarketBase, NoopFeed, StaticSymbolProvider, SymbolInfo};
use market_sim::participant::SeriesBinding;
use market_sim::simulation::{SimulatedMarket, SimulationConfig};
use parking_lot::Mutex;
use std::sync::Arc;

fn year_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
}

/// Bar i: open = close = i, high = i + 1, low = i - 1, volume 1
fn seeded_bar(i: i64) -> TimedBar {
    let p = i as f64;
    TimedBar::new(
        year_start() + Duration::minutes(i),
        p,
        p + 1.0,
        p - 1.0,
        p,
        1.0,
    )
}

fn provider() -> Arc<StaticSymbolProvider> {
    Arc::new(StaticSymbolProvider::new([SymbolInfo::fx("EURUSD")]))
}

#[test]
fn test_one_year_of_minutes_into_hours() {
    let minutes = 365 * 24 * 60;
    let market = Arc::new(MarketBase::new("live", provider(), Arc::new(NoopFeed)));
    let fine = market.get_market_series("EURUSD", TimeFrame::M1).unwrap();
    let hourly = market.get_market_series("EURUSD", TimeFrame::H1).unwrap();

    let finished = Arc::new(Mutex::new(Vec::new()));
    let sink = finished.clone();
    let _binding = SeriesBinding::bind(hourly.clone(), move |event| {
        if event.finished {
            sink.lock().push(event.bar);
        }
    });

    let aggregator = BarAggregator::new(
        market.clone(),
        "EURUSD",
        TimeFrame::H1,
        AggregatorConfig::default(),
    );
    aggregator.enable().unwrap();

    for i in 0..minutes {
        fine.push(seeded_bar(i), true).unwrap();
    }

    let bars = finished.lock();
    assert_eq!(bars.len() as i64, minutes / 60);
    assert_eq!(hourly.len(), bars.len());
    for (hour, bar) in bars.iter().enumerate() {
        let first = hour as i64 * 60;
        let last = first + 59;
        assert_eq!(bar.open_time, year_start() + Duration::hours(hour as i64));
        assert!(TimeFrame::H1.is_aligned(bar.open_time));
        assert_eq!(bar.open, first as f64);
        assert_eq!(bar.high, (last + 1) as f64);
        assert_eq!(bar.low, (first - 1) as f64);
        assert_eq!(bar.close, last as f64);
        assert_eq!(bar.volume, 60.0);
    }
    assert!(aggregator.current_bar().is_none());
}

#[test]
fn test_partial_range_rounds_up_with_finish() {
    // 150 minutes: two full hours plus a half hour closed by `finish`
    let market = Arc::new(MarketBase::new("live", provider(), Arc::new(NoopFeed)));
    let fine = market.get_market_series("EURUSD", TimeFrame::M1).unwrap();
    let hourly = market.get_market_series("EURUSD", TimeFrame::H1).unwrap();
    let aggregator = BarAggregator::new(
        market.clone(),
        "EURUSD",
        TimeFrame::H1,
        AggregatorConfig::default(),
    );
    aggregator.enable().unwrap();

    for i in 0..150 {
        fine.push(seeded_bar(i), true).unwrap();
    }
    aggregator.finish();

    let bars = hourly.bars();
    assert_eq!(bars.len(), 3);
    assert_eq!(bars[2].volume, 30.0);
    assert_eq!(bars[2].close, 149.0);
}

#[test]
fn test_aggregator_driven_by_playback() {
    let start = year_start();
    let history = InMemoryHistory::new().with(
        "EURUSD",
        TimeFrame::M1,
        (0..24 * 60).map(seeded_bar).collect(),
    );
    let mut sim = SimulatedMarket::new(
        SimulationConfig::new(start, start + Duration::days(1)),
        provider(),
        Arc::new(history),
    )
    .unwrap();
    let market = Arc::clone(sim.market());

    let aggregator = BarAggregator::new(
        market.clone(),
        "EURUSD",
        TimeFrame::H4,
        AggregatorConfig::default(),
    );
    aggregator.enable().unwrap();
    let h4 = market.get_market_series("EURUSD", TimeFrame::H4).unwrap();
    let finished = Arc::new(Mutex::new(Vec::new()));
    let sink = finished.clone();
    let _binding = SeriesBinding::bind(h4.clone(), move |event| {
        if event.finished {
            sink.lock().push(event.bar.open_time);
        }
    });

    let summary = sim.run();

    assert_eq!(summary.bars_emitted, 24 * 60);
    let opens = finished.lock();
    assert_eq!(opens.len(), 6);
    for (i, open) in opens.iter().enumerate() {
        assert_eq!(*open, start + Duration::hours(4 * i as i64));
    }
    assert_eq!(h4.bar(5).unwrap().volume, 240.0);
    // The engine only replays the source series
    assert_eq!(sim.active_series().len(), 1);
}
