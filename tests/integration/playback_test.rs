//! Integration tests for time-stepped historical playback

use chrono::{DateTime, Duration, TimeZone, Utc};
use market_sim::bar::{TimeFrame, TimedBar};
use market_sim::data::{synthetic_bars, BarParquetWriter, InMemoryHistory, ParquetHistory, SyntheticSpec};
use market_sim::market::{MarketSeries, StaticSymbolProvider, SymbolInfo};
use market_sim::participant::SeriesBinding;
use market_sim::simulation::{SimulatedMarket, SimulationConfig, SimulationState};
use parking_lot::Mutex;
use std::sync::Arc;
use tempfile::TempDir;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn provider() -> Arc<StaticSymbolProvider> {
    Arc::new(StaticSymbolProvider::new([
        SymbolInfo::fx("EURUSD"),
        SymbolInfo::fx("GBPUSD"),
    ]))
}

/// Record every finished bar pushed into a series
fn record(series: Arc<MarketSeries>) -> (SeriesBinding, Arc<Mutex<Vec<TimedBar>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let binding = SeriesBinding::bind(series, move |event| {
        if event.finished {
            sink.lock().push(event.bar);
        }
    });
    (binding, seen)
}

#[test]
fn test_clock_steps_skip_missing_bar() {
    let history = InMemoryHistory::new().with(
        "EURUSD",
        TimeFrame::M1,
        [0, 1, 2, 4]
            .into_iter()
            .map(|m| TimedBar::from_price(t0() + Duration::minutes(m), m as f64, 1.0))
            .collect(),
    );
    let mut sim = SimulatedMarket::new(
        SimulationConfig::new(t0(), t0() + Duration::minutes(4)),
        provider(),
        Arc::new(history),
    )
    .unwrap();
    let _guard = sim.market().subscribe("EURUSD", TimeFrame::M1);
    let series = sim.market().get_market_series("EURUSD", TimeFrame::M1).unwrap();
    let (_binding, seen) = record(series);

    sim.initialize();
    let mut emitted_at = vec![(sim.time(), seen.lock().len())];
    loop {
        let more = sim.execute_next_step();
        emitted_at.push((sim.time(), seen.lock().len()));
        if !more {
            break;
        }
    }

    let counts: Vec<usize> = emitted_at.iter().map(|(_, n)| *n).collect();
    assert_eq!(counts, vec![1, 2, 3, 3, 4]);
    assert_eq!(seen.lock()[3].open_time, t0() + Duration::minutes(4));
    assert_eq!(seen.lock()[3].close, 4.0);
}

#[test]
fn test_multiple_timeframes_stay_ordered() {
    // Three days of minutes with a two hour hole
    let mut bars = synthetic_bars(&SyntheticSpec::minutes(t0(), 3 * 24 * 60));
    bars.retain(|b| {
        let offset = (b.open_time - t0()).num_minutes();
        !(600..720).contains(&offset)
    });
    let history = InMemoryHistory::new().with("EURUSD", TimeFrame::M1, bars);

    let mut sim = SimulatedMarket::new(
        SimulationConfig::new(t0(), t0() + Duration::days(3)),
        provider(),
        Arc::new(history),
    )
    .unwrap();

    let timeframes = [TimeFrame::M1, TimeFrame::M5, TimeFrame::M15, TimeFrame::H1, TimeFrame::H4];
    let mut guards = Vec::new();
    let mut recorders = Vec::new();
    for tf in timeframes {
        guards.push(sim.market().subscribe("EURUSD", tf));
        let series = sim.market().get_market_series("EURUSD", tf).unwrap();
        recorders.push((tf, record(series)));
    }

    let summary = sim.run();
    assert_eq!(summary.state, SimulationState::Finished);
    assert_eq!(summary.series_played, timeframes.len());

    for (tf, (_binding, seen)) in &recorders {
        let seen = seen.lock();
        assert!(!seen.is_empty(), "{} produced no bars", tf);
        for pair in seen.windows(2) {
            assert!(pair[0].open_time < pair[1].open_time, "{} out of order", tf);
        }
        for bar in seen.iter() {
            assert!(tf.is_aligned(bar.open_time));
            assert!(bar.high >= bar.open.max(bar.close));
            assert!(bar.low <= bar.open.min(bar.close));
        }
    }

    // The hole leaves two hourly periods without bars
    let (_, (_, hourly)) = &recorders[3];
    let hours: Vec<_> = hourly.lock().iter().map(|b| b.open_time).collect();
    assert!(!hours.contains(&(t0() + Duration::hours(10))));
    assert!(!hours.contains(&(t0() + Duration::hours(11))));
    assert!(hours.contains(&(t0() + Duration::hours(12))));
}

#[test]
fn test_merged_bars_match_source() {
    let bars = synthetic_bars(&SyntheticSpec::minutes(t0(), 24 * 60));
    let history = InMemoryHistory::new().with("EURUSD", TimeFrame::M1, bars.clone());
    let mut sim = SimulatedMarket::new(
        SimulationConfig::new(t0(), t0() + Duration::days(1)),
        provider(),
        Arc::new(history),
    )
    .unwrap();
    let _guard = sim.market().subscribe("EURUSD", TimeFrame::H1);
    let series = sim.market().get_market_series("EURUSD", TimeFrame::H1).unwrap();
    let (_binding, seen) = record(series);

    sim.run();

    // The last hour closes at the end date but its successor bar never arrives
    let seen = seen.lock();
    assert_eq!(seen.len(), 23);
    for (hour, bar) in seen.iter().enumerate() {
        let chunk = &bars[hour * 60..(hour + 1) * 60];
        assert_eq!(bar.open, chunk[0].open);
        assert_eq!(bar.close, chunk[59].close);
        let high = chunk.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let low = chunk.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        let volume: f64 = chunk.iter().map(|b| b.volume).sum();
        assert_eq!(bar.high, high);
        assert_eq!(bar.low, low);
        assert!((bar.volume - volume).abs() < 1e-9);
    }
}

#[test]
fn test_unrelated_series_advance_independently() {
    let history = InMemoryHistory::new()
        .with(
            "EURUSD",
            TimeFrame::M1,
            synthetic_bars(&SyntheticSpec::minutes(t0(), 120)),
        )
        .with(
            "GBPUSD",
            TimeFrame::M1,
            synthetic_bars(&SyntheticSpec::minutes(t0() + Duration::minutes(60), 60)),
        );
    let mut sim = SimulatedMarket::new(
        SimulationConfig::new(t0(), t0() + Duration::minutes(120)),
        provider(),
        Arc::new(history),
    )
    .unwrap();

    let _eur = sim.market().subscribe("EURUSD", TimeFrame::M1);
    let _gbp = sim.market().subscribe("GBPUSD", TimeFrame::M1);
    let (_b1, eur) = record(sim.market().get_market_series("EURUSD", TimeFrame::M1).unwrap());
    let (_b2, gbp) = record(sim.market().get_market_series("GBPUSD", TimeFrame::M1).unwrap());

    let summary = sim.run();
    assert_eq!(eur.lock().len(), 120);
    assert_eq!(gbp.lock().len(), 60);
    assert_eq!(summary.bars_emitted, 180);
}

#[test]
fn test_replay_from_parquet_directory() {
    let temp_dir = TempDir::new().unwrap();
    let bars = synthetic_bars(&SyntheticSpec::minutes(t0(), 600));
    BarParquetWriter::new(temp_dir.path())
        .write_bars("EURUSD", TimeFrame::M1, &bars)
        .unwrap();
    let history = ParquetHistory::load_dir(temp_dir.path()).unwrap();

    let mut sim = SimulatedMarket::new(
        SimulationConfig::new(t0(), t0() + Duration::minutes(600)).with_step(TimeFrame::M5),
        provider(),
        Arc::new(history),
    )
    .unwrap();
    let _guard = sim.market().subscribe("EURUSD", TimeFrame::M1);
    let (_binding, seen) = record(sim.market().get_market_series("EURUSD", TimeFrame::M1).unwrap());

    let summary = sim.run();
    assert_eq!(summary.steps, 120);
    assert_eq!(seen.lock().len(), 600);
    assert_eq!(*seen.lock(), bars);
}
