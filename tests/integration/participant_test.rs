//! Integration tests for participants attached to a simulated market

use chrono::{DateTime, Duration, TimeZone, Utc};
use market_sim::bar::{TimeFrame, TimedBar};
use market_sim::data::{synthetic_bars, InMemoryHistory, SyntheticSpec};
use market_sim::market::{SeriesKey, StaticSymbolProvider, SymbolInfo};
use market_sim::participant::{
    MarketParticipant, ParticipantError, ParticipantHandler, ParticipantState,
};
use market_sim::simulation::{SimulatedMarket, SimulationConfig};
use parking_lot::Mutex;
use std::sync::Arc;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

#[derive(Default)]
struct Recorder {
    bars: Mutex<Vec<(String, TimeFrame, TimedBar)>>,
    finished: Mutex<usize>,
    started: Mutex<Vec<DateTime<Utc>>>,
}

impl ParticipantHandler for Recorder {
    fn on_bar(&self, symbol: &str, timeframe: TimeFrame, bar: &TimedBar) {
        self.bars.lock().push((symbol.to_string(), timeframe, *bar));
    }

    fn on_bar_finished(&self, _symbol: &str, _timeframe: TimeFrame) {
        *self.finished.lock() += 1;
    }

    fn on_started(&self, time: DateTime<Utc>) {
        self.started.lock().push(time);
    }
}

fn simulation(minutes: usize) -> SimulatedMarket {
    let history = InMemoryHistory::new().with(
        "EURUSD",
        TimeFrame::M1,
        synthetic_bars(&SyntheticSpec::minutes(t0(), minutes)),
    );
    SimulatedMarket::new(
        SimulationConfig::new(t0(), t0() + Duration::minutes(minutes as i64)),
        Arc::new(StaticSymbolProvider::new([SymbolInfo::fx("EURUSD")])),
        Arc::new(history),
    )
    .unwrap()
}

#[test]
fn test_optional_subscription_skipped_mandatory_bound() {
    let mut sim = simulation(60);
    let recorder = Arc::new(Recorder::default());
    let mut participant = MarketParticipant::new("strategy", recorder.clone());
    participant
        .add_subscription("EURUSD", TimeFrame::M1, false)
        .unwrap();
    participant
        .add_subscription("XAUUSD", TimeFrame::H1, true)
        .unwrap();

    participant.attach(sim.market().clone()).unwrap();
    assert_eq!(participant.state(), ParticipantState::Attached);
    assert!(participant.subscription("EURUSD", TimeFrame::M1).unwrap().is_active());
    assert!(!participant.subscription("XAUUSD", TimeFrame::H1).unwrap().is_active());

    sim.run();

    let bars = recorder.bars.lock();
    assert_eq!(bars.len(), 60);
    assert!(bars.iter().all(|(symbol, tf, _)| symbol == "EURUSD" && *tf == TimeFrame::M1));
    assert_eq!(*recorder.finished.lock(), 60);
}

#[test]
fn test_missing_mandatory_subscription_fails_attach() {
    let sim = simulation(10);
    let recorder = Arc::new(Recorder::default());
    let mut participant = MarketParticipant::new("strategy", recorder);
    participant
        .add_subscription("EURUSD", TimeFrame::M1, false)
        .unwrap();
    participant
        .add_subscription("XAUUSD", TimeFrame::M1, false)
        .unwrap();

    let err = participant.attach(sim.market().clone()).unwrap_err();
    assert!(matches!(err, ParticipantError::MandatorySubscription { .. }));
    assert_eq!(participant.state(), ParticipantState::Unattached);
    assert!(participant.market().is_none());
    assert_eq!(
        sim.market()
            .subscription_count(&SeriesKey::new("EURUSD", TimeFrame::M1)),
        0
    );
}

#[test]
fn test_started_delivered_once_at_start() {
    let mut sim = simulation(30);
    let early = Arc::new(Recorder::default());
    let mut before = MarketParticipant::new("early", early.clone());
    before.add_subscription("EURUSD", TimeFrame::M1, false).unwrap();
    before.attach(sim.market().clone()).unwrap();

    sim.initialize();
    assert_eq!(*early.started.lock(), vec![t0()]);

    // Attaching after the start fires immediately with the server time
    for _ in 0..5 {
        sim.execute_next_step();
    }
    let late = Arc::new(Recorder::default());
    let mut after = MarketParticipant::new("late", late.clone());
    after.attach(sim.market().clone()).unwrap();
    assert_eq!(*late.started.lock(), vec![t0() + Duration::minutes(5)]);

    sim.run();
    assert_eq!(early.started.lock().len(), 1);
    assert_eq!(late.started.lock().len(), 1);
}

#[test]
fn test_detached_participant_stops_playback() {
    let mut sim = simulation(60);
    let recorder = Arc::new(Recorder::default());
    let mut participant = MarketParticipant::new("strategy", recorder.clone());
    participant
        .add_subscription("EURUSD", TimeFrame::M1, false)
        .unwrap();
    participant.attach(sim.market().clone()).unwrap();

    sim.initialize();
    for _ in 0..30 {
        sim.execute_next_step();
    }
    assert_eq!(recorder.bars.lock().len(), 31);

    participant.detach();
    assert_eq!(participant.state(), ParticipantState::Unattached);
    assert!(!participant.subscription("EURUSD", TimeFrame::M1).unwrap().is_active());

    sim.run();
    assert_eq!(recorder.bars.lock().len(), 31);
    assert!(sim.active_series().is_empty());
}

#[test]
fn test_two_participants_share_one_series() {
    let mut sim = simulation(20);
    let first = Arc::new(Recorder::default());
    let second = Arc::new(Recorder::default());
    let mut a = MarketParticipant::new("a", first.clone());
    let mut b = MarketParticipant::new("b", second.clone());
    for participant in [&mut a, &mut b] {
        participant
            .add_subscription("EURUSD", TimeFrame::M1, false)
            .unwrap();
        participant.attach(sim.market().clone()).unwrap();
    }

    let key = SeriesKey::new("EURUSD", TimeFrame::M1);
    assert_eq!(sim.market().subscription_count(&key), 2);

    sim.initialize();
    for _ in 0..10 {
        sim.execute_next_step();
    }
    drop(a);
    assert_eq!(sim.market().subscription_count(&key), 1);

    sim.run();
    assert_eq!(first.bars.lock().len(), 11);
    assert_eq!(second.bars.lock().len(), 20);

    let closes: Vec<f64> = second.bars.lock().iter().map(|(_, _, bar)| bar.close).collect();
    let series = sim.market().get_market_series("EURUSD", TimeFrame::M1).unwrap();
    assert_eq!(closes, series.bars().iter().map(|b| b.close).collect::<Vec<_>>());
}
