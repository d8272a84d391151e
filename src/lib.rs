//! market-sim: deterministic multi-timeframe market data replay
//!
//! This library provides the core components for:
//! - Bars, ticks and timeframes
//! - Symbol and series registry with reference-counted subscriptions
//! - Time-stepped historical playback with fine-to-coarse merging
//! - Live fine-to-coarse bar aggregation
//! - Participant attach/detach lifecycle
//! - Historical data in memory or Parquet
//! - Logging and replay metrics

pub mod aggregator;
pub mod bar;
pub mod cli;
pub mod config;
pub mod data;
pub mod market;
pub mod participant;
pub mod simulation;
pub mod telemetry;
