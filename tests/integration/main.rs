//! Integration tests for market-sim

mod aggregator_test;
mod participant_test;
mod playback_test;
mod registry_test;
