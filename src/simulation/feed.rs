//! Feed hooks that route market subscriptions to the playback engine

use crate::market::{FeedHooks, SeriesKey};
use parking_lot::Mutex;

/// Subscription change waiting for the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedRequest {
    Subscribe(SeriesKey),
    Unsubscribe(SeriesKey),
}

/// Queues subscription transitions; the engine drains them at the start of
/// every pass.
#[derive(Debug, Default)]
pub struct SimulationFeed {
    pending: Mutex<Vec<FeedRequest>>,
}

impl SimulationFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every queued request, oldest first
    pub fn drain(&self) -> Vec<FeedRequest> {
        std::mem::take(&mut *self.pending.lock())
    }

    /// Number of queued requests
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

impl FeedHooks for SimulationFeed {
    fn subscribe(&self, key: &SeriesKey) {
        self.pending.lock().push(FeedRequest::Subscribe(key.clone()));
    }

    fn unsubscribe(&self, key: &SeriesKey) {
        self.pending
            .lock()
            .push(FeedRequest::Unsubscribe(key.clone()));
    }
}
