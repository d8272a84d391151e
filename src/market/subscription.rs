//! Reference-counted market data subscriptions
//!
//! Many consumers may want the same (symbol, timeframe) stream. The counter
//! keeps one count per key and only calls the feed when the first consumer
//! arrives (0→1) or the last one leaves (1→0).

use super::types::SeriesKey;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Feed-specific activation hooks
pub trait FeedHooks: Send + Sync {
    /// First consumer subscribed to `key`
    fn subscribe(&self, key: &SeriesKey);
    /// Last consumer released `key`
    fn unsubscribe(&self, key: &SeriesKey);
}

/// Feed that needs no activation
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFeed;

impl FeedHooks for NoopFeed {
    fn subscribe(&self, _key: &SeriesKey) {}
    fn unsubscribe(&self, _key: &SeriesKey) {}
}

/// Per-key interest counter.
///
/// Count changes and the transition hooks run under the same lock, so each
/// 0→1 and 1→0 transition calls its hook exactly once, in order. Hooks must not
/// call back into the counter.
pub struct SubscriptionCounter {
    counts: Mutex<HashMap<SeriesKey, usize>>,
    hooks: Arc<dyn FeedHooks>,
}

impl SubscriptionCounter {
    /// Create a counter that drives `hooks`
    pub fn new(hooks: Arc<dyn FeedHooks>) -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
            hooks,
        }
    }

    /// Register interest in `key`; the returned guard releases it on drop
    pub fn acquire(self: &Arc<Self>, key: SeriesKey) -> SubscriptionGuard {
        {
            let mut counts = self.counts.lock();
            let count = counts.entry(key.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                tracing::debug!(key = %key, "Activating market data subscription");
                self.hooks.subscribe(&key);
            }
        }
        SubscriptionGuard {
            counter: Arc::clone(self),
            key,
            released: false,
        }
    }

    fn release(&self, key: &SeriesKey) {
        let mut counts = self.counts.lock();
        let Some(count) = counts.get_mut(key) else {
            return;
        };
        *count = count.saturating_sub(1);
        if *count == 0 {
            counts.remove(key);
            tracing::debug!(key = %key, "Deactivating market data subscription");
            self.hooks.unsubscribe(key);
        }
    }

    /// Current count for `key`
    pub fn count(&self, key: &SeriesKey) -> usize {
        self.counts.lock().get(key).copied().unwrap_or(0)
    }

    /// Keys with at least one consumer
    pub fn active_keys(&self) -> Vec<SeriesKey> {
        self.counts.lock().keys().cloned().collect()
    }
}

/// Releases one unit of interest when dropped
#[must_use = "dropping the guard unsubscribes immediately"]
pub struct SubscriptionGuard {
    counter: Arc<SubscriptionCounter>,
    key: SeriesKey,
    released: bool,
}

impl SubscriptionGuard {
    /// Subscribed key
    pub fn key(&self) -> &SeriesKey {
        &self.key
    }

    /// Release now; later calls and the drop are no-ops
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.counter.release(&self.key);
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionGuard")
            .field("key", &self.key)
            .field("released", &self.released)
            .finish()
    }
}
