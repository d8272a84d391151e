//! Observer lists for bar, tick and lifecycle events

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_OBSERVER_ID: AtomicU64 = AtomicU64::new(1);

/// Handle identifying one registered observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl ObserverId {
    fn next() -> Self {
        Self(NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Ordered list of event handlers.
///
/// `emit` snapshots the list and calls handlers without holding the lock, so a
/// handler may add or remove observers (including itself) while being called.
pub struct Observers<E> {
    handlers: RwLock<Vec<(ObserverId, Handler<E>)>>,
}

impl<E> Observers<E> {
    /// Create an empty observer list
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register a handler
    pub fn add<F>(&self, handler: F) -> ObserverId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = ObserverId::next();
        self.handlers.write().push((id, Arc::new(handler)));
        id
    }

    /// Remove exactly the handler registered under `id`
    pub fn remove(&self, id: ObserverId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    /// Call every handler in registration order
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Handler<E>> = self
            .handlers
            .read()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in snapshot {
            handler(event);
        }
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// True when nobody is listening
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every handler
    pub fn clear(&self) {
        self.handlers.write().clear();
    }
}

impl<E> Default for Observers<E> {
    fn default() -> Self {
        Self::new()
    }
}
