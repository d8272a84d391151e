//! Scoped observer registration on a series

use crate::market::{BarEvent, MarketSeries, ObserverId};
use std::sync::Arc;

/// One bar observer on one series, removed when the binding is dropped.
///
/// Removing by id means dropping a binding never touches other observers of
/// the same series.
#[must_use = "the observer is removed when the binding is dropped"]
pub struct SeriesBinding {
    series: Arc<MarketSeries>,
    id: ObserverId,
}

impl SeriesBinding {
    /// Register `handler` on `series`
    pub fn bind<F>(series: Arc<MarketSeries>, handler: F) -> Self
    where
        F: Fn(&BarEvent) + Send + Sync + 'static,
    {
        let id = series.on_bar(handler);
        Self { series, id }
    }

    pub fn series(&self) -> &Arc<MarketSeries> {
        &self.series
    }

    pub fn id(&self) -> ObserverId {
        self.id
    }
}

impl Drop for SeriesBinding {
    fn drop(&mut self) {
        self.series.remove_observer(self.id);
    }
}
