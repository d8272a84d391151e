//! Participant attach/detach state machine

use super::binding::SeriesBinding;
use super::{ParticipantError, ParticipantHandler};
use crate::bar::TimeFrame;
use crate::market::{MarketBase, MarketError, MarketSeries, ObserverId, SeriesKey, SubscriptionGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Where a participant is in its market lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantState {
    Unattached,
    Attaching,
    Attached,
    Detaching,
}

/// Resources held for one bound subscription
struct Attachment {
    series: Arc<MarketSeries>,
    _binding: SeriesBinding,
    _guard: SubscriptionGuard,
}

/// A declared data dependency of a participant
pub struct MarketDataSubscription {
    key: SeriesKey,
    optional: bool,
    attachment: Option<Attachment>,
}

impl MarketDataSubscription {
    fn new(key: SeriesKey, optional: bool) -> Self {
        Self {
            key,
            optional,
            attachment: None,
        }
    }

    pub fn key(&self) -> &SeriesKey {
        &self.key
    }

    pub fn symbol(&self) -> &str {
        &self.key.symbol
    }

    pub fn timeframe(&self) -> TimeFrame {
        self.key.timeframe
    }

    /// Optional subscriptions may fail to resolve without failing the attach
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// True while bound to a market series
    pub fn is_active(&self) -> bool {
        self.attachment.is_some()
    }

    /// Series bound while active
    pub fn series(&self) -> Option<&Arc<MarketSeries>> {
        self.attachment.as_ref().map(|a| &a.series)
    }
}

/// Started observer registration, removed on drop
struct StartedBinding {
    market: Arc<MarketBase>,
    id: ObserverId,
}

impl Drop for StartedBinding {
    fn drop(&mut self) {
        self.market.remove_started_observer(self.id);
    }
}

/// Observer of a market with a declared set of subscriptions
pub struct MarketParticipant {
    name: String,
    handler: Arc<dyn ParticipantHandler>,
    subscriptions: Vec<MarketDataSubscription>,
    state: ParticipantState,
    market: Option<Arc<MarketBase>>,
    started: Option<StartedBinding>,
}

impl MarketParticipant {
    pub fn new(name: impl Into<String>, handler: Arc<dyn ParticipantHandler>) -> Self {
        Self {
            name: name.into(),
            handler,
            subscriptions: Vec::new(),
            state: ParticipantState::Unattached,
            market: None,
            started: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ParticipantState {
        self.state
    }

    /// Market currently attached to
    pub fn market(&self) -> Option<&Arc<MarketBase>> {
        self.market.as_ref()
    }

    pub fn subscriptions(&self) -> &[MarketDataSubscription] {
        &self.subscriptions
    }

    /// Subscription for a key, if declared
    pub fn subscription(&self, symbol: &str, timeframe: TimeFrame) -> Option<&MarketDataSubscription> {
        self.subscriptions
            .iter()
            .find(|s| s.symbol() == symbol && s.timeframe() == timeframe)
    }

    /// Declare a data dependency.
    ///
    /// When already attached the subscription is bound right away, with the
    /// same optional/mandatory rules as `attach`. Declaring a key twice is a
    /// no-op.
    pub fn add_subscription(
        &mut self,
        symbol: &str,
        timeframe: TimeFrame,
        optional: bool,
    ) -> Result<(), ParticipantError> {
        if self.subscription(symbol, timeframe).is_some() {
            return Ok(());
        }
        self.subscriptions
            .push(MarketDataSubscription::new(SeriesKey::new(symbol, timeframe), optional));

        if self.state != ParticipantState::Attached {
            return Ok(());
        }
        let Some(market) = self.market.clone() else {
            return Ok(());
        };
        let index = self.subscriptions.len() - 1;
        if let Err(source) = self.bind(index, &market) {
            let key = self.subscriptions[index].key.clone();
            if optional {
                tracing::warn!(participant = %self.name, subscription = %key, error = %source, "Optional subscription unavailable");
            } else {
                self.subscriptions.pop();
                return Err(ParticipantError::MandatorySubscription { key, source });
            }
        }
        Ok(())
    }

    /// Bind every declared subscription on `market`.
    ///
    /// A mandatory subscription that cannot be resolved releases everything
    /// acquired so far and leaves the participant unattached.
    pub fn attach(&mut self, market: Arc<MarketBase>) -> Result<(), ParticipantError> {
        if let Some(current) = &self.market {
            return Err(ParticipantError::AlreadyAttached(current.name().to_string()));
        }

        self.state = ParticipantState::Attaching;
        self.market = Some(Arc::clone(&market));

        for index in 0..self.subscriptions.len() {
            let Err(source) = self.bind(index, &market) else {
                continue;
            };
            let key = self.subscriptions[index].key.clone();
            if self.subscriptions[index].optional {
                tracing::warn!(
                    participant = %self.name,
                    subscription = %key,
                    error = %source,
                    "Optional subscription unavailable"
                );
                continue;
            }

            tracing::error!(
                participant = %self.name,
                subscription = %key,
                error = %source,
                "Mandatory subscription unavailable"
            );
            self.release();
            return Err(ParticipantError::MandatorySubscription { key, source });
        }

        self.bind_started(&market);
        self.state = ParticipantState::Attached;
        tracing::info!(
            participant = %self.name,
            market = %market.name(),
            active = self.subscriptions.iter().filter(|s| s.is_active()).count(),
            "Participant attached"
        );
        Ok(())
    }

    /// Release every binding and subscription. No-op when unattached.
    pub fn detach(&mut self) {
        if self.market.is_none() {
            return;
        }
        self.state = ParticipantState::Detaching;
        let market = self.market.as_ref().map(|m| m.name().to_string());
        self.release();
        tracing::info!(participant = %self.name, market = ?market, "Participant detached");
    }

    /// Move to another market (or none), detaching from the current one first
    pub fn set_market(&mut self, market: Option<Arc<MarketBase>>) -> Result<(), ParticipantError> {
        if let (Some(current), Some(next)) = (&self.market, &market) {
            if Arc::ptr_eq(current, next) {
                return Ok(());
            }
        }
        self.detach();
        match market {
            Some(market) => self.attach(market),
            None => Ok(()),
        }
    }

    fn bind(&mut self, index: usize, market: &Arc<MarketBase>) -> Result<(), MarketError> {
        let subscription = &mut self.subscriptions[index];
        let series = market.series_for(&subscription.key)?;
        let guard = market.subscribe(subscription.symbol(), subscription.timeframe());

        let handler = Arc::clone(&self.handler);
        let binding = SeriesBinding::bind(Arc::clone(&series), move |event| {
            handler.on_bar(&event.key.symbol, event.key.timeframe, &event.bar);
            if event.finished {
                handler.on_bar_finished(&event.key.symbol, event.key.timeframe);
            }
        });

        subscription.attachment = Some(Attachment {
            series,
            _binding: binding,
            _guard: guard,
        });
        Ok(())
    }

    /// Deliver the started signal once, now if the market already started
    fn bind_started(&mut self, market: &Arc<MarketBase>) {
        let fired = Arc::new(AtomicBool::new(false));

        let handler = Arc::clone(&self.handler);
        let once = Arc::clone(&fired);
        let id = market.on_started(move |time| {
            if !once.swap(true, Ordering::SeqCst) {
                handler.on_started(*time);
            }
        });
        self.started = Some(StartedBinding {
            market: Arc::clone(market),
            id,
        });

        if market.is_started() && !fired.swap(true, Ordering::SeqCst) {
            if let Some(time) = market.server_time() {
                self.handler.on_started(time);
            }
        }
    }

    fn release(&mut self) {
        self.started = None;
        for subscription in &mut self.subscriptions {
            subscription.attachment = None;
        }
        self.market = None;
        self.state = ParticipantState::Unattached;
    }
}

impl Drop for MarketParticipant {
    fn drop(&mut self) {
        self.detach();
    }
}
