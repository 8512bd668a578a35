use crate::core::types::{CanonicalEvent, EventKind, TradeLockEvent};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tracing::trace;

/// A message carried on the bus.
#[derive(Debug, Clone)]
pub enum BusEvent {
    /// A normalized, deduplicated event from the push channel.
    Event(CanonicalEvent),
    /// A trade lock-progress update, routed untouched to trackers.
    TradeLock(TradeLockEvent),
    /// One-time signal that both parties locked a trade.
    TradeCompleted { trade_request_id: String },
    /// The session was torn down after an irrecoverable refresh failure.
    SessionCleared,
}

impl BusEvent {
    fn topic(&self) -> Topic {
        match self {
            Self::Event(event) => Topic::Kind(event.kind()),
            Self::TradeLock(_) => Topic::TradeLock,
            Self::TradeCompleted { .. } => Topic::TradeCompleted,
            Self::SessionCleared => Topic::SessionCleared,
        }
    }
}

/// Subscription key: one topic per canonical kind plus the cross-cutting
/// signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Kind(EventKind),
    TradeLock,
    TradeCompleted,
    SessionCleared,
}

type Handler = Arc<dyn Fn(&BusEvent) + Send + Sync>;

#[derive(Default)]
struct BusInner {
    next_id: u64,
    topics: HashMap<Topic, Vec<(u64, Handler)>>,
}

/// Explicit publish/subscribe interface between the session/event layer
/// and its consumers.
///
/// Handlers are plain callbacks invoked synchronously on the publishing
/// task; they must not block. Subscribers hold a `SubscriptionHandle`
/// and are removed when it drops, so listeners never leak after a
/// component stops caring.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a topic. The handler lives until the
    /// returned handle is dropped or explicitly unsubscribed.
    pub fn subscribe(
        &self,
        topic: Topic,
        handler: impl Fn(&BusEvent) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        let mut inner = lock_ignore_poison(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner
            .topics
            .entry(topic)
            .or_default()
            .push((id, Arc::new(handler)));
        SubscriptionHandle {
            bus: Arc::downgrade(&self.inner),
            topic,
            id,
        }
    }

    /// Deliver an event to every handler registered for its topic.
    pub fn publish(&self, event: &BusEvent) {
        let topic = event.topic();
        // Snapshot the handler list so callbacks can subscribe or drop
        // handles without deadlocking on the bus lock.
        let handlers: Vec<Handler> = {
            let inner = lock_ignore_poison(&self.inner);
            inner
                .topics
                .get(&topic)
                .map(|entries| entries.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default()
        };
        trace!(?topic, listeners = handlers.len(), "dispatching bus event");
        for handler in handlers {
            handler(event);
        }
    }

    #[cfg(test)]
    fn handler_count(&self, topic: Topic) -> usize {
        lock_ignore_poison(&self.inner)
            .topics
            .get(&topic)
            .map_or(0, Vec::len)
    }
}

/// Scoped registration: dropping the handle removes the handler.
pub struct SubscriptionHandle {
    bus: Weak<Mutex<BusInner>>,
    topic: Topic,
    id: u64,
}

impl SubscriptionHandle {
    /// Remove the handler now instead of waiting for drop.
    pub fn unsubscribe(self) {
        drop(self);
    }

    fn remove(&self) {
        if let Some(inner) = self.bus.upgrade() {
            let mut inner = lock_ignore_poison(&inner);
            if let Some(entries) = inner.topics.get_mut(&self.topic) {
                entries.retain(|(id, _)| *id != self.id);
            }
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.remove();
    }
}

fn lock_ignore_poison<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
