use crate::core::types::{TradeLockEvent, TradeLockState};
use crate::events::dispatcher::{BusEvent, EventBus, SubscriptionHandle, Topic};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

/// Tracks the lock progress of one two-party trade.
///
/// State changes only via the event stream: lock updates for the tracked
/// trade move the flags, both-parties-locked completes the trade, and
/// the completion transition emits the one-time `TradeCompleted` signal
/// after a short user-visible delay. Updates for other trades are
/// ignored, and the completed state is terminal - redelivery of the
/// final update neither changes state nor re-fires the signal.
///
/// The tracker owns its bus subscription; dropping it (when the trade
/// view closes) releases the listener.
pub struct TradeLockTracker {
    inner: Arc<TrackerInner>,
    _subscription: SubscriptionHandle,
}

struct TrackerInner {
    trade_request_id: String,
    state: Mutex<TradeLockState>,
    bus: EventBus,
    completed_signal_delay: Duration,
}

impl TradeLockTracker {
    pub fn new(
        trade_request_id: impl Into<String>,
        bus: EventBus,
        completed_signal_delay: Duration,
    ) -> Self {
        let inner = Arc::new(TrackerInner {
            trade_request_id: trade_request_id.into(),
            state: Mutex::new(TradeLockState::default()),
            bus: bus.clone(),
            completed_signal_delay,
        });

        let observer = Arc::clone(&inner);
        let subscription = bus.subscribe(Topic::TradeLock, move |event| {
            if let BusEvent::TradeLock(update) = event {
                observer.observe(update);
            }
        });

        Self {
            inner,
            _subscription: subscription,
        }
    }

    pub fn trade_request_id(&self) -> &str {
        &self.inner.trade_request_id
    }

    pub fn state(&self) -> TradeLockState {
        *lock_ignore_poison(&self.inner.state)
    }

    pub fn progress_percent(&self) -> u8 {
        self.state().progress_percent()
    }

    pub fn is_completed(&self) -> bool {
        self.state().completed
    }
}

impl TrackerInner {
    fn observe(&self, update: &TradeLockEvent) {
        if update.trade_request_id != self.trade_request_id {
            return;
        }

        let mut state = lock_ignore_poison(&self.state);
        if state.completed {
            // Terminal. Duplicate delivery of the final update lands here.
            return;
        }

        state.owner_locked = update.owner_locked;
        state.requester_locked = update.requester_locked;
        debug!(
            trade = %self.trade_request_id,
            progress = state.progress_percent(),
            message = ?update.message,
            "trade lock progress"
        );

        if state.owner_locked && state.requester_locked {
            state.completed = true;
            drop(state);
            self.schedule_completed_signal();
        }
    }

    fn schedule_completed_signal(&self) {
        info!(trade = %self.trade_request_id, "trade fully locked");
        let bus = self.bus.clone();
        let trade_request_id = self.trade_request_id.clone();
        let delay = self.completed_signal_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            bus.publish(&BusEvent::TradeCompleted { trade_request_id });
        });
    }
}

fn lock_ignore_poison<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
