use crate::core::kernel::{PushSocket, SocketFactory};
use crate::core::types::{CanonicalEvent, ConnectionState, EventKind};
use crate::events::dispatcher::{BusEvent, EventBus, SubscriptionHandle, Topic};
use crate::events::normalizer::EventNormalizer;
use crate::push::protocol::WireFrame;
use crate::session::credentials::CredentialStore;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Reconnect delay schedule in seconds; the last entry repeats.
const RECONNECT_SCHEDULE_SECS: [u64; 6] = [0, 2, 5, 10, 15, 30];

/// Tuning for the push connection.
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// Consecutive failed attempts tolerated before the channel goes
    /// terminal.
    pub max_reconnect_attempts: u32,
    /// Delay before each reconnect attempt; indexed by attempt number,
    /// last entry repeating.
    pub reconnect_schedule: Vec<Duration>,
    /// Upper bound of the random component added to each delay, so a
    /// fleet of clients does not reconnect in lockstep.
    pub jitter_ms: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 6,
            reconnect_schedule: RECONNECT_SCHEDULE_SECS
                .iter()
                .map(|secs| Duration::from_secs(*secs))
                .collect(),
            jitter_ms: 250,
        }
    }
}

impl PushConfig {
    fn delay_for(&self, attempt: u32) -> Duration {
        let index = (attempt as usize).min(self.reconnect_schedule.len().saturating_sub(1));
        let base = self
            .reconnect_schedule
            .get(index)
            .copied()
            .unwrap_or_default();
        if self.jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..self.jitter_ms))
    }
}

/// Owns the one persistent push connection.
///
/// `connect` is idempotent: while a connection attempt or live session
/// is in progress further calls are no-ops. Unexpected closes schedule
/// reconnects over an increasing delay schedule, re-reading the access
/// token each time; the attempt counter resets on success and the
/// manager parks in terminal `Unavailable` once the cap is reached.
/// `disconnect` tears the channel down deterministically and is safe to
/// call without a connection.
#[derive(Clone)]
pub struct PushConnectionManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    factory: Arc<dyn SocketFactory<Frame = WireFrame>>,
    credentials: CredentialStore,
    normalizer: Arc<EventNormalizer>,
    bus: EventBus,
    config: PushConfig,
    state_tx: watch::Sender<ConnectionState>,
    /// In-progress guard: no two connection loops run concurrently.
    running: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
}

#[derive(PartialEq, Eq)]
enum SessionEnd {
    Shutdown,
    Lost,
}

impl PushConnectionManager {
    pub fn new(
        factory: Arc<dyn SocketFactory<Frame = WireFrame>>,
        credentials: CredentialStore,
        normalizer: Arc<EventNormalizer>,
        bus: EventBus,
        config: PushConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(ManagerInner {
                factory,
                credentials,
                normalizer,
                bus,
                config,
                state_tx,
                running: AtomicBool::new(false),
                shutdown_tx,
            }),
        }
    }

    /// Establish the push connection. No-op while an attempt or a live
    /// session is already in progress.
    pub fn connect(&self) {
        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("connect ignored: connection already in progress");
            return;
        }
        self.inner.shutdown_tx.send_replace(false);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            ManagerInner::run(inner).await;
        });
    }

    /// Tear down the channel and reset counters. Safe without a
    /// connection; after this, `connect` starts fresh.
    pub fn disconnect(&self) {
        self.inner.shutdown_tx.send_replace(true);
        if !self.inner.running.load(Ordering::SeqCst) {
            self.inner.set_state(ConnectionState::Disconnected);
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    /// Typed view of the terminal state for callers that want an error
    /// value rather than a state enum (e.g. a degraded-mode banner).
    pub fn channel_error(&self) -> Option<crate::core::errors::ClientError> {
        match self.state() {
            ConnectionState::Unavailable => Some(crate::core::errors::ClientError::ChannelUnavailable(
                "reconnect attempts exhausted".to_string(),
            )),
            _ => None,
        }
    }

    /// State-change notifications; the current value is readable
    /// immediately.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Subscribe to canonical events of one kind. The listener is
    /// released when the returned handle drops.
    pub fn subscribe(
        &self,
        kind: EventKind,
        handler: impl Fn(&CanonicalEvent) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        self.inner.bus.subscribe(Topic::Kind(kind), move |event| {
            if let BusEvent::Event(canonical) = event {
                handler(canonical);
            }
        })
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }
}

impl ManagerInner {
    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(?previous, ?state, "push connection state changed");
        }
    }

    async fn run(inner: Arc<Self>) {
        let mut shutdown_rx = inner.shutdown_tx.subscribe();
        let mut attempts: u32 = 0;

        let final_state = loop {
            if *shutdown_rx.borrow() {
                break ConnectionState::Disconnected;
            }
            inner.set_state(if attempts == 0 {
                ConnectionState::Connecting
            } else {
                ConnectionState::Reconnecting { attempt: attempts }
            });

            // Re-read the token on every attempt so reconnects carry the
            // credentials current at that moment.
            let token = inner.credentials.access_token().unwrap_or_default();

            let attempt = tokio::select! {
                _ = shutdown_rx.changed() => break ConnectionState::Disconnected,
                result = inner.factory.connect(&token) => result,
            };

            match attempt {
                Ok(socket) => {
                    attempts = 0;
                    inner.set_state(ConnectionState::Connected);
                    info!("push channel connected");
                    if inner.serve(socket, &mut shutdown_rx).await == SessionEnd::Shutdown {
                        break ConnectionState::Disconnected;
                    }
                    warn!("push channel lost, scheduling reconnect");
                }
                Err(e) => warn!("push connect attempt failed: {}", e),
            }

            attempts += 1;
            if attempts >= inner.config.max_reconnect_attempts {
                error!(
                    "push channel unavailable after {} failed attempts",
                    attempts
                );
                break ConnectionState::Unavailable;
            }

            inner.set_state(ConnectionState::Reconnecting { attempt: attempts });
            let delay = inner.config.delay_for(attempts - 1);
            tokio::select! {
                _ = shutdown_rx.changed() => break ConnectionState::Disconnected,
                () = sleep(delay) => {}
            }
        };

        // Release the in-progress guard before publishing the final
        // state, so an observer of the terminal state can connect again
        // immediately.
        inner.running.store(false, Ordering::SeqCst);
        inner.set_state(final_state);
    }

    /// Pump frames from a live socket into the normalizer until the
    /// connection ends or a shutdown is requested.
    async fn serve(
        &self,
        mut socket: Box<dyn PushSocket<Frame = WireFrame>>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    socket.close().await;
                    return SessionEnd::Shutdown;
                }
                frame = socket.next_frame() => match frame {
                    Some(Ok(frame)) => self.normalizer.ingest(frame),
                    Some(Err(e)) => {
                        warn!("push channel error: {}", e);
                        return SessionEnd::Lost;
                    }
                    None => {
                        info!("push channel closed by server");
                        return SessionEnd::Lost;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ClientError;
    use crate::core::traits::SystemClock;
    use crate::push::protocol::TextMessageFrame;
    use crate::session::storage::MemoryTokenStorage;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    fn test_config(max_attempts: u32) -> PushConfig {
        PushConfig {
            max_reconnect_attempts: max_attempts,
            reconnect_schedule: vec![Duration::from_millis(10)],
            jitter_ms: 0,
        }
    }

    fn manager_with(
        factory: Arc<dyn SocketFactory<Frame = WireFrame>>,
        config: PushConfig,
    ) -> (PushConnectionManager, EventBus) {
        let bus = EventBus::new();
        let credentials = CredentialStore::new(Arc::new(MemoryTokenStorage::new()));
        let normalizer = Arc::new(EventNormalizer::new(
            bus.clone(),
            None,
            Arc::new(SystemClock),
        ));
        (
            PushConnectionManager::new(factory, credentials, normalizer, bus.clone(), config),
            bus,
        )
    }

    async fn wait_for_state(
        manager: &PushConnectionManager,
        predicate: impl Fn(ConnectionState) -> bool,
    ) {
        let mut rx = manager.watch_state();
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if predicate(*rx.borrow()) {
                    return;
                }
                rx.changed().await.expect("state channel closed");
            }
        })
        .await
        .expect("state not reached in time");
    }

    /// Factory whose connections always fail.
    struct FailingFactory {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SocketFactory for FailingFactory {
        type Frame = WireFrame;

        async fn connect(
            &self,
            _access_token: &str,
        ) -> Result<Box<dyn PushSocket<Frame = WireFrame>>, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ClientError::NetworkUnavailable("refused".to_string()))
        }
    }

    /// Factory whose connections never resolve.
    struct HangingFactory {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SocketFactory for HangingFactory {
        type Frame = WireFrame;

        async fn connect(
            &self,
            _access_token: &str,
        ) -> Result<Box<dyn PushSocket<Frame = WireFrame>>, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            futures_util::future::pending().await
        }
    }

    /// Yields a scripted set of frames, then reports the stream closed.
    struct ScriptedSocket {
        frames: Vec<WireFrame>,
    }

    #[async_trait]
    impl PushSocket for ScriptedSocket {
        type Frame = WireFrame;

        async fn next_frame(&mut self) -> Option<Result<WireFrame, ClientError>> {
            if self.frames.is_empty() {
                // Keep the connection open once the script is drained.
                futures_util::future::pending().await
            } else {
                Some(Ok(self.frames.remove(0)))
            }
        }

        async fn close(&mut self) {}
    }

    struct ScriptedFactory {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SocketFactory for ScriptedFactory {
        type Frame = WireFrame;

        async fn connect(
            &self,
            _access_token: &str,
        ) -> Result<Box<dyn PushSocket<Frame = WireFrame>>, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedSocket {
                frames: vec![WireFrame::TextMessage(TextMessageFrame {
                    id: Some("m-1".to_string()),
                    sender_id: Some("u-1".to_string()),
                    receiver_id: None,
                    content: "hello".to_string(),
                    sent_at: None,
                })],
            }))
        }
    }

    #[tokio::test]
    async fn exhausted_attempts_park_in_terminal_unavailable() {
        let factory = Arc::new(FailingFactory {
            calls: AtomicUsize::new(0),
        });
        let (manager, _bus) = manager_with(factory.clone(), test_config(3));

        manager.connect();
        wait_for_state(&manager, |s| s.is_terminal()).await;

        assert_eq!(factory.calls.load(Ordering::SeqCst), 3);
        // Terminal means terminal: nothing further is scheduled.
        sleep(Duration::from_millis(100)).await;
        assert_eq!(factory.calls.load(Ordering::SeqCst), 3);
        assert_eq!(manager.state(), ConnectionState::Unavailable);
        assert!(matches!(
            manager.channel_error(),
            Some(ClientError::ChannelUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn failed_attempts_below_the_cap_report_reconnecting() {
        let factory = Arc::new(FailingFactory {
            calls: AtomicUsize::new(0),
        });
        let config = PushConfig {
            max_reconnect_attempts: 5,
            reconnect_schedule: vec![Duration::from_millis(500)],
            jitter_ms: 0,
        };
        let (manager, _bus) = manager_with(factory, config);

        manager.connect();
        wait_for_state(&manager, |s| {
            matches!(s, ConnectionState::Reconnecting { .. })
        })
        .await;
        manager.disconnect();
        wait_for_state(&manager, |s| s == ConnectionState::Disconnected).await;
    }

    #[tokio::test]
    async fn connect_is_idempotent_while_in_progress() {
        let factory = Arc::new(HangingFactory {
            calls: AtomicUsize::new(0),
        });
        let (manager, _bus) = manager_with(factory.clone(), test_config(3));

        manager.connect();
        manager.connect();
        manager.connect();
        sleep(Duration::from_millis(50)).await;

        assert_eq!(factory.calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.state(), ConnectionState::Connecting);

        manager.disconnect();
        wait_for_state(&manager, |s| s == ConnectionState::Disconnected).await;
    }

    #[tokio::test]
    async fn disconnect_without_connection_is_safe() {
        let factory = Arc::new(FailingFactory {
            calls: AtomicUsize::new(0),
        });
        let (manager, _bus) = manager_with(factory, test_config(3));
        manager.disconnect();
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn delivered_frames_reach_subscribers() {
        let factory = Arc::new(ScriptedFactory {
            calls: AtomicUsize::new(0),
        });
        let (manager, _bus) = manager_with(factory, test_config(3));

        let received = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&received);
        let _sub = manager.subscribe(EventKind::Text, move |event| {
            assert_eq!(event.id.as_deref(), Some("m-1"));
            r.fetch_add(1, Ordering::SeqCst);
        });

        manager.connect();
        wait_for_state(&manager, |s| s == ConnectionState::Connected).await;
        tokio::time::timeout(Duration::from_secs(2), async {
            while received.load(Ordering::SeqCst) == 0 {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("frame never dispatched");

        manager.disconnect();
        wait_for_state(&manager, |s| s == ConnectionState::Disconnected).await;
    }

    #[tokio::test]
    async fn manual_reconnect_after_terminal_state_starts_fresh() {
        let factory = Arc::new(FailingFactory {
            calls: AtomicUsize::new(0),
        });
        let (manager, _bus) = manager_with(factory.clone(), test_config(2));

        manager.connect();
        wait_for_state(&manager, |s| s.is_terminal()).await;
        assert_eq!(factory.calls.load(Ordering::SeqCst), 2);

        // Explicit re-initialization is allowed to try again.
        manager.connect();
        tokio::time::timeout(Duration::from_secs(2), async {
            while factory.calls.load(Ordering::SeqCst) < 4 {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("second round never attempted");
        wait_for_state(&manager, |s| s.is_terminal()).await;
        assert_eq!(factory.calls.load(Ordering::SeqCst), 4);
    }
}
