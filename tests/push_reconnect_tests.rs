//! Offline tests of the push connection lifecycle: bounded reconnects,
//! counter reset on success, and at-least-once redelivery collapsing in
//! the normalizer.

use async_trait::async_trait;
use bazaarx::core::errors::ClientError;
use bazaarx::core::kernel::{PushSocket, SocketFactory};
use bazaarx::core::traits::SystemClock;
use bazaarx::core::types::{ConnectionState, EventKind};
use bazaarx::events::dispatcher::EventBus;
use bazaarx::events::normalizer::EventNormalizer;
use bazaarx::push::manager::{PushConfig, PushConnectionManager};
use bazaarx::push::protocol::{TextMessageFrame, WireFrame};
use bazaarx::session::credentials::CredentialStore;
use bazaarx::session::storage::MemoryTokenStorage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

fn text_frame(id: &str) -> WireFrame {
    WireFrame::TextMessage(TextMessageFrame {
        id: Some(id.to_string()),
        sender_id: Some("u-1".to_string()),
        receiver_id: None,
        content: "hello".to_string(),
        sent_at: None,
    })
}

/// One connection's script: frames to deliver, then close.
struct ScriptedSocket {
    frames: Vec<WireFrame>,
    hold_open: bool,
}

#[async_trait]
impl PushSocket for ScriptedSocket {
    type Frame = WireFrame;

    async fn next_frame(&mut self) -> Option<Result<WireFrame, ClientError>> {
        if self.frames.is_empty() {
            if self.hold_open {
                futures_util::future::pending().await
            } else {
                None
            }
        } else {
            Some(Ok(self.frames.remove(0)))
        }
    }

    async fn close(&mut self) {}
}

/// Fails the first `fail_first` attempts, then hands out scripted
/// connections that redeliver the same frame and close.
struct FlakyFactory {
    calls: AtomicUsize,
    fail_first: usize,
    hold_open: bool,
}

#[async_trait]
impl SocketFactory for FlakyFactory {
    type Frame = WireFrame;

    async fn connect(
        &self,
        _access_token: &str,
    ) -> Result<Box<dyn PushSocket<Frame = WireFrame>>, ClientError> {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_first {
            return Err(ClientError::NetworkUnavailable("refused".to_string()));
        }
        Ok(Box::new(ScriptedSocket {
            frames: vec![text_frame("m-1")],
            hold_open: self.hold_open,
        }))
    }
}

fn manager_with(
    factory: Arc<FlakyFactory>,
    max_attempts: u32,
) -> (PushConnectionManager, EventBus) {
    let bus = EventBus::new();
    let credentials = CredentialStore::new(Arc::new(MemoryTokenStorage::new()));
    let normalizer = Arc::new(EventNormalizer::new(
        bus.clone(),
        None,
        Arc::new(SystemClock),
    ));
    let config = PushConfig {
        max_reconnect_attempts: max_attempts,
        reconnect_schedule: vec![Duration::from_millis(10)],
        jitter_ms: 0,
    };
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
    timeout(Duration::from_secs(2), async {
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

#[tokio::test]
async fn failures_below_the_cap_recover_and_reset_the_counter() {
    let factory = Arc::new(FlakyFactory {
        calls: AtomicUsize::new(0),
        fail_first: 2,
        hold_open: true,
    });
    let (manager, _bus) = manager_with(factory.clone(), 4);

    manager.connect();
    wait_for_state(&manager, |s| s == ConnectionState::Connected).await;

    // Two failures were tolerated on the way to the live connection.
    assert_eq!(factory.calls.load(Ordering::SeqCst), 3);
    manager.disconnect();
    wait_for_state(&manager, |s| s == ConnectionState::Disconnected).await;
}

#[tokio::test]
async fn exhausting_the_cap_is_terminal() {
    let factory = Arc::new(FlakyFactory {
        calls: AtomicUsize::new(0),
        fail_first: usize::MAX,
        hold_open: false,
    });
    let (manager, _bus) = manager_with(factory.clone(), 3);

    manager.connect();
    wait_for_state(&manager, |s| s == ConnectionState::Unavailable).await;
    assert_eq!(factory.calls.load(Ordering::SeqCst), 3);

    sleep(Duration::from_millis(100)).await;
    assert_eq!(
        factory.calls.load(Ordering::SeqCst),
        3,
        "terminal state must not schedule further attempts"
    );
}

#[tokio::test]
async fn redelivered_frames_after_reconnect_are_deduplicated() {
    // Every connection replays the same message and drops, so the
    // manager reconnects in a loop - at-least-once delivery in miniature.
    let factory = Arc::new(FlakyFactory {
        calls: AtomicUsize::new(0),
        fail_first: 0,
        hold_open: false,
    });
    let (manager, _bus) = manager_with(factory.clone(), 100);

    let received = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&received);
    let _sub = manager.subscribe(EventKind::Text, move |_| {
        r.fetch_add(1, Ordering::SeqCst);
    });

    manager.connect();
    timeout(Duration::from_secs(2), async {
        while factory.calls.load(Ordering::SeqCst) < 3 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("manager never cycled through reconnects");
    manager.disconnect();

    assert_eq!(
        received.load(Ordering::SeqCst),
        1,
        "the same event delivered on every reconnect must dispatch once"
    );
}
