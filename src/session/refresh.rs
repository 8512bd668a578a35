use crate::core::errors::ClientError;
use crate::core::kernel::HttpClient;
use crate::core::types::CredentialPair;
use crate::events::dispatcher::{BusEvent, EventBus};
use crate::session::credentials::CredentialStore;
use crate::session::REFRESH_ENDPOINT;
use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

type RefreshFuture = Shared<BoxFuture<'static, Result<CredentialPair, ClientError>>>;

/// Single-flight token refresh.
///
/// The in-flight operation is a memoized shared future: the first caller
/// that observes a missing token or a 401 installs it, every concurrent
/// caller awaits the same future, and the slot is cleared once the
/// outcome is known - success or failure - so the next authorization
/// failure starts a fresh operation.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<RefreshInner>,
}

struct RefreshInner {
    http: Arc<dyn HttpClient>,
    credentials: CredentialStore,
    bus: EventBus,
    in_flight: Mutex<Option<RefreshFuture>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    refresh_token: String,
}

impl RefreshCoordinator {
    pub fn new(http: Arc<dyn HttpClient>, credentials: CredentialStore, bus: EventBus) -> Self {
        Self {
            inner: Arc::new(RefreshInner {
                http,
                credentials,
                bus,
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Run (or attach to) the refresh operation and return the resulting
    /// pair. Failure means the session was torn down and the caller must
    /// re-authenticate.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<CredentialPair, ClientError> {
        let operation = {
            let mut slot = self.inner.in_flight.lock().await;
            match slot.as_ref() {
                Some(pending) => pending.clone(),
                None => {
                    let inner = Arc::clone(&self.inner);
                    let fresh: RefreshFuture =
                        async move { inner.execute().await }.boxed().shared();
                    *slot = Some(fresh.clone());
                    fresh
                }
            }
        };

        let outcome = operation.await;

        // Clear the memoized operation once it has resolved. Every
        // waiter runs this; only the first one finds anything to clear,
        // and a newer, still-pending operation is left alone.
        {
            let mut slot = self.inner.in_flight.lock().await;
            if slot.as_ref().is_some_and(|op| op.peek().is_some()) {
                *slot = None;
            }
        }

        outcome
    }

    /// Whether a refresh operation is currently in flight.
    pub async fn is_refreshing(&self) -> bool {
        self.inner.in_flight.lock().await.is_some()
    }
}

impl RefreshInner {
    /// The single execution behind the shared future. Runs at most once
    /// per installed operation, so the teardown side effects (clear +
    /// session-cleared signal) fire at most once per failed refresh.
    async fn execute(self: Arc<Self>) -> Result<CredentialPair, ClientError> {
        let Some(refresh_token) = self.credentials.refresh_token() else {
            self.teardown("no refresh token cached");
            return Err(ClientError::RefreshFailed(
                "no refresh token cached".to_string(),
            ));
        };

        let body = json!({ "refreshToken": refresh_token });
        let response = self
            .http
            .request(Method::POST, REFRESH_ENDPOINT, &[], Some(&body), None)
            .await;

        match response {
            Ok(value) => {
                let parsed: RefreshResponse = serde_json::from_value(value).map_err(|e| {
                    let reason = format!("malformed refresh response: {}", e);
                    self.teardown(&reason);
                    ClientError::RefreshFailed(reason)
                })?;
                let pair = CredentialPair::new(parsed.access_token, parsed.refresh_token);
                self.credentials.set(pair.clone())?;
                info!("session tokens refreshed");
                Ok(pair)
            }
            Err(e) => {
                let reason = e.to_string();
                self.teardown(&reason);
                Err(ClientError::RefreshFailed(reason))
            }
        }
    }

    /// Irrecoverable refresh failure: drop the whole session and tell
    /// everyone interested, exactly once per failed operation.
    fn teardown(&self, reason: &str) {
        warn!("tearing down session: {}", reason);
        if let Err(e) = self.credentials.clear() {
            warn!("failed to clear persisted tokens: {}", e);
        }
        self.bus.publish(&BusEvent::SessionCleared);
    }
}
