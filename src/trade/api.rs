use crate::core::errors::ClientError;
use crate::session::client::SessionClient;
use serde_json::json;
use tracing::instrument;

/// Trade operations issued through the session client.
#[derive(Clone)]
pub struct TradeApi {
    client: SessionClient,
}

impl TradeApi {
    pub fn new(client: SessionClient) -> Self {
        Self { client }
    }

    /// Send a lock intent for a trade.
    ///
    /// Resolves once the server accepts or rejects the request. Does not
    /// touch tracker state: lock progress only ever changes through the
    /// event stream, so there is a single source of truth.
    #[instrument(skip(self))]
    pub async fn initiate_lock(&self, trade_request_id: &str) -> Result<(), ClientError> {
        let endpoint = format!("/trades/{}/lock", trade_request_id);
        let body = json!({ "tradeRequestId": trade_request_id });
        self.client.post(&endpoint, &body, true).await.map(|_| ())
    }
}
