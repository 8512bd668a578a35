use crate::core::errors::ClientError;
use crate::core::kernel::HttpClient;
use crate::core::types::CredentialPair;
use crate::session::credentials::CredentialStore;
use crate::session::refresh::RefreshCoordinator;
use crate::session::{is_auth_endpoint, LOGIN_ENDPOINT, LOGOUT_ENDPOINT};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

/// HTTP client with session semantics.
///
/// Every protected call goes out with the current access token; a
/// missing token or a 401 routes through the single-flight refresh and
/// the original request is replayed once with the fresh token. Auth
/// endpoints are excluded from that path so a failing refresh or logout
/// can never recurse into itself.
#[derive(Clone)]
pub struct SessionClient {
    http: Arc<dyn HttpClient>,
    credentials: CredentialStore,
    refresh: RefreshCoordinator,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: String,
    refresh_token: String,
}

impl SessionClient {
    pub fn new(
        http: Arc<dyn HttpClient>,
        credentials: CredentialStore,
        refresh: RefreshCoordinator,
    ) -> Self {
        Self {
            http,
            credentials,
            refresh,
        }
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Authenticate and store the returned token pair.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<(), ClientError> {
        let body = json!({ "email": email, "password": password });
        let value = self
            .http
            .request(Method::POST, LOGIN_ENDPOINT, &[], Some(&body), None)
            .await?;
        let parsed: LoginResponse = serde_json::from_value(value).map_err(|e| {
            ClientError::Deserialization(format!("malformed login response: {}", e))
        })?;
        self.credentials
            .set(CredentialPair::new(parsed.access_token, parsed.refresh_token))
    }

    /// End the session. The local pair is cleared even when the server
    /// call fails; the server error is still surfaced.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), ClientError> {
        let token = self.credentials.access_token();
        let result = self
            .http
            .request(Method::POST, LOGOUT_ENDPOINT, &[], None, token.as_deref())
            .await;
        self.credentials.clear()?;
        result.map(|_| ())
    }

    pub async fn get(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
        authenticated: bool,
    ) -> Result<Value, ClientError> {
        self.send(Method::GET, endpoint, query, None, authenticated)
            .await
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
        authenticated: bool,
    ) -> Result<T, ClientError> {
        from_value(self.get(endpoint, query, authenticated).await?)
    }

    pub async fn post(
        &self,
        endpoint: &str,
        body: &Value,
        authenticated: bool,
    ) -> Result<Value, ClientError> {
        self.send(Method::POST, endpoint, &[], Some(body), authenticated)
            .await
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &Value,
        authenticated: bool,
    ) -> Result<T, ClientError> {
        from_value(self.post(endpoint, body, authenticated).await?)
    }

    pub async fn put(
        &self,
        endpoint: &str,
        body: &Value,
        authenticated: bool,
    ) -> Result<Value, ClientError> {
        self.send(Method::PUT, endpoint, &[], Some(body), authenticated)
            .await
    }

    pub async fn delete(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
        authenticated: bool,
    ) -> Result<Value, ClientError> {
        self.send(Method::DELETE, endpoint, query, None, authenticated)
            .await
    }

    /// Attach, send, and - for protected endpoints - refresh and replay
    /// once on an authorization failure.
    #[instrument(skip(self, body), fields(method = %method, endpoint = %endpoint))]
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
        authenticated: bool,
    ) -> Result<Value, ClientError> {
        let token = if authenticated {
            match self.credentials.access_token() {
                Some(token) => Some(token),
                // No cached access token: refresh before the first try.
                None => Some(access_token_of(self.refresh.refresh().await?)?),
            }
        } else {
            None
        };

        let first = self
            .http
            .request(method.clone(), endpoint, query, body, token.as_deref())
            .await;

        match first {
            Err(e) if e.is_unauthorized() && authenticated && !is_auth_endpoint(endpoint) => {
                debug!("authorization failed, refreshing and replaying");
                let pair = self.refresh.refresh().await?;
                let fresh = access_token_of(pair)?;
                self.http
                    .request(method, endpoint, query, body, Some(&fresh))
                    .await
            }
            other => other,
        }
    }
}

fn access_token_of(pair: CredentialPair) -> Result<String, ClientError> {
    pair.access_token().ok_or_else(|| {
        ClientError::RefreshFailed("refresh produced no access token".to_string())
    })
}

fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, ClientError> {
    serde_json::from_value(value)
        .map_err(|e| ClientError::Deserialization(format!("Failed to deserialize JSON: {}", e)))
}
