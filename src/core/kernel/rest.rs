use crate::core::errors::ClientError;
use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use tracing::{instrument, trace};

/// Transport-level HTTP client seam.
///
/// Implementations know how to reach the API and how to map responses to
/// the error taxonomy, nothing else. Session semantics (token attachment
/// on behalf of a caller, refresh, replay) live in the session layer so
/// tests can swap the transport for a scripted one.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Issue a request and return the parsed JSON body.
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `endpoint` - API endpoint path, appended to the base URL
    /// * `query` - Query parameters as key-value pairs
    /// * `body` - Optional JSON request body
    /// * `bearer` - Optional access token for the `Authorization` header
    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
        bearer: Option<&str>,
    ) -> Result<Value, ClientError>;
}

/// Configuration for the reqwest-backed transport.
#[derive(Clone, Debug)]
pub struct HttpConfig {
    /// Base URL for the API.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
    /// User agent string to include in requests.
    pub user_agent: String,
}

impl HttpConfig {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            timeout_seconds: 30,
            user_agent: format!("bazaarx/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Implementation of `HttpClient` using reqwest.
#[derive(Clone, Debug)]
pub struct ReqwestHttp {
    client: Client,
    config: HttpConfig,
}

impl ReqwestHttp {
    pub fn new(config: HttpConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ClientError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn build_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.config.base_url, endpoint)
    }

    /// Map the response onto the error taxonomy and extract JSON.
    #[instrument(skip(self, response), fields(status = %response.status()))]
    async fn handle_response(&self, response: Response) -> Result<Value, ClientError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::NetworkUnavailable(format!("Failed to read body: {}", e)))?;

        trace!("Response body: {}", text);

        if status.is_success() {
            if text.is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&text).map_err(|e| {
                ClientError::Deserialization(format!("Failed to parse JSON response: {}", e))
            });
        }

        Err(classify_status(status, &text))
    }
}

/// Map a non-success status onto the error taxonomy. Structured bodies
/// with a machine-readable code become `Validation` errors.
fn classify_status(status: StatusCode, body: &str) -> ClientError {
    match status {
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized(body.to_string()),
        StatusCode::FORBIDDEN => ClientError::Forbidden(body.to_string()),
        StatusCode::NOT_FOUND => ClientError::NotFound(body.to_string()),
        _ => {
            #[derive(serde::Deserialize)]
            struct ServerError {
                code: String,
                message: String,
            }
            if let Ok(err) = serde_json::from_str::<ServerError>(body) {
                ClientError::Validation {
                    code: err.code,
                    message: err.message,
                }
            } else {
                ClientError::Api {
                    status: status.as_u16(),
                    message: body.to_string(),
                }
            }
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttp {
    #[instrument(skip(self, body, bearer), fields(method = %method, endpoint = %endpoint))]
    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
        bearer: Option<&str>,
    ) -> Result<Value, ClientError> {
        let url = self.build_url(endpoint);
        let mut request = self.client.request(method, &url);

        for (key, value) in query {
            request = request.query(&[(key, value)]);
        }
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::ConnectionTimeout(format!("Request timed out: {}", e))
            } else {
                ClientError::NetworkUnavailable(format!("Request failed: {}", e))
            }
        })?;

        self.handle_response(response).await
    }
}
