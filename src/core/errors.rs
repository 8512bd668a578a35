use thiserror::Error;

/// Error taxonomy for the session and push layers.
///
/// Every variant carries owned strings so the enum stays `Clone`: the
/// single-flight refresh hands the same resolved outcome to every caller
/// that attached to the in-flight operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// No response received at all (DNS, connect, socket failures).
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    /// The request or connection attempt exceeded its deadline.
    #[error("connection timed out: {0}")]
    ConnectionTimeout(String),

    /// 401 from a protected endpoint. Enters the refresh path unless the
    /// failing call is itself an auth endpoint.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// 403. Surfaced directly, never retried.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// 404. Surfaced directly.
    #[error("not found: {0}")]
    NotFound(String),

    /// Structured server error with a machine-readable code.
    #[error("validation error {code}: {message}")]
    Validation { code: String, message: String },

    /// Non-success status that did not match a more specific class.
    #[error("api error {status}: {message}")]
    Api { status: u16, message: String },

    /// The refresh endpoint itself failed. The session is torn down and
    /// the caller must re-authenticate.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// The push connection exhausted its reconnect attempts.
    #[error("push channel unavailable: {0}")]
    ChannelUnavailable(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("configuration error: {0}")]
    Config(#[from] crate::core::config::ConfigError),

    #[error("token storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Other(String),
}

impl ClientError {
    /// Whether this failure should enter the single-flight refresh path.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}
