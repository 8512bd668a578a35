use crate::core::types::UserRole;
use std::env;
use std::path::PathBuf;

/// Configuration for the session layer and the push connection.
///
/// All knobs the composition root needs to wire the services together:
/// where the REST API and the push endpoint live, how long requests may
/// take, how aggressively the push connection reconnects, and where the
/// token pair is persisted between runs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL for the storefront REST API.
    pub api_base_url: String,
    /// WebSocket URL of the push notification endpoint.
    pub push_url: String,
    /// Role of the locally signed-in user, used to filter targeted
    /// notifications. `None` drops every role-targeted frame.
    pub role: Option<UserRole>,
    /// Request timeout in seconds for HTTP calls.
    pub timeout_seconds: u64,
    /// User agent string to include in requests.
    pub user_agent: String,
    /// Maximum reconnect attempts before the push channel goes terminal.
    pub max_reconnect_attempts: u32,
    /// Delay before the one-time trade-completed signal fires, in
    /// milliseconds. User-visible, so short but non-zero.
    pub completed_signal_delay_ms: u64,
    /// Path of the durable token file.
    pub token_store_path: PathBuf,
}

impl SessionConfig {
    /// Create a configuration with defaults for everything but the URLs.
    #[must_use]
    pub fn new(api_base_url: impl Into<String>, push_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            push_url: push_url.into(),
            role: None,
            timeout_seconds: 30,
            user_agent: format!("bazaarx/{}", env!("CARGO_PKG_VERSION")),
            max_reconnect_attempts: 6,
            completed_signal_delay_ms: 1_500,
            token_store_path: PathBuf::from(".bazaar-session.json"),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Expected environment variables:
    /// - `{PREFIX}_API_BASE_URL` (required)
    /// - `{PREFIX}_PUSH_URL` (required)
    /// - `{PREFIX}_ROLE` (optional: `buyer`, `seller`, `admin`)
    /// - `{PREFIX}_TIMEOUT_SECONDS` (optional)
    /// - `{PREFIX}_MAX_RECONNECT_ATTEMPTS` (optional)
    /// - `{PREFIX}_TOKEN_STORE_PATH` (optional)
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let prefix = prefix.to_uppercase();
        let api_var = format!("{}_API_BASE_URL", prefix);
        let push_var = format!("{}_PUSH_URL", prefix);

        let api_base_url =
            env::var(&api_var).map_err(|_| ConfigError::MissingEnvironmentVariable(api_var))?;
        let push_url =
            env::var(&push_var).map_err(|_| ConfigError::MissingEnvironmentVariable(push_var))?;

        let mut config = Self::new(api_base_url, push_url);

        if let Ok(role) = env::var(format!("{}_ROLE", prefix)) {
            config.role = Some(role.parse().map_err(|_| {
                ConfigError::InvalidConfiguration(format!("unrecognized role '{}'", role))
            })?);
        }
        if let Ok(timeout) = env::var(format!("{}_TIMEOUT_SECONDS", prefix)) {
            config.timeout_seconds = timeout.parse().map_err(|_| {
                ConfigError::InvalidConfiguration(format!("invalid timeout '{}'", timeout))
            })?;
        }
        if let Ok(max) = env::var(format!("{}_MAX_RECONNECT_ATTEMPTS", prefix)) {
            config.max_reconnect_attempts = max.parse().map_err(|_| {
                ConfigError::InvalidConfiguration(format!("invalid attempt count '{}'", max))
            })?;
        }
        if let Ok(path) = env::var(format!("{}_TOKEN_STORE_PATH", prefix)) {
            config.token_store_path = PathBuf::from(path);
        }

        Ok(config)
    }

    /// Create configuration from a .env file and environment variables.
    ///
    /// Loads the .env file first (if it exists), then reads the standard
    /// environment variable names.
    #[cfg(feature = "env-file")]
    pub fn from_env_file(prefix: &str) -> Result<Self, ConfigError> {
        Self::from_env_file_with_path(prefix, ".env")
    }

    /// Create configuration from a specific .env file path.
    #[cfg(feature = "env-file")]
    pub fn from_env_file_with_path(prefix: &str, env_file_path: &str) -> Result<Self, ConfigError> {
        match dotenv::from_path(env_file_path) {
            Ok(()) => {}
            Err(dotenv::Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {
                // No .env file; system environment variables still apply.
            }
            Err(e) => {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "Failed to load .env file '{}': {}",
                    env_file_path, e
                )));
            }
        }

        Self::from_env(prefix)
    }

    /// Set the signed-in role used for notification filtering.
    #[must_use]
    pub fn with_role(mut self, role: UserRole) -> Self {
        self.role = Some(role);
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Set the reconnect attempt cap.
    #[must_use]
    pub const fn with_max_reconnect_attempts(mut self, max_attempts: u32) -> Self {
        self.max_reconnect_attempts = max_attempts;
        self
    }

    /// Set the durable token file path.
    #[must_use]
    pub fn with_token_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_store_path = path.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvironmentVariable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}
