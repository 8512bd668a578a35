pub mod client;
pub mod credentials;
pub mod refresh;
pub mod storage;

pub use client::SessionClient;
pub use credentials::CredentialStore;
pub use refresh::RefreshCoordinator;
pub use storage::{FileTokenStorage, MemoryTokenStorage};

/// Auth endpoints. Excluded from the refresh-and-replay path: a 401
/// from any of these must never trigger another refresh.
pub const LOGIN_ENDPOINT: &str = "/auth/login";
pub const LOGOUT_ENDPOINT: &str = "/auth/logout";
pub const REFRESH_ENDPOINT: &str = "/auth/refresh-token";

pub(crate) fn is_auth_endpoint(endpoint: &str) -> bool {
    matches!(endpoint, LOGIN_ENDPOINT | LOGOUT_ENDPOINT | REFRESH_ENDPOINT)
}
