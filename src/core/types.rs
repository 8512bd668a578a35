use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of the locally signed-in user. Targeted push frames carry a role
/// and are dropped when it does not match this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserRole {
    Buyer,
    Seller,
    Admin,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buyer => write!(f, "Buyer"),
            Self::Seller => write!(f, "Seller"),
            Self::Admin => write!(f, "Admin"),
        }
    }
}

impl FromStr for UserRole {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buyer" => Ok(Self::Buyer),
            "seller" => Ok(Self::Seller),
            "admin" => Ok(Self::Admin),
            _ => Err(()),
        }
    }
}

/// The current access/refresh token pair.
///
/// Owned exclusively by the `CredentialStore`; either half may be absent
/// (e.g. a stale reload that only recovered the refresh token).
#[derive(Clone)]
pub struct CredentialPair {
    access_token: Option<Secret<String>>,
    refresh_token: Option<Secret<String>>,
}

impl CredentialPair {
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(Secret::new(access_token.into())),
            refresh_token: Some(Secret::new(refresh_token.into())),
        }
    }

    #[must_use]
    pub fn from_parts(access_token: Option<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.map(Secret::new),
            refresh_token: refresh_token.map(Secret::new),
        }
    }

    /// Clone out the access token (use carefully - exposes the secret).
    pub fn access_token(&self) -> Option<String> {
        self.access_token.as_ref().map(|t| t.expose_secret().clone())
    }

    /// Clone out the refresh token (use carefully - exposes the secret).
    pub fn refresh_token(&self) -> Option<String> {
        self.refresh_token.as_ref().map(|t| t.expose_secret().clone())
    }
}

// Never print token material.
impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Kind tag of a canonical event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Text,
    Media,
    InventoryItem,
    Unboxing,
    SystemNotification,
}

/// Kind-specific content of a canonical event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventPayload {
    Text {
        body: String,
    },
    Media {
        url: String,
        file_name: Option<String>,
        mime_type: Option<String>,
        /// Derived at normalization time from MIME type or filename
        /// extension; unrecognized media defaults to non-image (video).
        is_image: bool,
    },
    InventoryItem {
        item_id: String,
        name: String,
        image_url: Option<String>,
    },
    Unboxing {
        item_name: String,
        rarity: Option<String>,
    },
    Notification {
        title: String,
        body: Option<String>,
        target_role: Option<UserRole>,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Text { .. } => EventKind::Text,
            Self::Media { .. } => EventKind::Media,
            Self::InventoryItem { .. } => EventKind::InventoryItem,
            Self::Unboxing { .. } => EventKind::Unboxing,
            Self::Notification { .. } => EventKind::SystemNotification,
        }
    }

    /// Stable content key used in the fallback dedup identity.
    fn content_key(&self) -> String {
        match self {
            Self::Text { body } => body.clone(),
            Self::Media { url, file_name, .. } => {
                file_name.clone().unwrap_or_else(|| url.clone())
            }
            Self::InventoryItem { item_id, .. } => item_id.clone(),
            Self::Unboxing { item_name, .. } => item_name.clone(),
            Self::Notification { title, .. } => title.clone(),
        }
    }
}

/// The normalized shape every inbound real-time payload is converted to
/// before dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub id: Option<String>,
    pub sender_id: Option<String>,
    pub receiver_id: Option<String>,
    pub payload: EventPayload,
    pub occurred_at: DateTime<Utc>,
}

impl CanonicalEvent {
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Dedup identity: the server id when present, else the
    /// (sender, content, timestamp) tuple.
    pub fn identity(&self) -> EventIdentity {
        match &self.id {
            Some(id) => EventIdentity::Id(id.clone()),
            None => EventIdentity::Composite {
                sender_id: self.sender_id.clone().unwrap_or_default(),
                content: self.payload.content_key(),
                occurred_at: self.occurred_at,
            },
        }
    }
}

/// Identity under which duplicate deliveries collapse.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventIdentity {
    Id(String),
    Composite {
        sender_id: String,
        content: String,
        occurred_at: DateTime<Utc>,
    },
}

/// Lifecycle of the push connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    /// Terminal: reconnect attempts exhausted. Requires an explicit
    /// re-initialization to leave.
    Unavailable,
}

impl ConnectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Unavailable)
    }
}

/// A lock-progress update for a two-party trade, as observed on the
/// event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeLockEvent {
    pub trade_request_id: String,
    pub message: Option<String>,
    pub owner_locked: bool,
    pub requester_locked: bool,
}

/// Lock progress of a single two-party trade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TradeLockState {
    pub owner_locked: bool,
    pub requester_locked: bool,
    /// Sticky: set on the first transition to fully locked, never unset.
    pub completed: bool,
}

impl TradeLockState {
    /// 100 when both parties locked, 50 when exactly one, 0 otherwise.
    pub fn progress_percent(&self) -> u8 {
        match (self.owner_locked, self.requester_locked) {
            (true, true) => 100,
            (true, false) | (false, true) => 50,
            (false, false) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn progress_percent_levels() {
        let mut state = TradeLockState::default();
        assert_eq!(state.progress_percent(), 0);
        state.owner_locked = true;
        assert_eq!(state.progress_percent(), 50);
        state.requester_locked = true;
        assert_eq!(state.progress_percent(), 100);
    }

    #[test]
    fn identity_prefers_server_id() {
        let event = CanonicalEvent {
            id: Some("m-1".to_string()),
            sender_id: Some("u-1".to_string()),
            receiver_id: None,
            payload: EventPayload::Text { body: "hi".to_string() },
            occurred_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        };
        assert_eq!(event.identity(), EventIdentity::Id("m-1".to_string()));
    }

    #[test]
    fn identity_falls_back_to_tuple() {
        let occurred_at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let event = CanonicalEvent {
            id: None,
            sender_id: Some("u-1".to_string()),
            receiver_id: None,
            payload: EventPayload::Text { body: "hi".to_string() },
            occurred_at,
        };
        assert_eq!(
            event.identity(),
            EventIdentity::Composite {
                sender_id: "u-1".to_string(),
                content: "hi".to_string(),
                occurred_at,
            }
        );
    }

    #[test]
    fn role_parsing_is_case_insensitive() {
        assert_eq!("SELLER".parse::<UserRole>(), Ok(UserRole::Seller));
        assert!("vendor".parse::<UserRole>().is_err());
    }

    #[test]
    fn credential_pair_debug_redacts() {
        let pair = CredentialPair::new("top-secret-access", "top-secret-refresh");
        let printed = format!("{:?}", pair);
        assert!(printed.contains("REDACTED"));
        assert!(!printed.contains("top-secret"));
    }
}
