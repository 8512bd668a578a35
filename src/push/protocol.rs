use crate::core::types::{TradeLockEvent, UserRole};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Server frames on the push channel.
///
/// The wire encoding is JSON with a `Type` discriminator and PascalCase
/// field names; unknown discriminators are ignored by the codec.
#[derive(Debug, Clone)]
pub enum WireFrame {
    Notification(NotificationFrame),
    TextMessage(TextMessageFrame),
    MediaMessage(MediaMessageFrame),
    ItemMessage(ItemMessageFrame),
    UnboxResult(UnboxResultFrame),
    TradeLockUpdated(TradeLockFrame),
}

/// Generic notification, optionally targeted at one recipient role.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NotificationFrame {
    pub id: Option<String>,
    pub title: String,
    pub body: Option<String>,
    pub target_role: Option<UserRole>,
    pub sender_id: Option<String>,
    pub receiver_id: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TextMessageFrame {
    pub id: Option<String>,
    pub sender_id: Option<String>,
    pub receiver_id: Option<String>,
    pub content: String,
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaMessageFrame {
    pub id: Option<String>,
    pub sender_id: Option<String>,
    pub receiver_id: Option<String>,
    pub url: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// A message carrying an inventory item (e.g. an item offered in chat).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemMessageFrame {
    pub id: Option<String>,
    pub sender_id: Option<String>,
    pub receiver_id: Option<String>,
    pub item_id: String,
    pub item_name: String,
    pub image_url: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UnboxResultFrame {
    pub id: Option<String>,
    pub user_id: Option<String>,
    pub item_name: String,
    pub rarity: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
}

/// Lock progress of a two-party trade finalization.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TradeLockFrame {
    pub trade_request_id: String,
    pub message: Option<String>,
    pub owner_locked: bool,
    pub requester_locked: bool,
}

impl From<TradeLockFrame> for TradeLockEvent {
    fn from(frame: TradeLockFrame) -> Self {
        Self {
            trade_request_id: frame.trade_request_id,
            message: frame.message,
            owner_locked: frame.owner_locked,
            requester_locked: frame.requester_locked,
        }
    }
}
