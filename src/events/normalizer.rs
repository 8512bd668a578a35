use crate::core::traits::Clock;
use crate::core::types::{CanonicalEvent, EventPayload, UserRole};
use crate::events::dispatcher::{BusEvent, EventBus};
use crate::events::journal::EventJournal;
use crate::push::protocol::WireFrame;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

/// Extensions treated as images when the MIME type is absent or
/// inconclusive. Anything else is classified as video.
const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "webp", "bmp", "avif"];

/// Converts heterogeneous wire frames into canonical events, drops
/// duplicates and cross-role leakage, and publishes the rest.
///
/// Trade-lock frames are not canonicalized: they bypass the journal and
/// go straight to the `TradeLock` topic, where trackers consume them.
pub struct EventNormalizer {
    journal: Mutex<EventJournal>,
    bus: EventBus,
    local_role: Option<UserRole>,
    clock: Arc<dyn Clock>,
}

impl EventNormalizer {
    pub fn new(bus: EventBus, local_role: Option<UserRole>, clock: Arc<dyn Clock>) -> Self {
        Self {
            journal: Mutex::new(EventJournal::new()),
            bus,
            local_role,
            clock,
        }
    }

    /// Feed one decoded frame through normalize -> dedup -> dispatch.
    ///
    /// Idempotent under redelivery: a frame already present in the
    /// journal is dropped without dispatch.
    pub fn ingest(&self, frame: WireFrame) {
        if let WireFrame::TradeLockUpdated(update) = frame {
            self.bus.publish(&BusEvent::TradeLock(update.into()));
            return;
        }

        let Some(event) = self.normalize(frame) else {
            return;
        };

        let fresh = {
            let mut journal = match self.journal.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            journal.insert(event.clone())
        };

        if fresh {
            self.bus.publish(&BusEvent::Event(event));
        } else {
            trace!(id = ?event.id, "dropped duplicate event");
        }
    }

    /// Number of distinct events accepted so far.
    pub fn journal_len(&self) -> usize {
        match self.journal.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    fn normalize(&self, frame: WireFrame) -> Option<CanonicalEvent> {
        let now = || self.clock.now();
        match frame {
            WireFrame::Notification(n) => {
                if !role_matches(n.target_role, self.local_role) {
                    debug!(target = ?n.target_role, "dropped notification targeted at another role");
                    return None;
                }
                Some(CanonicalEvent {
                    id: n.id,
                    sender_id: n.sender_id,
                    receiver_id: n.receiver_id,
                    payload: EventPayload::Notification {
                        title: n.title,
                        body: n.body,
                        target_role: n.target_role,
                    },
                    occurred_at: n.occurred_at.unwrap_or_else(now),
                })
            }
            WireFrame::TextMessage(m) => Some(CanonicalEvent {
                id: m.id,
                sender_id: m.sender_id,
                receiver_id: m.receiver_id,
                payload: EventPayload::Text { body: m.content },
                occurred_at: m.sent_at.unwrap_or_else(now),
            }),
            WireFrame::MediaMessage(m) => {
                let is_image = classify_media(m.mime_type.as_deref(), m.file_name.as_deref());
                Some(CanonicalEvent {
                    id: m.id,
                    sender_id: m.sender_id,
                    receiver_id: m.receiver_id,
                    payload: EventPayload::Media {
                        url: m.url,
                        file_name: m.file_name,
                        mime_type: m.mime_type,
                        is_image,
                    },
                    occurred_at: m.sent_at.unwrap_or_else(now),
                })
            }
            WireFrame::ItemMessage(m) => Some(CanonicalEvent {
                id: m.id,
                sender_id: m.sender_id,
                receiver_id: m.receiver_id,
                payload: EventPayload::InventoryItem {
                    item_id: m.item_id,
                    name: m.item_name,
                    image_url: m.image_url,
                },
                occurred_at: m.sent_at.unwrap_or_else(now),
            }),
            WireFrame::UnboxResult(u) => Some(CanonicalEvent {
                id: u.id,
                sender_id: u.user_id,
                receiver_id: None,
                payload: EventPayload::Unboxing {
                    item_name: u.item_name,
                    rarity: u.rarity,
                },
                occurred_at: u.occurred_at.unwrap_or_else(now),
            }),
            WireFrame::TradeLockUpdated(_) => None, // routed in ingest
        }
    }
}

/// Untargeted frames pass; targeted frames require a matching local role.
fn role_matches(target: Option<UserRole>, local: Option<UserRole>) -> bool {
    match target {
        None => true,
        Some(target) => local == Some(target),
    }
}

/// Image when the MIME type says so or the filename carries a known
/// image extension (case-insensitive); everything else is video.
pub fn classify_media(mime_type: Option<&str>, file_name: Option<&str>) -> bool {
    if let Some(mime) = mime_type {
        if mime.to_ascii_lowercase().starts_with("image/") {
            return true;
        }
    }
    if let Some(name) = file_name {
        if let Some(ext) = std::path::Path::new(name)
            .extension()
            .and_then(std::ffi::OsStr::to_str)
        {
            return IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str());
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::dispatcher::Topic;
    use crate::push::protocol::{MediaMessageFrame, NotificationFrame, TextMessageFrame};
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn normalizer(role: Option<UserRole>) -> (EventNormalizer, EventBus) {
        let bus = EventBus::new();
        let clock = Arc::new(FixedClock(Utc.timestamp_opt(1_700_000_000, 0).unwrap()));
        (EventNormalizer::new(bus.clone(), role, clock), bus)
    }

    fn text_frame(id: &str) -> WireFrame {
        WireFrame::TextMessage(TextMessageFrame {
            id: Some(id.to_string()),
            sender_id: Some("u-1".to_string()),
            receiver_id: Some("u-2".to_string()),
            content: "hello".to_string(),
            sent_at: None,
        })
    }

    #[test]
    fn uppercase_jpg_without_mime_is_image() {
        assert!(classify_media(None, Some("photo.JPG")));
    }

    #[test]
    fn mov_file_is_not_image() {
        assert!(!classify_media(None, Some("clip.mov")));
    }

    #[test]
    fn mime_type_wins_over_missing_extension() {
        assert!(classify_media(Some("image/png"), Some("blob")));
        assert!(!classify_media(Some("video/mp4"), None));
    }

    #[test]
    fn media_frame_classification_lands_in_payload() {
        let (normalizer, bus) = normalizer(None);
        let seen = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&seen);
        let _sub = bus.subscribe(Topic::Kind(crate::core::types::EventKind::Media), move |event| {
            if let BusEvent::Event(e) = event {
                if let EventPayload::Media { is_image, .. } = &e.payload {
                    assert!(*is_image);
                    s.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        normalizer.ingest(WireFrame::MediaMessage(MediaMessageFrame {
            id: Some("m-1".to_string()),
            sender_id: None,
            receiver_id: None,
            url: "https://cdn.example/photo.JPG".to_string(),
            file_name: Some("photo.JPG".to_string()),
            mime_type: None,
            sent_at: None,
        }));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn duplicate_frame_dispatches_once() {
        let (normalizer, bus) = normalizer(None);
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let _sub = bus.subscribe(Topic::Kind(crate::core::types::EventKind::Text), move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        normalizer.ingest(text_frame("m-1"));
        normalizer.ingest(text_frame("m-1"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(normalizer.journal_len(), 1);
    }

    #[test]
    fn targeted_notification_for_other_role_is_dropped() {
        let (normalizer, bus) = normalizer(Some(UserRole::Buyer));
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let _sub = bus.subscribe(
            Topic::Kind(crate::core::types::EventKind::SystemNotification),
            move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            },
        );

        let frame = |role: Option<UserRole>, id: &str| {
            WireFrame::Notification(NotificationFrame {
                id: Some(id.to_string()),
                title: "payout".to_string(),
                body: None,
                target_role: role,
                sender_id: None,
                receiver_id: None,
                occurred_at: None,
            })
        };

        normalizer.ingest(frame(Some(UserRole::Seller), "n-1"));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        normalizer.ingest(frame(Some(UserRole::Buyer), "n-2"));
        normalizer.ingest(frame(None, "n-3"));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn trade_lock_frames_bypass_the_journal() {
        let (normalizer, bus) = normalizer(None);
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let _sub = bus.subscribe(Topic::TradeLock, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let frame = || {
            WireFrame::TradeLockUpdated(crate::push::protocol::TradeLockFrame {
                trade_request_id: "t-1".to_string(),
                message: None,
                owner_locked: true,
                requester_locked: false,
            })
        };
        normalizer.ingest(frame());
        normalizer.ingest(frame());
        // Lock updates are state, not chat history: redelivery reaches
        // the tracker, which is idempotent on its own.
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(normalizer.journal_len(), 0);
    }
}
