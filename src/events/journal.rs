use crate::core::types::{CanonicalEvent, EventIdentity};
use std::collections::HashSet;

/// The target collection duplicate deliveries are checked against.
///
/// The push channel is at-least-once: a reconnect can redeliver frames
/// the client already processed. `insert` is idempotent on the event's
/// identity, so feeding the same event twice leaves exactly one entry.
#[derive(Debug, Default)]
pub struct EventJournal {
    entries: Vec<CanonicalEvent>,
    seen: HashSet<EventIdentity>,
}

impl EventJournal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the event unless an entry with the same identity exists.
    /// Returns `true` when the event was fresh.
    pub fn insert(&mut self, event: CanonicalEvent) -> bool {
        if !self.seen.insert(event.identity()) {
            return false;
        }
        self.entries.push(event);
        true
    }

    pub fn contains(&self, identity: &EventIdentity) -> bool {
        self.seen.contains(identity)
    }

    /// Entries in arrival order.
    pub fn entries(&self) -> &[CanonicalEvent] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
