//! In-memory message store
//!
//! Backs the read path with a map from message id to record. Nothing is
//! written to disk; the store lives as long as the process.
//!
//! Retention options supported:
//! - `ttl_seconds`: optional time-to-live; expired entries are purged on
//!   insert and are reported missing by `get`
//! - `max_messages`: optional cap; when exceeded the oldest entries are
//!   evicted first

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{PoisonError, RwLock};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::broker::message::{Message, MessageId};

/// Lookup contract used by the read handler.
pub trait MessageStore: Send + Sync + fmt::Debug {
    fn insert(&self, message: Message);
    fn get(&self, id: MessageId) -> Option<Message>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StoredMessage {
    pub message: Message,
    /// Milliseconds since the UNIX epoch.
    pub stored_at: i64,
}

#[derive(Default)]
struct Entries {
    by_id: HashMap<MessageId, StoredMessage>,
    // Insertion order, oldest first. May hold ids already purged from `by_id`.
    order: VecDeque<MessageId>,
}

pub struct InMemoryStore {
    entries: RwLock<Entries>,
    ttl_seconds: Option<i64>,
    max_messages: Option<usize>,
}

impl InMemoryStore {
    pub fn new(ttl_seconds: Option<i64>, max_messages: Option<usize>) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            ttl_seconds,
            max_messages,
        }
    }

    /// Store with no retention limits.
    pub fn unbounded() -> Self {
        Self::new(None, None)
    }

    pub(crate) fn insert_at(&self, message: Message, stored_at: i64) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let id = message.id;
        if entries
            .by_id
            .insert(id, StoredMessage { message, stored_at })
            .is_none()
        {
            entries.order.push_back(id);
        }

        self.purge_expired(&mut entries, Utc::now().timestamp_millis());

        if let Some(max) = self.max_messages {
            while entries.by_id.len() > max {
                let Some(oldest) = entries.order.pop_front() else {
                    break;
                };
                if entries.by_id.remove(&oldest).is_some() {
                    debug!(message_id = %oldest, "evicted by retention cap");
                }
            }
        }
    }

    fn is_expired(&self, stored: &StoredMessage, now: i64) -> bool {
        self.ttl_seconds.is_some_and(|ttl| {
            let cutoff = now.saturating_sub(ttl.saturating_mul(1000));
            stored.stored_at < cutoff
        })
    }

    /// Remove expired entries from the front of the insertion order.
    fn purge_expired(&self, entries: &mut Entries, now: i64) {
        if self.ttl_seconds.is_none() {
            return;
        }
        while let Some(&oldest) = entries.order.front() {
            let expired = match entries.by_id.get(&oldest) {
                Some(stored) => self.is_expired(stored, now),
                None => true,
            };
            if !expired {
                break;
            }
            entries.order.pop_front();
            entries.by_id.remove(&oldest);
        }
    }
}

impl MessageStore for InMemoryStore {
    fn insert(&self, message: Message) {
        self.insert_at(message, Utc::now().timestamp_millis());
    }

    fn get(&self, id: MessageId) -> Option<Message> {
        let now = Utc::now().timestamp_millis();
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.by_id.get(&id) {
                Some(stored) if !self.is_expired(stored, now) => {
                    return Some(stored.message.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.by_id.remove(&id);
        debug!(message_id = %id, "expired on read");
        None
    }

    fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .len()
    }
}

impl fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("len", &self.len())
            .field("ttl_seconds", &self.ttl_seconds)
            .field("max_messages", &self.max_messages)
            .finish()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(Some(3600), Some(10_000))
    }
}
