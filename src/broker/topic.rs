//! Topic management
//!
//! A `Topic` holds the live output streams registered under one routing key.
//! Every stream is the sending half of an unbounded per-subscriber queue, so
//! handing an event to a topic never waits on a reader.
//!
//! Concurrency note: callers must synchronize access to `Topic` (the bus
//! keeps every topic behind its registry lock).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::broker::message::Message;

pub type SubscriberId = String;

/// What the bus delivers: a shared handle to an immutable message.
pub type Event = Arc<Message>;

#[derive(Debug, Default)]
pub struct Topic {
    pub name: String,
    pub subscribers: HashMap<SubscriberId, UnboundedSender<Event>>,
}

impl Topic {
    /// Create a new topic with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            subscribers: HashMap::new(),
        }
    }

    /// Register an output stream. Returns `false` if the id was already present,
    /// in which case the existing stream is kept.
    pub fn subscribe(&mut self, id: SubscriberId, stream: UnboundedSender<Event>) -> bool {
        if self.subscribers.contains_key(&id) {
            return false;
        }
        self.subscribers.insert(id, stream);
        true
    }

    /// Remove a subscriber's stream. Returns `true` if it was registered.
    pub fn unsubscribe(&mut self, id: &SubscriberId) -> bool {
        self.subscribers.remove(id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Point-in-time copy of the registered streams, taken so publishing can
    /// proceed without holding the registry lock.
    pub fn snapshot(&self) -> Vec<(SubscriberId, UnboundedSender<Event>)> {
        self.subscribers
            .iter()
            .map(|(id, tx)| (id.clone(), tx.clone()))
            .collect()
    }
}
