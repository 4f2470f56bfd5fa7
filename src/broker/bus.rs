//! Event bus
//!
//! The process-wide registry that decouples writers from readers. The bus
//! keeps, per topic name, the set of live output streams and offers:
//! - `publish`: hand an event to every stream registered under a topic
//! - `subscribe`: register a new stream and get a [`Subscription`] back
//! - `unsubscribe`: drop a stream from the registry (idempotent)
//!
//! Concurrency and usage notes:
//! - `EventBus` is a cheap `Clone` handle around an `Arc`; construct one per
//!   server (or per test) and pass it to handlers and sessions.
//! - The registry sits behind an `RwLock`. `publish` only takes the read lock
//!   long enough to copy the topic's streams, then sends without any lock
//!   held. A subscriber that registers mid-publish may miss that event; one
//!   that leaves mid-publish just sees its send fail, which is ignored.
//! - Every stream is an unbounded queue. Publishing never waits for a reader.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, error, trace};
use uuid::Uuid;

use crate::broker::topic::{Event, SubscriberId, Topic};
use crate::utils::error::BusError;

#[derive(Debug, Clone, Default)]
pub struct EventBus {
    registry: Arc<RwLock<HashMap<String, Topic>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new output stream under `topic`. The topic is created on
    /// first use.
    pub fn subscribe(&self, topic: &str) -> Result<Subscription, BusError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = format!("sub-{}", Uuid::new_v4());

        {
            let mut registry = self.registry.write().map_err(|_| BusError::Unavailable)?;
            registry
                .entry(topic.to_string())
                .or_insert_with(|| Topic::new(topic))
                .subscribe(id.clone(), tx);
        }

        debug!(subscriber = %id, topic, "stream registered");

        Ok(Subscription {
            id,
            topic: topic.to_string(),
            rx,
            bus: self.clone(),
            finished: false,
        })
    }

    /// Hand `event` to every stream currently registered under `topic`.
    ///
    /// Returns how many streams accepted the event. Zero subscribers is not an
    /// error; neither is a stream that closed since the snapshot was taken.
    pub fn publish(&self, topic: &str, event: impl Into<Event>) -> usize {
        let event = event.into();

        let targets = match self.registry.read() {
            Ok(registry) => match registry.get(topic) {
                Some(t) => t.snapshot(),
                None => {
                    trace!(topic, message_id = %event.id, "no subscribers");
                    return 0;
                }
            },
            Err(_) => {
                error!(topic, message_id = %event.id, "registry unavailable, event dropped");
                return 0;
            }
        };

        let mut handed_off = 0;
        for (id, stream) in targets {
            if stream.send(event.clone()).is_ok() {
                handed_off += 1;
            } else {
                debug!(subscriber = %id, topic, "stream already closed, skipping");
            }
        }

        trace!(topic, message_id = %event.id, handed_off, "published");
        handed_off
    }

    /// Remove a stream from the registry. Returns `true` only for the call
    /// that actually removed it; later calls are no-ops. Empty topics are
    /// dropped from the registry.
    ///
    /// A poisoned lock is recovered here: removal must never be skipped.
    pub fn unsubscribe(&self, topic: &str, id: &SubscriberId) -> bool {
        let mut registry = self
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let Some(t) = registry.get_mut(topic) else {
            return false;
        };
        let removed = t.unsubscribe(id);
        if t.is_empty() {
            registry.remove(topic);
        }

        if removed {
            debug!(subscriber = %id, topic, "stream removed");
        }
        removed
    }

    /// Number of live streams registered under `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.registry
            .read()
            .map(|r| r.get(topic).map_or(0, Topic::len))
            .unwrap_or(0)
    }

    /// Number of topics with at least one live stream.
    pub fn topic_count(&self) -> usize {
        self.registry.read().map(|r| r.len()).unwrap_or(0)
    }
}

/// Handle to one registered output stream.
///
/// Yields events in the order they were published, until unsubscribed. The
/// stream is removed from the bus when the handle is dropped, so a forgotten
/// handle cannot keep receiving.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    topic: String,
    rx: UnboundedReceiver<Event>,
    bus: EventBus,
    finished: bool,
}

impl Subscription {
    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the next event. `None` means the sequence is finished.
    pub async fn recv(&mut self) -> Option<Event> {
        if self.finished {
            return None;
        }
        let next = self.rx.recv().await;
        if next.is_none() {
            self.finished = true;
        }
        next
    }

    /// Take an already-buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        if self.finished {
            return None;
        }
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.finished = true;
                None
            }
        }
    }

    /// Leave the bus. Buffered events are discarded and the sequence is
    /// finished afterwards. Calling it again does nothing.
    pub fn unsubscribe(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.bus.unsubscribe(&self.topic, &self.id);
        self.rx.close();
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Stream for Subscription {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, PoisonError};
    use std::thread;

    use tokio::sync::mpsc;

    use super::EventBus;
    use crate::broker::routing::{RoutingMode, SHARED_TOPIC};
    use crate::broker::{Message, MessageId};
    use crate::session::{Session, SessionState, TerminationReason};
    use crate::utils::error::{BusError, SessionError};

    fn poison(bus: &EventBus) {
        let registry = Arc::clone(&bus.registry);
        let outcome = thread::spawn(move || {
            let _guard = registry.write().unwrap();
            panic!("registry holder crashed");
        })
        .join();
        assert!(outcome.is_err());
        assert!(bus.registry.is_poisoned());
    }

    fn registered(bus: &EventBus, topic: &str) -> usize {
        let registry = bus.registry.read().unwrap_or_else(PoisonError::into_inner);
        registry.get(topic).map_or(0, |t| t.len())
    }

    #[test]
    fn test_poisoned_registry_is_local_to_each_caller() {
        let bus = EventBus::new();
        let mut first = bus.subscribe(SHARED_TOPIC).unwrap();
        let mut second = bus.subscribe(SHARED_TOPIC).unwrap();

        poison(&bus);

        assert_eq!(bus.subscribe(SHARED_TOPIC).unwrap_err(), BusError::Unavailable);

        let event = Arc::new(Message::new(MessageId(1), 7, "lost"));
        assert_eq!(bus.publish(SHARED_TOPIC, event), 0);
        assert!(first.try_recv().is_none());

        first.unsubscribe();
        assert!(first.is_finished());
        assert_eq!(registered(&bus, SHARED_TOPIC), 1);
        assert!(!bus.unsubscribe(SHARED_TOPIC, first.id()));

        second.unsubscribe();
        assert!(second.is_finished());
        assert_eq!(registered(&bus, SHARED_TOPIC), 0);
    }

    #[test]
    fn test_session_activation_on_poisoned_registry_terminates() {
        let bus = EventBus::new();
        let mut survivor = bus.subscribe(SHARED_TOPIC).unwrap();
        poison(&bus);

        let (tx, _rx) = mpsc::unbounded_channel();
        let mut session = Session::new(bus.clone(), RoutingMode::Shared, 7, tx);

        assert_eq!(session.activate(), Err(SessionError::Bus(BusError::Unavailable)));
        assert_eq!(session.state(), SessionState::Terminated);
        assert_eq!(session.termination_reason(), Some(&TerminationReason::BusUnavailable));
        assert!(session.subscriber_id().is_none());

        drop(session);
        assert_eq!(registered(&bus, SHARED_TOPIC), 1);
        survivor.unsubscribe();
        assert_eq!(registered(&bus, SHARED_TOPIC), 0);
    }
}
