//! Subscription sessions
//!
//! One [`Session`] per subscribed reader. It owns a bus [`Subscription`],
//! applies the channel filter to every event and pushes matches into its
//! [`EventSink`].
//!
//! Lifecycle:
//!
//! ```text
//!   Created ──activate()──► Active ──(cancel | delivery failure | stream end)──► Terminated
//! ```
//!
//! `Terminated` is absorbing. Entering it releases the bus subscription
//! exactly once; dropping a session in any state also releases it.

pub mod sink;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::broker::bus::{EventBus, Subscription};
use crate::broker::filter::ChannelFilter;
use crate::broker::message::ChannelId;
use crate::broker::routing::{RoutingMode, topic_for};
use crate::broker::topic::{Event, SubscriberId};
use crate::utils::error::{DeliveryError, SessionError};

pub use sink::EventSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Active,
    Terminated,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// The reader went away or cancelled the subscription.
    Cancelled,
    /// Pushing to the reader failed.
    DeliveryFailed(DeliveryError),
    /// The bus could not register the stream.
    BusUnavailable,
    /// The bus finished the stream (removed from the registry elsewhere).
    StreamEnded,
}

impl TerminationReason {
    pub fn as_label(&self) -> &'static str {
        match self {
            TerminationReason::Cancelled => "cancelled",
            TerminationReason::DeliveryFailed(_) => "delivery_failed",
            TerminationReason::BusUnavailable => "bus_unavailable",
            TerminationReason::StreamEnded => "stream_ended",
        }
    }
}

enum Wake {
    Cancelled,
    Next(Option<Event>),
}

#[derive(Debug)]
pub struct Session<S> {
    bus: EventBus,
    topic: String,
    filter: ChannelFilter,
    sink: S,
    state: SessionState,
    subscription: Option<Subscription>,
    delivered: u64,
    reason: Option<TerminationReason>,
}

impl<S: EventSink> Session<S> {
    /// Create a session for `channel`. Nothing is registered on the bus until
    /// [`Session::activate`] (or [`Session::run`]) is called.
    pub fn new(bus: EventBus, routing: RoutingMode, channel: ChannelId, sink: S) -> Self {
        Self {
            bus,
            topic: topic_for(routing, channel).into_owned(),
            filter: ChannelFilter::new(channel),
            sink,
            state: SessionState::Created,
            subscription: None,
            delivered: 0,
            reason: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn channel(&self) -> ChannelId {
        self.filter.requested()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Id of the bus stream while the session is active.
    pub fn subscriber_id(&self) -> Option<&SubscriberId> {
        self.subscription.as_ref().map(Subscription::id)
    }

    /// Number of events pushed to the sink so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn termination_reason(&self) -> Option<&TerminationReason> {
        self.reason.as_ref()
    }

    /// `Created → Active`: register with the bus.
    ///
    /// A bus failure ends the session right away (`BusUnavailable`).
    pub fn activate(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Created {
            return Err(SessionError::AlreadyStarted);
        }
        match self.bus.subscribe(&self.topic) {
            Ok(subscription) => {
                info!(
                    subscriber = %subscription.id(),
                    channel_id = self.channel(),
                    topic = %self.topic,
                    "session active"
                );
                self.subscription = Some(subscription);
                self.state = SessionState::Active;
                Ok(())
            }
            Err(e) => {
                self.terminate(TerminationReason::BusUnavailable);
                Err(e.into())
            }
        }
    }

    /// Apply the filter to one event and push it on match.
    ///
    /// Returns whether the event was delivered.
    pub fn offer(&mut self, event: &Event) -> Result<bool, DeliveryError> {
        if !self.filter.accepts(event) {
            trace!(
                channel_id = self.channel(),
                message_id = %event.id,
                event_channel = event.channel_id,
                "filtered out"
            );
            return Ok(false);
        }
        self.sink.deliver(event)?;
        self.delivered += 1;
        debug!(channel_id = self.channel(), message_id = %event.id, "delivered");
        Ok(true)
    }

    /// Drive the session until it terminates.
    ///
    /// Activates a `Created` session first. The loop only suspends while
    /// waiting for the next event; cancelling `cancel` wakes it and ends the
    /// session without touching the sink again.
    pub async fn run(&mut self, cancel: &CancellationToken) -> TerminationReason {
        if self.state == SessionState::Created && self.activate().is_err() {
            return TerminationReason::BusUnavailable;
        }

        loop {
            let wake = match self.subscription.as_mut() {
                Some(subscription) => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Wake::Cancelled,
                        next = subscription.recv() => Wake::Next(next),
                    }
                }
                None => return self.terminate(TerminationReason::StreamEnded),
            };

            match wake {
                Wake::Cancelled => return self.terminate(TerminationReason::Cancelled),
                Wake::Next(None) => return self.terminate(TerminationReason::StreamEnded),
                Wake::Next(Some(event)) => {
                    if let Err(e) = self.offer(&event) {
                        return self.terminate(TerminationReason::DeliveryFailed(e));
                    }
                }
            }
        }
    }

    /// Explicit cancellation by the reader.
    pub fn cancel(&mut self) -> TerminationReason {
        self.terminate(TerminationReason::Cancelled)
    }

    /// Enter `Terminated`, releasing the bus subscription. Later calls keep
    /// the first reason and release nothing.
    pub fn terminate(&mut self, reason: TerminationReason) -> TerminationReason {
        if let Some(first) = &self.reason {
            return first.clone();
        }

        if let Some(mut subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.state = SessionState::Terminated;

        match &reason {
            TerminationReason::DeliveryFailed(e) => warn!(
                channel_id = self.channel(),
                delivered = self.delivered,
                error = %e,
                "session terminated"
            ),
            _ => info!(
                channel_id = self.channel(),
                delivered = self.delivered,
                reason = reason.as_label(),
                "session terminated"
            ),
        }

        self.reason = Some(reason.clone());
        reason
    }
}

#[cfg(test)]
mod tests;
