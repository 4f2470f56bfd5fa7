use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::{EventSink, Session, SessionState, TerminationReason};
use crate::broker::routing::{RoutingMode, SHARED_TOPIC};
use crate::broker::topic::Event;
use crate::broker::{EventBus, Message, MessageId};
use crate::utils::error::{DeliveryError, SessionError};

fn event(id: u64, channel_id: i64) -> Event {
    Arc::new(Message::new(MessageId(id), channel_id, format!("m{id}")))
}

fn session(
    bus: &EventBus,
    channel: i64,
) -> (Session<mpsc::UnboundedSender<Event>>, UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Session::new(bus.clone(), RoutingMode::Shared, channel, tx), rx)
}

/// Sink that accepts a fixed number of events, then reports a broken connection.
struct FailingSink {
    remaining: usize,
}

impl EventSink for FailingSink {
    fn deliver(&mut self, _event: &Event) -> Result<(), DeliveryError> {
        if self.remaining == 0 {
            return Err(DeliveryError::Closed);
        }
        self.remaining -= 1;
        Ok(())
    }
}

async fn expect_event(rx: &mut UnboundedReceiver<Event>) -> Event {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out")
        .expect("sink closed")
}

#[test]
fn test_new_session_is_created_and_detached() {
    let bus = EventBus::new();
    let (s, _rx) = session(&bus, 1);

    assert_eq!(s.state(), SessionState::Created);
    assert_eq!(s.channel(), 1);
    assert_eq!(s.topic(), SHARED_TOPIC);
    assert_eq!(bus.subscriber_count(SHARED_TOPIC), 0);
}

#[test]
fn test_activate_registers_once() {
    let bus = EventBus::new();
    let (mut s, _rx) = session(&bus, 1);

    s.activate().unwrap();
    assert_eq!(s.state(), SessionState::Active);
    assert_eq!(bus.subscriber_count(SHARED_TOPIC), 1);

    assert_eq!(s.activate(), Err(SessionError::AlreadyStarted));
    assert_eq!(bus.subscriber_count(SHARED_TOPIC), 1);
}

#[test]
fn test_offer_applies_filter() {
    let bus = EventBus::new();
    let (mut s, mut rx) = session(&bus, 1);

    assert_eq!(s.offer(&event(1, 2)), Ok(false));
    assert_eq!(s.offer(&event(2, 1)), Ok(true));

    assert_eq!(rx.try_recv().unwrap().id, MessageId(2));
    assert!(rx.try_recv().is_err());
    assert_eq!(s.delivered(), 1);
}

#[test]
fn test_terminate_is_absorbing_and_releases_once() {
    let bus = EventBus::new();
    let (mut s, _rx) = session(&bus, 1);
    s.activate().unwrap();

    assert_eq!(s.cancel(), TerminationReason::Cancelled);
    assert_eq!(s.state(), SessionState::Terminated);
    assert_eq!(bus.subscriber_count(SHARED_TOPIC), 0);

    // A second termination keeps the first reason.
    assert_eq!(
        s.terminate(TerminationReason::StreamEnded),
        TerminationReason::Cancelled
    );
    assert_eq!(s.termination_reason(), Some(&TerminationReason::Cancelled));
    assert_eq!(s.activate(), Err(SessionError::AlreadyStarted));
}

#[test]
fn test_dropping_active_session_releases_stream() {
    let bus = EventBus::new();
    let (mut s, _rx) = session(&bus, 1);
    s.activate().unwrap();
    assert_eq!(bus.subscriber_count(SHARED_TOPIC), 1);

    drop(s);
    assert_eq!(bus.subscriber_count(SHARED_TOPIC), 0);
}

#[tokio::test]
async fn test_run_delivers_only_requested_channel() {
    let bus = EventBus::new();
    let (mut s, mut rx) = session(&bus, 1);
    s.activate().unwrap();
    let cancel = CancellationToken::new();

    let handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let reason = s.run(&cancel).await;
            (reason, s.delivered())
        })
    };

    bus.publish(SHARED_TOPIC, event(1, 2));
    bus.publish(SHARED_TOPIC, event(2, 1));
    bus.publish(SHARED_TOPIC, event(3, 3));
    bus.publish(SHARED_TOPIC, event(4, 1));

    assert_eq!(expect_event(&mut rx).await.id, MessageId(2));
    assert_eq!(expect_event(&mut rx).await.id, MessageId(4));

    cancel.cancel();
    let (reason, delivered) = handle.await.unwrap();
    assert_eq!(reason, TerminationReason::Cancelled);
    assert_eq!(delivered, 2);
    assert!(rx.try_recv().is_err());
    assert_eq!(bus.subscriber_count(SHARED_TOPIC), 0);
}

#[tokio::test]
async fn test_run_activates_created_session() {
    let bus = EventBus::new();
    let (mut s, _rx) = session(&bus, 5);
    let cancel = CancellationToken::new();
    cancel.cancel();

    assert_eq!(s.run(&cancel).await, TerminationReason::Cancelled);
    assert_eq!(s.state(), SessionState::Terminated);
    assert_eq!(bus.subscriber_count(SHARED_TOPIC), 0);
}

#[tokio::test]
async fn test_delivery_failure_terminates_session() {
    let bus = EventBus::new();
    let mut s = Session::new(
        bus.clone(),
        RoutingMode::Shared,
        1,
        FailingSink { remaining: 1 },
    );
    s.activate().unwrap();

    bus.publish(SHARED_TOPIC, event(1, 1));
    bus.publish(SHARED_TOPIC, event(2, 1));

    let reason = timeout(Duration::from_secs(1), s.run(&CancellationToken::new()))
        .await
        .expect("session kept running after delivery failure");
    assert_eq!(
        reason,
        TerminationReason::DeliveryFailed(DeliveryError::Closed)
    );
    assert_eq!(s.delivered(), 1);
    assert_eq!(bus.subscriber_count(SHARED_TOPIC), 0);

    // The publisher is unaffected by the dead session.
    assert_eq!(bus.publish(SHARED_TOPIC, event(3, 1)), 0);
}

#[tokio::test]
async fn test_failing_session_does_not_affect_others() {
    let bus = EventBus::new();
    let mut broken = Session::new(
        bus.clone(),
        RoutingMode::Shared,
        1,
        FailingSink { remaining: 0 },
    );
    let (mut healthy, mut rx) = session(&bus, 1);
    broken.activate().unwrap();
    healthy.activate().unwrap();

    let cancel = CancellationToken::new();
    let broken_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { broken.run(&cancel).await })
    };
    let healthy_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { healthy.run(&cancel).await })
    };

    bus.publish(SHARED_TOPIC, event(1, 1));
    bus.publish(SHARED_TOPIC, event(2, 1));

    assert!(matches!(
        broken_task.await.unwrap(),
        TerminationReason::DeliveryFailed(_)
    ));
    assert_eq!(expect_event(&mut rx).await.id, MessageId(1));
    assert_eq!(expect_event(&mut rx).await.id, MessageId(2));

    cancel.cancel();
    assert_eq!(healthy_task.await.unwrap(), TerminationReason::Cancelled);
}

#[tokio::test]
async fn test_stream_removed_by_bus_ends_session() {
    let bus = EventBus::new();
    let (mut s, _rx) = session(&bus, 1);
    s.activate().unwrap();
    let id = s.subscriber_id().cloned().expect("active session has a stream");

    assert!(bus.unsubscribe(SHARED_TOPIC, &id));

    let reason = timeout(Duration::from_secs(1), s.run(&CancellationToken::new()))
        .await
        .expect("session kept waiting on a removed stream");
    assert_eq!(reason, TerminationReason::StreamEnded);
    assert_eq!(s.state(), SessionState::Terminated);
}

#[tokio::test]
async fn test_per_channel_routing_uses_channel_topic() {
    let bus = EventBus::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut s = Session::new(bus.clone(), RoutingMode::PerChannel, 9, tx);
    s.activate().unwrap();
    assert_eq!(s.topic(), "message:9");

    assert_eq!(bus.publish(SHARED_TOPIC, event(1, 9)), 0);
    assert_eq!(bus.publish("message:9", event(2, 9)), 1);

    let cancel = CancellationToken::new();
    let task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { s.run(&cancel).await })
    };
    assert_eq!(expect_event(&mut rx).await.id, MessageId(2));
    cancel.cancel();
    task.await.unwrap();
}
