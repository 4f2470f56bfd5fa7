//! Outbound side of a subscription session.
//!
//! A session does not know about sockets. It pushes matching events into an
//! [`EventSink`]; the transport provides one backed by the connection's
//! outbound queue, tests use a plain channel.

use tokio::sync::mpsc::UnboundedSender;

use crate::broker::topic::Event;
use crate::client::Client;
use crate::transport::message::ServerMessage;
use crate::utils::error::DeliveryError;

pub trait EventSink: Send {
    /// Push one event towards the reader. Must not wait on the reader; an
    /// error means the connection is gone and the session should end.
    fn deliver(&mut self, event: &Event) -> Result<(), DeliveryError>;
}

impl EventSink for UnboundedSender<Event> {
    fn deliver(&mut self, event: &Event) -> Result<(), DeliveryError> {
        self.send(event.clone()).map_err(|_| DeliveryError::Closed)
    }
}

impl EventSink for Client {
    fn deliver(&mut self, event: &Event) -> Result<(), DeliveryError> {
        self.send(&ServerMessage::Event {
            channel_id: event.channel_id,
            id: event.id,
            content: event.content.clone(),
        })
    }
}
