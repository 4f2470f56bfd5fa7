//! Client representation
//!
//! `Client` models one connected peer and holds the sending side of its
//! outbound queue. The transport drains that queue into the socket; handlers
//! and sessions only ever push into it, so they never wait on network I/O.

use tokio::sync::mpsc::UnboundedSender;
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::transport::message::ServerMessage;
use crate::utils::error::DeliveryError;

#[derive(Debug, Clone)]
pub struct Client {
    /// Unique identifier for the connection.
    pub id: String,

    /// Channel to send WebSocket frames to the client.
    pub sender: UnboundedSender<WsMessage>,
}

impl Client {
    /// Create a new client with a sender channel. The `id` is a UUID used
    /// to identify the connection in logs.
    pub fn new(sender: UnboundedSender<WsMessage>) -> Self {
        Self {
            id: format!("client-{}", Uuid::new_v4()),
            sender,
        }
    }

    /// Encode `msg` as a JSON text frame and queue it for the socket.
    pub fn send(&self, msg: &ServerMessage) -> Result<(), DeliveryError> {
        let text = serde_json::to_string(msg).map_err(|e| DeliveryError::Encode(e.to_string()))?;
        self.sender
            .send(WsMessage::text(text))
            .map_err(|_| DeliveryError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
