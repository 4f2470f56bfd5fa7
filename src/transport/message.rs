//! JSON wire protocol
//!
//! Every frame is a JSON object tagged by `type`. Write and read fields are
//! optional on the wire so that a missing field reaches the handler and comes
//! back as an `invalid_argument` error rather than a decode failure.

use serde::{Deserialize, Serialize};

use crate::broker::message::{ChannelId, Message, MessageId};
use crate::utils::error::HandlerError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Write {
        #[serde(default)]
        channel_id: Option<ChannelId>,
        #[serde(default)]
        content: Option<String>,
    },
    Read {
        #[serde(default)]
        id: Option<MessageId>,
    },
    Subscribe {
        channel_id: ChannelId,
    },
    Unsubscribe {
        channel_id: ChannelId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Reply to `write`.
    Written {
        id: MessageId,
        channel_id: ChannelId,
        content: String,
    },
    /// Reply to `read`.
    Message {
        id: MessageId,
        channel_id: ChannelId,
        content: String,
    },
    Subscribed {
        channel_id: ChannelId,
    },
    Unsubscribed {
        channel_id: ChannelId,
    },
    /// A message delivered to a subscription.
    Event {
        channel_id: ChannelId,
        id: MessageId,
        content: String,
    },
    Error {
        kind: String,
        message: String,
    },
}

impl ServerMessage {
    pub fn written(message: &Message) -> Self {
        ServerMessage::Written {
            id: message.id,
            channel_id: message.channel_id,
            content: message.content.clone(),
        }
    }

    pub fn message(message: &Message) -> Self {
        ServerMessage::Message {
            id: message.id,
            channel_id: message.channel_id,
            content: message.content.clone(),
        }
    }

    pub fn error(kind: &str, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            kind: kind.to_string(),
            message: message.into(),
        }
    }
}

impl From<&HandlerError> for ServerMessage {
    fn from(err: &HandlerError) -> Self {
        ServerMessage::error(err.as_label(), err.to_string())
    }
}
