//! Message definitions for the broker
//!
//! `Message` is the record created by the write path and fanned out to
//! subscription sessions. It is immutable once built; the bus hands out
//! shared `Arc<Message>` handles so a single publish never copies the content
//! per subscriber.
//!
//! Notes on fields:
//! - `id`: opaque identity assigned by the write path (see `IdGenerator`)
//! - `channel_id`: integer routing key compared by the channel filter
//! - `content`: text body supplied by the writer

use std::fmt;

use serde::{Deserialize, Serialize};

/// Integer identifier of a logical chat channel.
pub type ChannelId = i64;

/// Identity of a message, unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub content: String,
}

impl Message {
    pub fn new(id: MessageId, channel_id: ChannelId, content: impl Into<String>) -> Self {
        Self {
            id,
            channel_id,
            content: content.into(),
        }
    }
}
