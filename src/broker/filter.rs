//! Channel filter
//!
//! Applied per event and per subscriber at delivery time, so one publish can
//! satisfy any number of sessions across different channels.

use crate::broker::message::{ChannelId, Message};

/// Exact-equality match between an event's channel and the requested one.
pub fn matches(event_channel: ChannelId, requested: ChannelId) -> bool {
    event_channel == requested
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelFilter {
    requested: ChannelId,
}

impl ChannelFilter {
    pub fn new(requested: ChannelId) -> Self {
        Self { requested }
    }

    pub fn requested(&self) -> ChannelId {
        self.requested
    }

    pub fn accepts(&self, message: &Message) -> bool {
        matches(message.channel_id, self.requested)
    }
}
