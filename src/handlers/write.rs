//! Write path
//!
//! Builds a message from a writer's request, records it in the store and
//! hands it to the bus. The publish has happened by the time `write` returns,
//! though subscribers may not have consumed it yet.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::broker::bus::EventBus;
use crate::broker::message::{ChannelId, Message};
use crate::broker::routing::{RoutingMode, topic_for};
use crate::handlers::ids::IdGenerator;
use crate::persistence::MessageStore;
use crate::utils::error::HandlerError;

/// Fields are optional so a request with a missing field can still be
/// decoded and rejected with `InvalidArgument`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    pub channel_id: Option<ChannelId>,
    pub content: Option<String>,
}

impl WriteRequest {
    pub fn new(channel_id: ChannelId, content: impl Into<String>) -> Self {
        Self {
            channel_id: Some(channel_id),
            content: Some(content.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WriteHandler {
    bus: EventBus,
    store: Arc<dyn MessageStore>,
    ids: Arc<IdGenerator>,
    routing: RoutingMode,
}

impl WriteHandler {
    pub fn new(bus: EventBus, store: Arc<dyn MessageStore>, routing: RoutingMode) -> Self {
        Self {
            bus,
            store,
            ids: Arc::new(IdGenerator::new()),
            routing,
        }
    }

    pub fn write(&self, request: WriteRequest) -> Result<Message, HandlerError> {
        let channel_id = request
            .channel_id
            .ok_or_else(|| HandlerError::InvalidArgument("channel_id is required".to_string()))?;
        let content = request
            .content
            .ok_or_else(|| HandlerError::InvalidArgument("content is required".to_string()))?;

        let message = Message::new(self.ids.next_id(), channel_id, content);
        self.store.insert(message.clone());

        let topic = topic_for(self.routing, channel_id);
        let handed_off = self.bus.publish(&topic, message.clone());

        info!(message_id = %message.id, channel_id, %topic, handed_off, "message written");
        Ok(message)
    }
}
