use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::broker::message::{Message, MessageId};
use crate::persistence::MessageStore;
use crate::utils::error::HandlerError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRequest {
    pub id: Option<MessageId>,
}

impl ReadRequest {
    pub fn new(id: MessageId) -> Self {
        Self { id: Some(id) }
    }
}

/// Point lookup by message id. Never touches the bus.
#[derive(Debug, Clone)]
pub struct ReadHandler {
    store: Arc<dyn MessageStore>,
}

impl ReadHandler {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    pub fn read(&self, request: ReadRequest) -> Result<Message, HandlerError> {
        let id = request
            .id
            .ok_or_else(|| HandlerError::InvalidArgument("id is required".to_string()))?;

        match self.store.get(id) {
            Some(message) => Ok(message),
            None => {
                debug!(message_id = %id, "read miss");
                Err(HandlerError::NotFound(id))
            }
        }
    }
}
