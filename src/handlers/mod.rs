//! Request handlers for the write and read operations, plus [`Services`],
//! the bundle of shared state the transport hands to every connection.

pub mod ids;
pub mod read;
pub mod write;

use std::sync::Arc;

use crate::broker::bus::EventBus;
use crate::broker::routing::RoutingMode;
use crate::config::Settings;
use crate::persistence::{InMemoryStore, MessageStore};

pub use ids::IdGenerator;
pub use read::{ReadHandler, ReadRequest};
pub use write::{WriteHandler, WriteRequest};

/// Everything a connection needs. Cheap to clone; all clones share one bus
/// and one store.
#[derive(Debug, Clone)]
pub struct Services {
    pub bus: EventBus,
    pub writer: WriteHandler,
    pub reader: ReadHandler,
    pub routing: RoutingMode,
}

impl Services {
    pub fn new(routing: RoutingMode, store: Arc<dyn MessageStore>) -> Self {
        let bus = EventBus::new();
        Self {
            writer: WriteHandler::new(bus.clone(), store.clone(), routing),
            reader: ReadHandler::new(store),
            bus,
            routing,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let store = InMemoryStore::new(
            settings.store.ttl_seconds(),
            settings.store.message_cap(),
        );
        Self::new(settings.broker.routing, Arc::new(store))
    }
}

impl Default for Services {
    fn default() -> Self {
        Self::new(RoutingMode::default(), Arc::new(InMemoryStore::unbounded()))
    }
}
