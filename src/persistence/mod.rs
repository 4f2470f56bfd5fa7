//! The `persistence` module provides the message store behind the read path.
//!
//! Messages are kept in memory only, under a retention policy (TTL and a
//! size cap). There is no durability across restarts.

pub mod memory_store;

pub use memory_store::{InMemoryStore, MessageStore, StoredMessage};
