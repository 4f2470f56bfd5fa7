//! The `client` module defines the representation of a connected peer.
//!
//! It provides the `Client` struct, which encapsulates the connection's
//! identifier and the channel for sending frames to it.

pub mod pubsub_client;
pub use pubsub_client::Client;
