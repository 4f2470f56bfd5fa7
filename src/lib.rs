//! # chatbus
//!
//! `chatbus` is a minimal real-time message distribution server. Writers
//! submit a message addressed to an integer channel; the server assigns it an
//! identity, stores it for point lookups and fans it out to every connected
//! reader subscribed to that channel.
//!
//! ## Core Modules
//!
//! - `broker`: the event bus, its topic registry, the channel filter and topic routing.
//! - `session`: per-reader subscription sessions with an explicit lifecycle.
//! - `handlers`: the write and read operations.
//! - `persistence`: the in-memory message store behind reads.
//! - `client`: a connected peer and its outbound queue.
//! - `transport`: the JSON wire protocol and the WebSocket server.
//! - `config`: loading server configuration.
//! - `utils`: error types and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod handlers;
pub mod persistence;
pub mod session;
pub mod transport;
pub mod utils;

pub use broker::{ChannelId, EventBus, Message, MessageId, RoutingMode};
pub use handlers::Services;
pub use session::{Session, SessionState, TerminationReason};
