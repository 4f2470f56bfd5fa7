//! The `transport` module is responsible for handling network communication
//! with clients, via WebSockets.
//!
//! It defines the JSON frame protocol used between clients and the server,
//! and implements the WebSocket server itself: accepting connections, parsing
//! frames, and forwarding requests to the write/read handlers and to
//! subscription sessions.

pub mod message;
pub mod websocket;
