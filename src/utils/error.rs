//! The `error` module defines the error types used within `chatbus`.
//!
//! Errors are scoped to where they happen: a handler error belongs to one
//! request, a delivery or bus error to one subscription session. Nothing here
//! is fatal to the process except [`ServerError`], which only occurs while
//! the listener starts up.
//!
//! Every enum exposes `as_label`, a short stable snake_case label used in
//! logs and as the `kind` of error frames on the wire.

use thiserror::Error;

use crate::broker::message::MessageId;

/// Failure of the event bus registry itself.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The registry lock was poisoned by a panicking holder.
    #[error("event bus registry unavailable")]
    Unavailable,
}

impl BusError {
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::Unavailable => "bus_unavailable",
        }
    }
}

/// Failure to push an event to a reader's outbound connection.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("outbound connection closed")]
    Closed,
    #[error("failed to encode event: {0}")]
    Encode(String),
}

impl DeliveryError {
    pub fn as_label(&self) -> &'static str {
        match self {
            DeliveryError::Closed => "delivery_closed",
            DeliveryError::Encode(_) => "delivery_encode",
        }
    }
}

/// Errors returned synchronously by the write and read handlers.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("message {0} not found")]
    NotFound(MessageId),
}

impl HandlerError {
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::InvalidArgument(_) => "invalid_argument",
            HandlerError::NotFound(_) => "not_found",
        }
    }
}

/// Errors raised while driving a subscription session.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// `activate` was called on a session that already left `Created`.
    #[error("session already started")]
    AlreadyStarted,
    #[error(transparent)]
    Bus(#[from] BusError),
}

impl SessionError {
    pub fn as_label(&self) -> &'static str {
        match self {
            SessionError::AlreadyStarted => "session_already_started",
            SessionError::Bus(e) => e.as_label(),
        }
    }
}

/// Startup failures of the WebSocket server.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    pub fn as_label(&self) -> &'static str {
        match self {
            ServerError::Bind { .. } => "server_bind",
            ServerError::Io(_) => "server_io",
        }
    }
}
