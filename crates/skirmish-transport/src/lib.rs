//! Transport layer for Skirmish.
//!
//! Serves HTTP with axum: the WebSocket path is upgraded into a
//! [`WebSocketConnection`], the health path answers `200 OK`, everything
//! else gets a `404`.
//!
//! An upgraded connection is split into a [`WebSocketReader`] and a
//! [`WebSocketWriter`] so the inbound and outbound loops can each own one
//! half without sharing a lock.

mod error;
mod router;
mod websocket;

pub use error::TransportError;
pub use router::Routes;
pub use websocket::{
    Inbound, WebSocketConnection, WebSocketReader, WebSocketTransport, WebSocketWriter,
};

use std::fmt;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}
