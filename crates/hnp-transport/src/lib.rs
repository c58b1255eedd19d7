//! Transport abstraction layer for HOP 'N POP 16.
//!
//! Provides the [`Transport`] and [`Connection`] traits the server is
//! written against, plus two implementations:
//!
//! - [`WebSocketTransport`]: binary WebSocket frames via `tokio-tungstenite`
//!   (what the PICO-8 web player speaks)
//! - [`MemoryTransport`]: in-process channel pairs, see [`memory_channel`]
//!
//! The transport only moves byte frames. Upgrade handshakes, framing and
//! socket errors stay behind this boundary.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

mod error;
mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use memory::{channel as memory_channel, MemoryClient, MemoryConnection, MemoryConnector, MemoryTransport};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};

/// Opaque identifier for a connection.
///
/// Ids are 32 bits wide because they are sent to the web player inside the
/// `JOINED` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u32);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u32`.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying `u32` value.
    pub fn into_inner(self) -> u32 {
        self.0
    }

    /// Allocates the next process-wide connection id.
    pub(crate) fn next() -> Self {
        static NEXT_CONNECTION_ID: AtomicU32 = AtomicU32::new(1);
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Waits for and accepts the next incoming connection.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;
}

/// A single bidirectional frame stream.
///
/// Implementations must allow `send` and `recv` to run concurrently from
/// different tasks: the server reads on one task and writes on another.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends one frame to the remote peer.
    fn send(&self, data: &[u8]) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(&self) -> impl Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send;

    /// Closes the connection.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
