use std::io;

/// Transport failures. Everything but [`Bind`](Self::Bind) and
/// [`Shutdown`](Self::Shutdown) concerns a single connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The listener could not be bound.
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// A TCP connection could not be accepted.
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    /// The peer did not complete the WebSocket upgrade.
    #[error("websocket upgrade failed: {0}")]
    Handshake(String),

    /// A frame could not be written to the peer.
    #[error("frame send failed: {0}")]
    Send(String),

    /// The peer's stream broke while reading a frame.
    #[error("frame receive failed: {0}")]
    Receive(String),

    /// The connection is already closed on one side.
    #[error("connection closed: {0}")]
    ConnectionClosed(&'static str),

    /// The transport stopped accepting connections.
    #[error("transport shut down")]
    Shutdown,
}
