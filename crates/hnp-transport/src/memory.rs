//! In-process transport built on tokio channels.
//!
//! Each [`MemoryConnector::connect`] call hands a fresh
//! [`MemoryConnection`] to the paired [`MemoryTransport`] and returns the
//! client end. Frames are delivered whole and in order.

use tokio::sync::{mpsc, watch, Mutex};

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Creates a transport and the connector that feeds it.
pub fn channel() -> (MemoryTransport, MemoryConnector) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MemoryTransport { incoming: rx }, MemoryConnector { pending: tx })
}

/// Server side of the in-memory transport.
pub struct MemoryTransport {
    incoming: mpsc::UnboundedReceiver<MemoryConnection>,
}

impl Transport for MemoryTransport {
    type Connection = MemoryConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        self.incoming.recv().await.ok_or(TransportError::Shutdown)
    }
}

/// Opens client connections against a [`MemoryTransport`].
#[derive(Clone)]
pub struct MemoryConnector {
    pending: mpsc::UnboundedSender<MemoryConnection>,
}

impl MemoryConnector {
    /// Opens a new connection. Fails once the transport has been dropped.
    pub fn connect(&self) -> Result<MemoryClient, TransportError> {
        let (to_server, from_client) = mpsc::unbounded_channel();
        let (to_client, from_server) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);

        let id = ConnectionId::next();
        let conn = MemoryConnection {
            id,
            inbound: Mutex::new(from_client),
            outbound: std::sync::Mutex::new(Some(to_client)),
            closed,
        };
        self.pending
            .send(conn)
            .map_err(|_| TransportError::Shutdown)?;

        tracing::trace!(%id, "opened in-memory connection");
        Ok(MemoryClient {
            id,
            inbound: from_server,
            outbound: Some(to_server),
        })
    }
}

/// Server end of an in-memory connection.
pub struct MemoryConnection {
    id: ConnectionId,
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    outbound: std::sync::Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    closed: watch::Sender<bool>,
}

impl Connection for MemoryConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let guard = self
            .outbound
            .lock()
            .map_err(|_| TransportError::ConnectionClosed("poisoned"))?;
        match guard.as_ref() {
            Some(tx) => tx
                .send(data.to_vec())
                .map_err(|_| TransportError::ConnectionClosed("client dropped")),
            None => Err(TransportError::ConnectionClosed("closed locally")),
        }
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut closed = self.closed.subscribe();
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            frame = inbound.recv() => Ok(frame),
            _ = closed.wait_for(|c| *c) => Ok(None),
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        if let Ok(mut guard) = self.outbound.lock() {
            guard.take();
        }
        self.closed.send_replace(true);
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Client end of an in-memory connection.
pub struct MemoryClient {
    id: ConnectionId,
    inbound: mpsc::UnboundedReceiver<Vec<u8>>,
    outbound: Option<mpsc::UnboundedSender<Vec<u8>>>,
}

impl MemoryClient {
    /// The id the server side sees for this connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Sends one frame to the server.
    pub fn send(&self, data: impl Into<Vec<u8>>) -> Result<(), TransportError> {
        match &self.outbound {
            Some(tx) => tx
                .send(data.into())
                .map_err(|_| TransportError::ConnectionClosed("server dropped")),
            None => Err(TransportError::ConnectionClosed("closed locally")),
        }
    }

    /// Receives the next frame, or `None` once the server closed.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.inbound.recv().await
    }

    /// Closes the client's sending half; the server observes end of stream.
    pub fn close(&mut self) {
        self.outbound.take();
    }
}
