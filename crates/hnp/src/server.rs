//! `HnpServer` builder and server loop.
//!
//! Ties the layers together: transport → handshake → room manager → room
//! actors, with the admin control plane on a separate listener.

use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hnp_admin::{AdminAuth, AdminState, SERVER_SHUTDOWN_REASON};
use hnp_protocol::CompiledProtocol;
use hnp_room::{RelayLogic, RoomLogic, RoomManager};
use hnp_schema::ValidatedSchema;
use hnp_transport::{Transport, TransportError, WebSocketTransport};
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::handler::handle_connection;
use crate::{HnpError, ServerConfig};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState {
    pub(crate) manager: RoomManager,
    pub(crate) protocol: Arc<CompiledProtocol>,
    pub(crate) outbound_buffer: usize,
    pub(crate) send_timeout: Duration,
    pub(crate) join_timeout: Duration,
}

/// Builder for configuring and starting a server.
///
/// # Example
///
/// ```rust,ignore
/// let schema = hnp_schema::validate(&ProtocolSchema::load("protocol.toml")?)?;
/// let server = HnpServerBuilder::new()
///     .config(ServerConfig::load("hnp.toml")?)
///     .build(&schema)
///     .await?;
/// server.run().await
/// ```
pub struct HnpServerBuilder<L: RoomLogic = RelayLogic> {
    config: ServerConfig,
    _logic: PhantomData<fn() -> L>,
}

impl HnpServerBuilder {
    /// Creates a builder with default settings and relay rooms.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            _logic: PhantomData,
        }
    }
}

impl Default for HnpServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: RoomLogic> HnpServerBuilder<L> {
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs rooms with different game rules.
    pub fn logic<M: RoomLogic>(self) -> HnpServerBuilder<M> {
        HnpServerBuilder {
            config: self.config,
            _logic: PhantomData,
        }
    }

    /// Binds the WebSocket and admin listeners from the configuration.
    pub async fn build(self, schema: &ValidatedSchema) -> Result<HnpServer<WebSocketTransport>, HnpError> {
        self.config.validate()?;
        let transport = WebSocketTransport::bind(&self.config.game_addr()?.to_string()).await?;
        let admin = TcpListener::bind(self.config.admin_addr()?).await?;
        self.assemble(transport, Some(admin), schema)
    }

    /// Serves connections from any transport. No admin listener is bound;
    /// use [`HnpServer::manager`] to drive admin actions directly.
    pub fn build_with<T>(self, transport: T, schema: &ValidatedSchema) -> Result<HnpServer<T>, HnpError>
    where
        T: Transport<Error = TransportError>,
        T::Connection: hnp_transport::Connection<Error = TransportError>,
    {
        self.config.validate()?;
        self.assemble(transport, None, schema)
    }

    fn assemble<T>(
        self,
        transport: T,
        admin: Option<TcpListener>,
        schema: &ValidatedSchema,
    ) -> Result<HnpServer<T>, HnpError> {
        let protocol = Arc::new(CompiledProtocol::compile(schema));
        let manager = RoomManager::spawn::<L>(self.config.room_limits(), Arc::clone(&protocol))?;
        let auth = AdminAuth::new(&self.config.admin_header, self.config.admin_secret.clone())?;

        let state = Arc::new(ServerState {
            manager,
            protocol,
            outbound_buffer: self.config.outbound_buffer,
            send_timeout: self.config.send_timeout(),
            join_timeout: self.config.join_timeout(),
        });
        let (stop, _) = watch::channel(false);

        Ok(HnpServer {
            transport,
            state,
            admin,
            auth,
            stop,
        })
    }
}

/// Stops a running server from another task.
#[derive(Clone)]
pub struct ServerHandle {
    stop: watch::Sender<bool>,
}

impl ServerHandle {
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }
}

/// A configured server. Call [`run()`](Self::run) to start accepting.
pub struct HnpServer<T> {
    transport: T,
    state: Arc<ServerState>,
    admin: Option<TcpListener>,
    auth: AdminAuth,
    stop: watch::Sender<bool>,
}

impl HnpServer<WebSocketTransport> {
    /// Returns the address game clients connect to.
    pub fn local_addr(&self) -> Result<SocketAddr, HnpError> {
        Ok(self.transport.local_addr()?)
    }
}

impl<T> HnpServer<T>
where
    T: Transport<Error = TransportError>,
    T::Connection: hnp_transport::Connection<Error = TransportError>,
{
    /// Returns the admin listener's address, if one is bound.
    pub fn admin_addr(&self) -> Option<SocketAddr> {
        self.admin.as_ref().and_then(|l| l.local_addr().ok())
    }

    pub fn manager(&self) -> RoomManager {
        self.state.manager.clone()
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            stop: self.stop.clone(),
        }
    }

    /// Runs the accept loop until an admin shutdown, a
    /// [`ServerHandle::stop`] call, or the transport shutting down.
    pub async fn run(mut self) -> Result<(), HnpError> {
        let admin_task = self.admin.take().map(|listener| {
            let state = AdminState::new(self.state.manager.clone(), self.auth.clone())
                .with_stop_signal(self.stop.clone());
            let mut stopped = self.stop.subscribe();
            tokio::spawn(hnp_admin::serve(listener, state, async move {
                let _ = stopped.wait_for(|s| *s).await;
            }))
        });

        let fingerprint = self.state.protocol.fingerprint();
        tracing::info!(fingerprint, "server running");

        let mut stopped = self.stop.subscribe();
        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(TransportError::Shutdown) => {
                        tracing::info!("transport shut down");
                        break;
                    }
                    Err(TransportError::Handshake(reason)) => {
                        tracing::debug!(%reason, "client failed the websocket upgrade");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
                _ = stopped.wait_for(|s| *s) => {
                    tracing::info!("stop requested");
                    break;
                }
            }
        }

        self.state.manager.shutdown(SERVER_SHUTDOWN_REASON).await?;
        self.stop.send_replace(true);
        if let Some(task) = admin_task {
            match task.await {
                Ok(result) => result?,
                Err(e) => tracing::warn!(error = %e, "admin task failed"),
            }
        }
        tracing::info!("server stopped");
        Ok(())
    }
}
