//! HTTP surface of the admin control plane.

use std::future::Future;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use hnp_protocol::RoomId;
use hnp_room::RoomManager;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::action::{execute, AdminAction, AdminResponse};
use crate::{AdminAuth, AdminError};

/// Shared state of the admin routes.
#[derive(Clone)]
pub struct AdminState {
    manager: RoomManager,
    auth: Arc<AdminAuth>,
    stop: Option<watch::Sender<bool>>,
}

impl AdminState {
    pub fn new(manager: RoomManager, auth: AdminAuth) -> Self {
        Self {
            manager,
            auth: Arc::new(auth),
            stop: None,
        }
    }

    /// Also flips `stop` to `true` once a server shutdown went through, so
    /// the accept loop can wind down.
    pub fn with_stop_signal(mut self, stop: watch::Sender<bool>) -> Self {
        self.stop = Some(stop);
        self
    }

    async fn run(&self, headers: &HeaderMap, action: AdminAction) -> Result<Json<AdminResponse>, AdminError> {
        if let Err(err) = self.auth.check(headers) {
            tracing::warn!(?action, "rejected unauthenticated admin request");
            return Err(err.into());
        }
        tracing::info!(?action, "admin action");

        let response = execute(&self.manager, action).await?;
        if action == AdminAction::Shutdown {
            if let Some(stop) = &self.stop {
                stop.send_replace(true);
            }
        }
        Ok(Json(response))
    }
}

/// Builds the admin router:
///
/// - `GET /admin/rooms`
/// - `POST /admin/shutdown`
/// - `POST /admin/rooms/:id/shutdown`
pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/rooms", get(list_rooms))
        .route("/admin/shutdown", post(shutdown))
        .route("/admin/rooms/:id/shutdown", post(shutdown_room))
        .with_state(state)
}

async fn list_rooms(
    State(state): State<AdminState>,
    headers: HeaderMap,
) -> Result<Json<AdminResponse>, AdminError> {
    state.run(&headers, AdminAction::ListRooms).await
}

async fn shutdown(
    State(state): State<AdminState>,
    headers: HeaderMap,
) -> Result<Json<AdminResponse>, AdminError> {
    state.run(&headers, AdminAction::Shutdown).await
}

async fn shutdown_room(
    State(state): State<AdminState>,
    Path(id): Path<u32>,
    headers: HeaderMap,
) -> Result<Json<AdminResponse>, AdminError> {
    state.run(&headers, AdminAction::ShutdownRoom(RoomId(id))).await
}

/// Serves the admin routes on `listener` until `signal` resolves.
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), AdminError> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "admin server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(signal)
        .await?;
    tracing::info!("admin server stopped");
    Ok(())
}
