//! Admin control plane for HOP 'N POP 16.
//!
//! Every request carries a shared secret in a configurable header. The
//! secret is checked in constant time before any action runs; a missing
//! header or a wrong value yields `401 unauthorized` and touches nothing.
//!
//! - [`router`] / [`serve`]: the axum HTTP surface
//! - [`AdminClient`]: reqwest client used by the CLI
//! - [`execute`]: runs an [`AdminAction`] against a [`RoomManager`](hnp_room::RoomManager)

mod action;
mod auth;
mod client;
mod error;
mod server;

pub use action::{
    execute, AdminAction, AdminResponse, ROOM_SHUTDOWN_REASON, SERVER_SHUTDOWN_REASON,
};
pub use auth::{AdminAuth, DEFAULT_ADMIN_HEADER, DEFAULT_ADMIN_SECRET};
pub use client::AdminClient;
pub use error::{AdminError, AuthError};
pub use server::{router, serve, AdminState};
