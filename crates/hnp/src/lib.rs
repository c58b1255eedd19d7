//! # HOP 'N POP 16
//!
//! Realtime multiplayer backend for PICO-8 web games.
//!
//! A single protocol file describes every message exchanged through the
//! PICO-8 GPIO window. The same validated schema drives both sides:
//! [`hnp_codegen`] turns it into JavaScript bindings for the web player, and
//! the server compiles it into [`CompiledProtocol`](hnp_protocol::CompiledProtocol)
//! bindings that decode client frames for the room actors.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hnp::prelude::*;
//!
//! # async fn start() -> Result<(), HnpError> {
//! let schema = hnp::load_protocol("protocol.toml")?;
//! let server = HnpServerBuilder::new()
//!     .config(ServerConfig::default())
//!     .build(&schema)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

use std::path::Path;

pub use config::{ConfigError, ServerConfig, CONFIG_FILE_NAME};
pub use error::HnpError;
pub use server::{HnpServer, HnpServerBuilder, ServerHandle};

use hnp_schema::{validate_all, ProtocolSchema, SchemaError, ValidatedSchema};

/// Loads a protocol file and validates it, reporting every problem found.
pub fn load_protocol(path: impl AsRef<Path>) -> Result<ValidatedSchema, HnpError> {
    let schema = ProtocolSchema::load(path)?;
    let validated = validate_all(&schema).map_err(SchemaError::Invalid)?;
    tracing::debug!(
        messages = validated.messages().len(),
        fingerprint = validated.fingerprint(),
        "protocol loaded"
    );
    Ok(validated)
}

pub mod prelude {
    pub use crate::{load_protocol, HnpError, HnpServer, HnpServerBuilder, ServerConfig, ServerHandle};
    pub use hnp_protocol::{ConnectionId, MessageInstance, Recipient, RoomId, Value};
    pub use hnp_room::{Outbound, RelayLogic, RoomContext, RoomFault, RoomLogic};
    pub use hnp_schema::{Direction, FieldDef, MessageDef, ProtocolSchema, ValidatedSchema};
}
