//! Unified error type for HOP 'N POP 16.

use hnp_admin::AdminError;
use hnp_codegen::GenerationError;
use hnp_protocol::ProtocolError;
use hnp_room::{AdmissionError, RoomError};
use hnp_schema::SchemaError;
use hnp_transport::TransportError;

use crate::ConfigError;

/// Top-level error wrapping every crate-specific error.
///
/// The `#[from]` attributes let `?` convert sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum HnpError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Admin(#[from] AdminError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
