//! Wire protocol for HOP 'N POP 16.
//!
//! This crate turns a [`ValidatedSchema`](hnp_schema::ValidatedSchema) into
//! runtime bindings and defines the reserved system frames:
//!
//! - **Bindings** ([`CompiledProtocol`], [`CompiledBinding`]): per-message
//!   encode/decode over the little-endian frame format.
//! - **Values** ([`Value`], [`MessageInstance`]): decoded game messages.
//! - **System frames** ([`SystemFrame`]): join handshake and close notice,
//!   tagged `0xF0..=0xFF` so they never collide with schema messages.
//! - **Errors** ([`EncodeError`], [`DecodeError`], [`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (MessageInstance) → Room (logic)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod binding;
mod error;
mod reader;
mod system;
mod types;
mod value;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use binding::{CompiledBinding, CompiledProtocol};
pub use error::{DecodeError, EncodeError, ProtocolError};
pub use system::{is_system_frame, RejectCode, SystemFrame, SYSTEM_TAG_MIN};
pub use types::{Recipient, RoomId};
pub use value::{MessageInstance, Value};

pub use hnp_transport::ConnectionId;
