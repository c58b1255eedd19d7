//! Protocol schema model and validator for HOP 'N POP 16.
//!
//! A protocol is a flat list of messages exchanged between the PICO-8 web
//! player and the game server. This crate owns the three build-time steps
//! that happen before any byte is encoded:
//!
//! - **Model** ([`ProtocolSchema`], [`MessageDef`], [`FieldDef`]): the
//!   definition as written in the protocol file.
//! - **Loader** ([`ProtocolSchema::load`]): parses the TOML protocol file.
//! - **Validator** ([`validate`], [`validate_all`]): turns a model into an
//!   immutable [`ValidatedSchema`] with resolved [`FieldType`]s.
//!
//! ```text
//! protocol.toml → ProtocolSchema → validate() → ValidatedSchema
//!                                                  ├→ hnp-protocol (server bindings)
//!                                                  └→ hnp-codegen  (client assets)
//! ```

mod error;
mod hash;
mod ident;
mod model;
mod types;
mod validate;

pub use error::{SchemaError, ValidationError, ValidationReason};
pub use hash::schema_hash;
pub use ident::{is_identifier, pascal_case};
pub use model::{Direction, FieldDef, MessageDef, ProtocolSchema};
pub use types::{FieldType, Primitive};
pub use validate::{
    validate, validate_all, ValidatedField, ValidatedMessage, ValidatedSchema,
};

/// Size of the PICO-8 GPIO window in bytes. A whole frame (tag + fields)
/// must fit in it.
pub const GPIO_SIZE: usize = 128;

/// Highest number of messages a schema may declare. Tags `0xF0..=0xFF`
/// are reserved for system frames.
pub const MAX_MESSAGES: usize = 0xF0;

/// Longest allowed fixed-size array.
pub const MAX_ARRAY_LEN: usize = 127;

/// String capacity used when a string field omits `max_len`.
pub const DEFAULT_STRING_MAX_LEN: u8 = 32;
