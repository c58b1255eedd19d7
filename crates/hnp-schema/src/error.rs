//! Error types for loading and validating protocol schemas.

use crate::Direction;

/// Errors raised while reading a protocol file.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The file could not be read.
    #[error("failed to read protocol file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid protocol syntax. The parser's message is
    /// kept verbatim so it can be shown to the user as-is.
    #[error("failed to parse protocol file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The schema could not be rendered back to text.
    #[error("failed to render protocol file: {0}")]
    Render(#[from] toml::ser::Error),

    /// The file parsed but describes an invalid protocol.
    #[error("protocol has {} validation error(s)", .0.len())]
    Invalid(Vec<ValidationError>),
}

/// A single problem found by the validator.
///
/// `message_index` and `field_index` point into the schema as written, so a
/// caller can report the exact location. Schema-wide problems carry no
/// message index.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}: {reason}", location(.message_index, .field_index))]
pub struct ValidationError {
    pub message_index: Option<usize>,
    pub field_index: Option<usize>,
    pub reason: ValidationReason,
}

impl ValidationError {
    pub(crate) fn schema(reason: ValidationReason) -> Self {
        Self {
            message_index: None,
            field_index: None,
            reason,
        }
    }

    pub(crate) fn message(index: usize, reason: ValidationReason) -> Self {
        Self {
            message_index: Some(index),
            field_index: None,
            reason,
        }
    }

    pub(crate) fn field(message: usize, field: usize, reason: ValidationReason) -> Self {
        Self {
            message_index: Some(message),
            field_index: Some(field),
            reason,
        }
    }
}

fn location(message: &Option<usize>, field: &Option<usize>) -> String {
    match (message, field) {
        (Some(m), Some(f)) => format!("message #{m}, field #{f}"),
        (Some(m), None) => format!("message #{m}"),
        _ => "schema".to_string(),
    }
}

/// Why a schema was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationReason {
    #[error("schema declares no messages")]
    NoMessages,

    #[error("schema declares {count} messages, at most {max} are allowed")]
    TooManyMessages { count: usize, max: usize },

    #[error("duplicate message name `{0}`")]
    DuplicateMessage(String),

    #[error("duplicate field name `{0}`")]
    DuplicateField(String),

    #[error("`{0}` is not a valid identifier")]
    InvalidIdentifier(String),

    /// Two message names map to the same generated entry point
    /// (e.g. `player_move` and `playerMove` both become `PlayerMove`).
    #[error("generated name `{ident}` collides with message `{other}`")]
    GeneratedNameCollision { ident: String, other: String },

    #[error("unknown type `{0}`")]
    UnknownType(String),

    #[error("arrays of `{0}` are not supported")]
    UnsupportedArrayElement(String),

    #[error("invalid array length `{0}`")]
    InvalidArrayLength(String),

    #[error("`max_len` is only allowed on strings, not `{0}`")]
    MaxLenNotAllowed(String),

    #[error("string `max_len` must be between 1 and 255, got {0}")]
    InvalidMaxLen(u16),

    #[error("message has no fields and is not marked as heartbeat")]
    EmptyMessage,

    #[error("heartbeat message must not declare fields")]
    HeartbeatWithFields,

    #[error("heartbeat message must be bidirectional, not {0}")]
    HeartbeatDirection(Direction),

    /// The worst-case frame does not fit the GPIO window.
    #[error("worst-case frame is {size} bytes, limit is {limit}")]
    FrameTooLarge { size: usize, limit: usize },
}
