//! Error types for the protocol layer.

use hnp_schema::FieldType;

/// A frame could not be decoded.
///
/// Every variant carries the byte `offset` where decoding stopped so a
/// malformed frame can be located in a hex dump.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The frame ended before the value at `offset` was complete.
    #[error("truncated frame at byte {offset}: expected {expected} more byte(s), got {got}")]
    Truncated {
        offset: usize,
        expected: usize,
        got: usize,
    },

    /// The frame continues past the last field.
    #[error("trailing bytes at byte {offset}: expected a {expected}-byte frame, got {got}")]
    TrailingBytes {
        offset: usize,
        expected: usize,
        got: usize,
    },

    /// No message is bound to the leading tag.
    #[error("unknown message tag {tag:#04x}")]
    UnknownTag { offset: usize, tag: u8 },

    /// The frame was handed to the binding of a different message.
    #[error("tag mismatch: expected {expected:#04x}, got {got:#04x}")]
    TagMismatch { offset: usize, expected: u8, got: u8 },

    /// A boolean byte other than 0 or 1.
    #[error("invalid bool {got:#04x} at byte {offset}")]
    InvalidBool { offset: usize, got: u8 },

    /// A presence byte other than 0 or 1.
    #[error("invalid presence byte {got:#04x} at byte {offset}")]
    InvalidPresence { offset: usize, got: u8 },

    /// A string length prefix larger than the field allows.
    #[error("string at byte {offset} is {got} bytes, limit is {expected}")]
    StringTooLong {
        offset: usize,
        expected: usize,
        got: usize,
    },

    /// String bytes that are not UTF-8.
    #[error("invalid UTF-8 in string at byte {offset}")]
    InvalidUtf8 { offset: usize },

    /// A `REJECTED` frame with a code this build does not know.
    #[error("unknown reject code {got} at byte {offset}")]
    UnknownRejectCode { offset: usize, got: u8 },
}

impl DecodeError {
    /// Byte offset at which decoding failed.
    pub fn offset(&self) -> usize {
        match self {
            Self::Truncated { offset, .. }
            | Self::TrailingBytes { offset, .. }
            | Self::UnknownTag { offset, .. }
            | Self::TagMismatch { offset, .. }
            | Self::InvalidBool { offset, .. }
            | Self::InvalidPresence { offset, .. }
            | Self::StringTooLong { offset, .. }
            | Self::InvalidUtf8 { offset }
            | Self::UnknownRejectCode { offset, .. } => *offset,
        }
    }
}

/// A [`MessageInstance`](crate::MessageInstance) does not fit its definition.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodeError {
    #[error("no message is bound to tag {0:#04x}")]
    UnknownTag(u8),

    #[error("instance tag {got:#04x} does not match binding tag {expected:#04x}")]
    TagMismatch { expected: u8, got: u8 },

    #[error("expected {expected} field(s), got {got}")]
    FieldCount { expected: usize, got: usize },

    #[error("message has no field named `{0}`")]
    UnknownField(String),

    #[error("required field `{0}` is missing")]
    MissingField(String),

    #[error("field `{field}` expects {expected}")]
    TypeMismatch { field: String, expected: FieldType },

    #[error("value {value} is out of range for field `{field}`")]
    OutOfRange { field: String, value: i64 },

    #[error("field `{field}` expects {expected} element(s), got {got}")]
    ArrayLength {
        field: String,
        expected: usize,
        got: usize,
    },

    #[error("string for field `{field}` is {got} bytes, limit is {max}")]
    StringTooLong { field: String, max: usize, got: usize },
}

/// Umbrella error for the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("encode failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// A well-formed frame that breaks the session rules, such as a game
    /// message before the join handshake.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
