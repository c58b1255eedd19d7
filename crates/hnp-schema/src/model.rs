//! The protocol definition as written on disk.
//!
//! These types are deliberately loose: type names are plain strings and
//! nothing is checked. [`crate::validate`] is the only way to get a schema
//! that the binding generators accept.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::SchemaError;

/// Which side of the connection may send a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Sent by the web player, handled by the room.
    ClientToServer,
    /// Sent by the room, handled by the web player.
    ServerToClient,
    /// Either side may send it.
    Bidirectional,
}

impl Direction {
    /// Returns `true` if a client is allowed to send this message.
    pub fn client_sends(self) -> bool {
        matches!(self, Self::ClientToServer | Self::Bidirectional)
    }

    /// Returns `true` if the server is allowed to send this message.
    pub fn server_sends(self) -> bool {
        matches!(self, Self::ServerToClient | Self::Bidirectional)
    }

    pub(crate) fn code(self) -> u8 {
        match self {
            Self::ClientToServer => 0,
            Self::ServerToClient => 1,
            Self::Bidirectional => 2,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientToServer => write!(f, "client_to_server"),
            Self::ServerToClient => write!(f, "server_to_client"),
            Self::Bidirectional => write!(f, "bidirectional"),
        }
    }
}

/// One field of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,

    /// Type name, e.g. `uint8`, `string` or `int16[4]`.
    #[serde(rename = "type")]
    pub type_name: String,

    /// Optional fields carry a presence byte on the wire.
    #[serde(default)]
    pub optional: bool,

    /// Capacity of a string field in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_len: Option<u16>,
}

impl FieldDef {
    /// Creates a required field.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            optional: false,
            max_len: None,
        }
    }

    /// Marks the field optional.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Sets the string capacity.
    #[must_use]
    pub fn max_len(mut self, max_len: u16) -> Self {
        self.max_len = Some(max_len);
        self
    }
}

/// One message type of the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDef {
    pub name: String,
    pub direction: Direction,

    /// Explicitly empty keep-alive message.
    #[serde(default)]
    pub heartbeat: bool,

    #[serde(rename = "field", default)]
    pub fields: Vec<FieldDef>,
}

impl MessageDef {
    /// Creates a message with no fields.
    pub fn new(name: impl Into<String>, direction: Direction) -> Self {
        Self {
            name: name.into(),
            direction,
            heartbeat: false,
            fields: Vec::new(),
        }
    }

    /// Creates an empty heartbeat message.
    pub fn heartbeat(name: impl Into<String>) -> Self {
        Self {
            heartbeat: true,
            ..Self::new(name, Direction::Bidirectional)
        }
    }

    /// Appends a field.
    #[must_use]
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }
}

/// An ordered list of message definitions. The position of a message is
/// its wire tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolSchema {
    #[serde(rename = "message", default)]
    pub messages: Vec<MessageDef>,
}

impl ProtocolSchema {
    /// Creates a schema from message definitions.
    pub fn new(messages: Vec<MessageDef>) -> Self {
        Self { messages }
    }

    /// Appends a message.
    #[must_use]
    pub fn message(mut self, message: MessageDef) -> Self {
        self.messages.push(message);
        self
    }

    /// Parses a protocol file body.
    pub fn from_toml_str(source: &str) -> Result<Self, SchemaError> {
        Ok(toml::from_str(source)?)
    }

    /// Renders the schema back into protocol file syntax.
    pub fn to_toml_string(&self) -> Result<String, SchemaError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reads and parses a protocol file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let source =
            std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
                path: path.display().to_string(),
                source,
            })?;
        let schema = Self::from_toml_str(&source)?;
        tracing::debug!(
            path = %path.display(),
            messages = schema.messages.len(),
            "protocol file loaded"
        );
        Ok(schema)
    }
}
