//! Identity and addressing types shared by the room and admin layers.

use serde::{Deserialize, Serialize};
use std::fmt;

use hnp_transport::ConnectionId;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a room.
///
/// Room ids are assigned by the room manager, start at 1 and are never
/// reused while the server runs. On the wire `0` means "any room".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u32);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Recipient: who should receive a message?
// ---------------------------------------------------------------------------

/// Specifies which members of a room receive an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every member of the room.
    All,

    /// One specific connection.
    Connection(ConnectionId),

    /// Every member except the given connection. Typically the sender.
    AllExcept(ConnectionId),
}

impl Recipient {
    /// Returns true when `conn` is addressed by this recipient.
    pub fn includes(&self, conn: ConnectionId) -> bool {
        match self {
            Self::All => true,
            Self::Connection(id) => *id == conn,
            Self::AllExcept(id) => *id != conn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_display() {
        assert_eq!(RoomId(3).to_string(), "R-3");
    }

    #[test]
    fn test_room_id_serializes_transparently() {
        let json = serde_json::to_string(&RoomId(12)).unwrap();
        assert_eq!(json, "12");
    }

    #[test]
    fn test_recipient_includes() {
        let a = ConnectionId::new(1);
        let b = ConnectionId::new(2);

        assert!(Recipient::All.includes(a));
        assert!(Recipient::Connection(a).includes(a));
        assert!(!Recipient::Connection(a).includes(b));
        assert!(!Recipient::AllExcept(a).includes(a));
        assert!(Recipient::AllExcept(a).includes(b));
    }
}
