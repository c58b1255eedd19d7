//! Room limits and lifecycle state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::RoomError;

// ---------------------------------------------------------------------------
// RoomLimits
// ---------------------------------------------------------------------------

/// Capacity and timing limits shared by every room of a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomLimits {
    /// Maximum number of rooms alive at once.
    pub max_rooms: usize,

    /// Maximum members per room.
    pub max_conn_per_room: usize,

    /// How long an empty room is kept before it is torn down.
    pub grace_period: Duration,

    /// Command queue length of each room actor and of the manager.
    pub command_buffer: usize,
}

impl Default for RoomLimits {
    fn default() -> Self {
        Self {
            max_rooms: 8,
            max_conn_per_room: 16,
            grace_period: Duration::from_secs(30),
            command_buffer: 64,
        }
    }
}

impl RoomLimits {
    /// Rejects zero room counts, capacities and queue lengths.
    pub fn validate(&self) -> Result<(), RoomError> {
        let limits = [
            ("max_rooms", self.max_rooms),
            ("max_conn_per_room", self.max_conn_per_room),
            ("command_buffer", self.command_buffer),
        ];
        match limits.iter().find(|(_, v)| *v == 0) {
            Some((name, _)) => Err(RoomError::InvalidLimits(*name)),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomState
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// ```text
/// Open ⇄ Full
/// Open → Closing (last member left) → Open (rejoined within grace)
/// Closing → Closed (grace elapsed)
/// any → Closed (shutdown or logic fault)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomState {
    Open,
    Full,
    Closing,
    Closed,
}

impl RoomState {
    /// Returns `true` if the room may take another member, capacity
    /// permitting.
    pub fn accepts_members(self) -> bool {
        matches!(self, Self::Open | Self::Closing)
    }

    /// State implied by a member count.
    pub(crate) fn for_members(members: usize, capacity: usize) -> Self {
        match members {
            0 => Self::Closing,
            n if n >= capacity => Self::Full,
            _ => Self::Open,
        }
    }
}

impl std::fmt::Display for RoomState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Full => write!(f, "full"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
        }
    }
}
