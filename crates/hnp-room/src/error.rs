//! Error types for the room layer.

use hnp_protocol::{RejectCode, RoomId};

/// Why a connection could not be placed in a room.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    /// Every room is full and no new room may be created.
    #[error("server is full")]
    ServerFull,

    /// The requested room is at capacity.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The server is shutting down and admits nobody.
    #[error("server is shutting down")]
    ShuttingDown,

    /// The room manager is gone.
    #[error("room manager is unavailable")]
    Unavailable,
}

impl AdmissionError {
    /// The code sent to the client in a `REJECTED` frame.
    pub fn reject_code(&self) -> RejectCode {
        match self {
            Self::ServerFull => RejectCode::ServerFull,
            Self::RoomFull(_) => RejectCode::RoomFull,
            Self::ShuttingDown | Self::Unavailable => RejectCode::ShuttingDown,
        }
    }
}

/// Errors from room operations other than admission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// No room with this id was ever created.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The room actor has stopped.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),

    /// The room manager is gone.
    #[error("room manager is unavailable")]
    ManagerUnavailable,

    /// A room limit is zero.
    #[error("room limit {0} must be positive")]
    InvalidLimits(&'static str),
}
