//! Admin actions and their execution against the room manager.

use hnp_protocol::RoomId;
use hnp_room::{RoomManager, RoomSnapshot};
use serde::{Deserialize, Serialize};

use crate::AdminError;

/// Reason members see in `CLOSING` when an admin shuts their room down.
pub const ROOM_SHUTDOWN_REASON: &str = "room closed by admin";

/// Reason members see in `CLOSING` when an admin shuts the server down.
pub const SERVER_SHUTDOWN_REASON: &str = "server shutting down";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    ListRooms,
    Shutdown,
    ShutdownRoom(RoomId),
}

impl AdminAction {
    /// Parses the CLI form: an action name plus an optional room id.
    pub fn parse(action: &str, room: Option<u32>) -> Result<Self, AdminError> {
        match action {
            "list-rooms" => Ok(Self::ListRooms),
            "shutdown" => Ok(Self::Shutdown),
            "shutdown-room" => room
                .map(|id| Self::ShutdownRoom(RoomId(id)))
                .ok_or(AdminError::MissingRoom("shutdown-room")),
            other => Err(AdminError::UnknownAction(other.to_string())),
        }
    }
}

/// JSON body of every successful admin response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AdminResponse {
    Rooms { rooms: Vec<RoomSnapshot> },
    ShutDown { room: Option<RoomId> },
}

/// Runs an already authenticated action.
pub async fn execute(manager: &RoomManager, action: AdminAction) -> Result<AdminResponse, AdminError> {
    match action {
        AdminAction::ListRooms => {
            let rooms = manager.list_rooms().await?;
            Ok(AdminResponse::Rooms { rooms })
        }
        AdminAction::Shutdown => {
            manager.shutdown(SERVER_SHUTDOWN_REASON).await?;
            Ok(AdminResponse::ShutDown { room: None })
        }
        AdminAction::ShutdownRoom(room) => {
            manager.shutdown_room(room, ROOM_SHUTDOWN_REASON).await?;
            Ok(AdminResponse::ShutDown { room: Some(room) })
        }
    }
}
