//! The `RoomLogic` trait: the extension point for game rules.
//!
//! The room actor decodes frames, checks direction and membership, and
//! hands well-formed client messages to the logic. Whatever the logic
//! returns is encoded and delivered according to its [`Recipient`].

use hnp_protocol::{CompiledProtocol, ConnectionId, MessageInstance, Recipient, RoomId};

/// Messages produced by the logic, each with its audience.
pub type Outbound = Vec<(Recipient, MessageInstance)>;

/// An unrecoverable error in room logic.
///
/// Returning a fault closes the room it happened in; every other room
/// keeps running.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("room logic fault: {0}")]
pub struct RoomFault(pub String);

/// Read-only view of the room passed to every logic call.
pub struct RoomContext<'a> {
    pub room_id: RoomId,
    pub protocol: &'a CompiledProtocol,
    /// Current members, in ascending id order.
    pub members: &'a [ConnectionId],
}

/// Server-side game rules for one room.
///
/// Each room owns one `State`, created by [`init`](RoomLogic::init) and
/// only ever touched from the room's own task.
pub trait RoomLogic: Send + Sync + 'static {
    /// Authoritative per-room state.
    type State: Send + 'static;

    /// Creates the state of a fresh room.
    fn init(room_id: RoomId) -> Self::State;

    /// Processes one decoded client message.
    fn handle_message(
        state: &mut Self::State,
        ctx: &RoomContext<'_>,
        sender: ConnectionId,
        msg: MessageInstance,
    ) -> Result<Outbound, RoomFault>;

    /// Called after a connection joined. Default: nothing to send.
    fn on_join(
        _state: &mut Self::State,
        _ctx: &RoomContext<'_>,
        _conn: ConnectionId,
    ) -> Result<Outbound, RoomFault> {
        Ok(Vec::new())
    }

    /// Called after a connection left. Default: nothing to send.
    fn on_leave(
        _state: &mut Self::State,
        _ctx: &RoomContext<'_>,
        _conn: ConnectionId,
    ) -> Result<Outbound, RoomFault> {
        Ok(Vec::new())
    }
}

/// Stateless relay: heartbeats are echoed to the sender, messages the
/// server may send are forwarded to every other member, and
/// client-to-server messages are consumed.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelayLogic;

impl RoomLogic for RelayLogic {
    type State = ();

    fn init(_room_id: RoomId) -> Self::State {}

    fn handle_message(
        _state: &mut Self::State,
        ctx: &RoomContext<'_>,
        sender: ConnectionId,
        msg: MessageInstance,
    ) -> Result<Outbound, RoomFault> {
        let Some(binding) = ctx.protocol.binding(msg.tag) else {
            return Ok(Vec::new());
        };
        if binding.definition().heartbeat {
            return Ok(vec![(Recipient::Connection(sender), msg)]);
        }
        if binding.direction().server_sends() {
            return Ok(vec![(Recipient::AllExcept(sender), msg)]);
        }
        Ok(Vec::new())
    }
}
