//! Room actor: an isolated Tokio task that owns one room's state.
//!
//! Membership changes arrive from the manager; game frames arrive straight
//! from member connections through a cloned [`RoomHandle`]. Both share one
//! FIFO queue, so a member's join is always processed before its frames.

use std::collections::BTreeMap;
use std::sync::Arc;

use hnp_protocol::{CompiledProtocol, ConnectionId, MessageInstance, Recipient, RoomId};
use tokio::sync::{mpsc, oneshot};
use tokio::sync::mpsc::error::TrySendError;

use crate::logic::{Outbound, RoomContext, RoomLogic};
use crate::manager::ManagerEvent;
use crate::RoomError;

/// Something the room wants a member's connection to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomOutbound {
    /// An encoded frame, shared between all recipients.
    Frame(Arc<[u8]>),
    /// The room is going away; send `CLOSING` and hang up.
    Closed { reason: String },
}

/// Creates the queue pair between a room and one member's writer.
///
/// Frames travel on a bounded queue the room fills with `try_send`. The
/// close notice has its own slot, so it is never lost to a full queue and
/// never waits behind queued frames.
pub fn member_channel(buffer: usize) -> (MemberSender, MemberReceiver) {
    let (frames_tx, frames_rx) = mpsc::channel(buffer.max(1));
    let (close_tx, close_rx) = oneshot::channel();
    (
        MemberSender {
            frames: frames_tx,
            close: close_tx,
        },
        MemberReceiver {
            frames: frames_rx,
            close: Some(close_rx),
        },
    )
}

/// Room side of a member's outbound queue.
#[derive(Debug)]
pub struct MemberSender {
    frames: mpsc::Sender<Arc<[u8]>>,
    close: oneshot::Sender<String>,
}

/// Writer side of a member's outbound queue.
#[derive(Debug)]
pub struct MemberReceiver {
    frames: mpsc::Receiver<Arc<[u8]>>,
    close: Option<oneshot::Receiver<String>>,
}

impl MemberReceiver {
    /// Waits for the next item. A close notice wins over queued frames,
    /// which are abandoned. Returns `None` once the room dropped the member.
    pub async fn recv(&mut self) -> Option<RoomOutbound> {
        loop {
            let Some(close) = self.close.as_mut() else {
                return self.frames.recv().await.map(RoomOutbound::Frame);
            };
            tokio::select! {
                biased;
                reason = close => {
                    self.close = None;
                    if let Ok(reason) = reason {
                        return Some(RoomOutbound::Closed { reason });
                    }
                }
                frame = self.frames.recv() => return frame.map(RoomOutbound::Frame),
            }
        }
    }

    /// Non-blocking [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<RoomOutbound> {
        if let Some(close) = self.close.as_mut() {
            match close.try_recv() {
                Ok(reason) => {
                    self.close = None;
                    return Some(RoomOutbound::Closed { reason });
                }
                Err(oneshot::error::TryRecvError::Closed) => self.close = None,
                Err(oneshot::error::TryRecvError::Empty) => {}
            }
        }
        self.frames.try_recv().ok().map(RoomOutbound::Frame)
    }
}

pub(crate) enum RoomCommand {
    Join {
        conn: ConnectionId,
        sender: MemberSender,
    },
    Leave {
        conn: ConnectionId,
    },
    Frame {
        sender: ConnectionId,
        frame: Vec<u8>,
    },
    Close {
        reason: String,
    },
}

/// Handle to a running room actor. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Queues a raw frame from `sender` for decoding and dispatch.
    pub async fn send_frame(&self, sender: ConnectionId, frame: Vec<u8>) -> Result<(), RoomError> {
        self.send(RoomCommand::Frame { sender, frame }).await
    }

    /// Queues a join. Hands the member's queue back if the actor is gone.
    pub(crate) async fn join(&self, conn: ConnectionId, sender: MemberSender) -> Result<(), MemberSender> {
        match self.sender.reserve().await {
            Ok(permit) => {
                permit.send(RoomCommand::Join { conn, sender });
                Ok(())
            }
            Err(_) => Err(sender),
        }
    }

    pub(crate) async fn leave(&self, conn: ConnectionId) -> Result<(), RoomError> {
        self.send(RoomCommand::Leave { conn }).await
    }

    pub(crate) async fn close(&self, reason: impl Into<String>) -> Result<(), RoomError> {
        self.send(RoomCommand::Close {
            reason: reason.into(),
        })
        .await
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// A handle whose actor never existed, for registry tests.
    #[cfg(test)]
    pub(crate) fn detached(room_id: RoomId) -> Self {
        let (sender, _) = mpsc::channel(1);
        Self { room_id, sender }
    }
}

/// Tells the manager the actor is gone, however it stopped.
struct ExitNotice {
    room_id: RoomId,
    events: mpsc::UnboundedSender<ManagerEvent>,
}

impl Drop for ExitNotice {
    fn drop(&mut self) {
        let _ = self.events.send(ManagerEvent::RoomExited(self.room_id));
    }
}

struct RoomActor<L: RoomLogic> {
    room_id: RoomId,
    protocol: Arc<CompiledProtocol>,
    state: L::State,
    members: BTreeMap<ConnectionId, MemberSender>,
    receiver: mpsc::Receiver<RoomCommand>,
    _exit: ExitNotice,
}

impl<L: RoomLogic> RoomActor<L> {
    async fn run(mut self) {
        tracing::info!(room_id = %self.room_id, "room actor started");

        while let Some(cmd) = self.receiver.recv().await {
            let result = match cmd {
                RoomCommand::Join { conn, sender } => self.handle_join(conn, sender),
                RoomCommand::Leave { conn } => self.handle_leave(conn),
                RoomCommand::Frame { sender, frame } => self.handle_frame(sender, &frame),
                RoomCommand::Close { reason } => {
                    self.close(&reason);
                    break;
                }
            };

            if let Err(fault) = result {
                tracing::error!(room_id = %self.room_id, %fault, "closing room after logic fault");
                self.close("room closed after an internal error");
                break;
            }
        }

        tracing::info!(room_id = %self.room_id, "room actor stopped");
    }

    fn handle_join(&mut self, conn: ConnectionId, sender: MemberSender) -> Result<(), crate::RoomFault> {
        self.members.insert(conn, sender);
        tracing::info!(
            room_id = %self.room_id,
            %conn,
            members = self.members.len(),
            "member joined"
        );
        let out = self.with_ctx(|state, ctx| L::on_join(state, ctx, conn))?;
        self.dispatch(out);
        Ok(())
    }

    fn handle_leave(&mut self, conn: ConnectionId) -> Result<(), crate::RoomFault> {
        if self.members.remove(&conn).is_none() {
            return Ok(());
        }
        tracing::info!(
            room_id = %self.room_id,
            %conn,
            members = self.members.len(),
            "member left"
        );
        let out = self.with_ctx(|state, ctx| L::on_leave(state, ctx, conn))?;
        self.dispatch(out);
        Ok(())
    }

    fn handle_frame(&mut self, sender: ConnectionId, frame: &[u8]) -> Result<(), crate::RoomFault> {
        if !self.members.contains_key(&sender) {
            tracing::warn!(room_id = %self.room_id, %sender, "frame from non-member, ignoring");
            return Ok(());
        }

        let msg = match self.protocol.decode(frame) {
            Ok(msg) => msg,
            Err(error) => {
                tracing::warn!(room_id = %self.room_id, %sender, %error, "dropping undecodable frame");
                return Ok(());
            }
        };

        if let Some(binding) = self.protocol.binding(msg.tag) {
            if !binding.direction().client_sends() {
                tracing::warn!(
                    room_id = %self.room_id,
                    %sender,
                    message = binding.name(),
                    "dropping server-to-client message sent by a client"
                );
                return Ok(());
            }
        }

        let out = self.with_ctx(|state, ctx| L::handle_message(state, ctx, sender, msg))?;
        self.dispatch(out);
        Ok(())
    }

    fn with_ctx<T>(
        &mut self,
        f: impl FnOnce(&mut L::State, &RoomContext<'_>) -> T,
    ) -> T {
        let members: Vec<_> = self.members.keys().copied().collect();
        let ctx = RoomContext {
            room_id: self.room_id,
            protocol: &self.protocol,
            members: &members,
        };
        f(&mut self.state, &ctx)
    }

    /// Encodes and delivers logic output. Never blocks the room.
    fn dispatch(&self, out: Outbound) {
        for (recipient, msg) in out {
            let Some(frame) = self.encode_outbound(&msg) else {
                continue;
            };
            for (conn, sender) in &self.members {
                if recipient.includes(*conn) {
                    self.deliver(*conn, sender, frame.clone());
                }
            }
            if let Recipient::Connection(target) = recipient {
                if !self.members.contains_key(&target) {
                    tracing::debug!(room_id = %self.room_id, %target, "recipient not in room");
                }
            }
        }
    }

    fn encode_outbound(&self, msg: &MessageInstance) -> Option<Arc<[u8]>> {
        let Some(binding) = self.protocol.binding(msg.tag) else {
            tracing::warn!(room_id = %self.room_id, tag = msg.tag, "logic produced unknown message tag");
            return None;
        };
        if !binding.direction().server_sends() {
            tracing::warn!(
                room_id = %self.room_id,
                message = binding.name(),
                "dropping client-to-server message produced by room logic"
            );
            return None;
        }
        match binding.encode(msg) {
            Ok(bytes) => Some(bytes.into()),
            Err(error) => {
                tracing::warn!(room_id = %self.room_id, message = binding.name(), %error, "failed to encode outbound message");
                None
            }
        }
    }

    fn deliver(&self, conn: ConnectionId, member: &MemberSender, frame: Arc<[u8]>) {
        match member.frames.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(room_id = %self.room_id, %conn, "outbound queue full, dropping frame");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(room_id = %self.room_id, %conn, "member writer gone");
            }
        }
    }

    /// Notifies every member and drops their queues, abandoning frames
    /// still waiting in them.
    fn close(&mut self, reason: &str) {
        tracing::info!(
            room_id = %self.room_id,
            members = self.members.len(),
            reason,
            "closing room"
        );
        for (conn, member) in std::mem::take(&mut self.members) {
            if member.close.send(reason.to_string()).is_err() {
                tracing::debug!(room_id = %self.room_id, %conn, "member writer gone");
            }
        }
        self.receiver.close();
    }
}

/// Spawns a room actor and returns a handle to it.
pub(crate) fn spawn_room<L: RoomLogic>(
    room_id: RoomId,
    protocol: Arc<CompiledProtocol>,
    channel_size: usize,
    events: mpsc::UnboundedSender<ManagerEvent>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size.max(1));

    let actor = RoomActor::<L> {
        room_id,
        protocol,
        state: L::init(room_id),
        members: BTreeMap::new(),
        receiver: rx,
        _exit: ExitNotice { room_id, events },
    };
    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        sender: tx,
    }
}
