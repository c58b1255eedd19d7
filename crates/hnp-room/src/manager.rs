//! Room manager: admits connections, tracks membership, tears rooms down.
//!
//! The manager is a single actor. Admissions, releases, grace-period
//! expiries and shutdowns are processed one at a time, so the capacity
//! check and the room creation that follows it can never interleave with
//! another admission.

use std::marker::PhantomData;
use std::sync::Arc;

use hnp_protocol::{CompiledProtocol, ConnectionId, RoomId};
use tokio::sync::{mpsc, oneshot};

use crate::registry::{Registry, RoomSnapshot, Slot};
use crate::room::spawn_room;
use crate::{AdmissionError, MemberSender, RoomError, RoomHandle, RoomLimits, RoomLogic, RoomState};

/// A connection asking to be placed in a room.
pub struct AdmissionRequest {
    pub conn: ConnectionId,
    /// `None` joins any room with space.
    pub room: Option<RoomId>,
    /// Queue the room uses to reach this connection.
    pub sender: MemberSender,
}

/// A granted membership.
///
/// Dropping it releases the membership, exactly once, however the
/// connection ends.
pub struct Admission {
    room_id: RoomId,
    conn: ConnectionId,
    handle: RoomHandle,
    _release: ReleaseGuard,
}

impl std::fmt::Debug for Admission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Admission")
            .field("room_id", &self.room_id)
            .field("conn", &self.conn)
            .finish_non_exhaustive()
    }
}

impl Admission {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn connection(&self) -> ConnectionId {
        self.conn
    }

    pub fn handle(&self) -> &RoomHandle {
        &self.handle
    }

    /// Forwards a raw frame from this connection to its room.
    pub async fn send_frame(&self, frame: Vec<u8>) -> Result<(), RoomError> {
        self.handle.send_frame(self.conn, frame).await
    }
}

struct ReleaseGuard {
    room: RoomId,
    conn: ConnectionId,
    manager: mpsc::WeakSender<ManagerCommand>,
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        let Some(manager) = self.manager.upgrade() else {
            return;
        };
        let cmd = ManagerCommand::Release {
            room: self.room,
            conn: self.conn,
        };
        match manager.try_send(cmd) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(cmd)) => {
                // Queue is busy; finish the release off the dropping task.
                if let Ok(rt) = tokio::runtime::Handle::try_current() {
                    rt.spawn(async move {
                        let _ = manager.send(cmd).await;
                    });
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

enum ManagerCommand {
    Admit {
        request: AdmissionRequest,
        reply: oneshot::Sender<Result<Admission, AdmissionError>>,
    },
    Release {
        room: RoomId,
        conn: ConnectionId,
    },
    ListRooms {
        reply: oneshot::Sender<Vec<RoomSnapshot>>,
    },
    ShutdownRoom {
        room: RoomId,
        reason: String,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Shutdown {
        reason: String,
        reply: oneshot::Sender<()>,
    },
}

/// Notifications the manager sends itself.
pub(crate) enum ManagerEvent {
    GraceElapsed { room: RoomId, generation: u64 },
    RoomExited(RoomId),
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to the room manager actor. Cheap to clone.
#[derive(Clone)]
pub struct RoomManager {
    sender: mpsc::Sender<ManagerCommand>,
}

impl RoomManager {
    /// Starts the manager actor. Rooms it creates run `L`.
    ///
    /// Fails with [`RoomError::InvalidLimits`] if any limit is zero.
    pub fn spawn<L: RoomLogic>(limits: RoomLimits, protocol: Arc<CompiledProtocol>) -> Result<Self, RoomError> {
        limits.validate()?;
        let (tx, rx) = mpsc::channel(limits.command_buffer.max(1));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let actor = ManagerActor::<L> {
            registry: Registry::new(limits.max_rooms, limits.max_conn_per_room),
            limits,
            protocol,
            commands: rx,
            weak: tx.downgrade(),
            events_tx,
            events: events_rx,
            shutting_down: false,
            _logic: PhantomData,
        };
        tokio::spawn(actor.run());

        Ok(Self { sender: tx })
    }

    /// Places a connection in a room.
    pub async fn admit(&self, request: AdmissionRequest) -> Result<Admission, AdmissionError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(ManagerCommand::Admit { request, reply })
            .await
            .map_err(|_| AdmissionError::Unavailable)?;
        rx.await.map_err(|_| AdmissionError::Unavailable)?
    }

    /// Snapshot of every live room, in id order.
    pub async fn list_rooms(&self) -> Result<Vec<RoomSnapshot>, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(ManagerCommand::ListRooms { reply })
            .await
            .map_err(|_| RoomError::ManagerUnavailable)?;
        rx.await.map_err(|_| RoomError::ManagerUnavailable)
    }

    /// Closes one room, notifying its members first.
    ///
    /// Succeeds without effect if the room already closed; fails with
    /// `NotFound` only for ids that were never assigned.
    pub async fn shutdown_room(&self, room: RoomId, reason: impl Into<String>) -> Result<(), RoomError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(ManagerCommand::ShutdownRoom {
                room,
                reason: reason.into(),
                reply,
            })
            .await
            .map_err(|_| RoomError::ManagerUnavailable)?;
        rx.await.map_err(|_| RoomError::ManagerUnavailable)?
    }

    /// Closes every room and stops admitting. Idempotent.
    pub async fn shutdown(&self, reason: impl Into<String>) -> Result<(), RoomError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(ManagerCommand::Shutdown {
                reason: reason.into(),
                reply,
            })
            .await
            .map_err(|_| RoomError::ManagerUnavailable)?;
        rx.await.map_err(|_| RoomError::ManagerUnavailable)
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct ManagerActor<L: RoomLogic> {
    registry: Registry,
    limits: RoomLimits,
    protocol: Arc<CompiledProtocol>,
    commands: mpsc::Receiver<ManagerCommand>,
    weak: mpsc::WeakSender<ManagerCommand>,
    events_tx: mpsc::UnboundedSender<ManagerEvent>,
    events: mpsc::UnboundedReceiver<ManagerEvent>,
    shutting_down: bool,
    _logic: PhantomData<fn() -> L>,
}

impl<L: RoomLogic> ManagerActor<L> {
    async fn run(mut self) {
        tracing::info!(
            max_rooms = self.limits.max_rooms,
            max_conn_per_room = self.limits.max_conn_per_room,
            "room manager started"
        );

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                Some(event) = self.events.recv() => self.handle_event(event).await,
            }
        }

        self.close_all("server stopped").await;
        tracing::info!("room manager stopped");
    }

    async fn handle_command(&mut self, cmd: ManagerCommand) {
        match cmd {
            ManagerCommand::Admit { request, reply } => {
                let result = self.admit(request).await;
                // A dropped receiver hands the admission back; dropping it
                // here releases the membership again.
                let _ = reply.send(result);
            }
            ManagerCommand::Release { room, conn } => self.release(room, conn).await,
            ManagerCommand::ListRooms { reply } => {
                let _ = reply.send(self.registry.snapshot());
            }
            ManagerCommand::ShutdownRoom { room, reason, reply } => {
                let result = self.shutdown_room(room, &reason).await;
                let _ = reply.send(result);
            }
            ManagerCommand::Shutdown { reason, reply } => {
                if !self.shutting_down {
                    tracing::info!(%reason, rooms = self.registry.len(), "shutting down all rooms");
                    self.shutting_down = true;
                }
                self.close_all(&reason).await;
                let _ = reply.send(());
            }
        }
    }

    async fn handle_event(&mut self, event: ManagerEvent) {
        match event {
            ManagerEvent::GraceElapsed { room, generation } => {
                let current = self
                    .registry
                    .get(room)
                    .is_some_and(|e| e.state == RoomState::Closing && e.generation == generation);
                if !current {
                    tracing::debug!(room_id = %room, generation, "stale grace timer ignored");
                    return;
                }
                if let Some(entry) = self.registry.remove(room) {
                    tracing::info!(room_id = %room, "grace period elapsed, closing empty room");
                    let _ = entry.handle.close("room closed").await;
                }
            }
            ManagerEvent::RoomExited(room) => {
                if self.registry.remove(room).is_some() {
                    tracing::warn!(room_id = %room, "room actor exited, entry removed");
                }
            }
        }
    }

    async fn admit(&mut self, request: AdmissionRequest) -> Result<Admission, AdmissionError> {
        if self.shutting_down {
            return Err(AdmissionError::ShuttingDown);
        }
        let AdmissionRequest { conn, room, mut sender } = request;

        loop {
            let room_id = match self.registry.choose(room)? {
                Slot::Existing(id) => id,
                Slot::New => self.create_room(),
            };
            let Some(handle) = self.registry.get(room_id).map(|e| e.handle.clone()) else {
                continue;
            };

            if let Err(returned) = handle.join(conn, sender).await {
                tracing::warn!(room_id = %room_id, "room actor gone during admission, dropping entry");
                self.registry.remove(room_id);
                sender = returned;
                continue;
            }

            let state = self.registry.add_member(room_id, conn);
            tracing::info!(room_id = %room_id, %conn, ?state, "connection admitted");

            return Ok(Admission {
                room_id,
                conn,
                handle,
                _release: ReleaseGuard {
                    room: room_id,
                    conn,
                    manager: self.weak.clone(),
                },
            });
        }
    }

    fn create_room(&mut self) -> RoomId {
        let room_id = self.registry.allocate_id();
        let handle = spawn_room::<L>(
            room_id,
            self.protocol.clone(),
            self.limits.command_buffer,
            self.events_tx.clone(),
        );
        self.registry.insert(handle);
        tracing::info!(room_id = %room_id, rooms = self.registry.len(), "room created");
        room_id
    }

    async fn release(&mut self, room: RoomId, conn: ConnectionId) {
        let Some(handle) = self.registry.get(room).map(|e| e.handle.clone()) else {
            tracing::debug!(room_id = %room, %conn, "release for closed room ignored");
            return;
        };
        let Some((state, generation)) = self.registry.remove_member(room, conn) else {
            tracing::debug!(room_id = %room, %conn, "release for non-member ignored");
            return;
        };

        let _ = handle.leave(conn).await;
        tracing::info!(room_id = %room, %conn, %state, "connection released");

        if state == RoomState::Closing {
            self.arm_grace_timer(room, generation);
        }
    }

    fn arm_grace_timer(&self, room: RoomId, generation: u64) {
        let grace = self.limits.grace_period;
        let events = self.events_tx.clone();
        tracing::debug!(room_id = %room, ?grace, "room empty, grace timer armed");
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let _ = events.send(ManagerEvent::GraceElapsed { room, generation });
        });
    }

    async fn shutdown_room(&mut self, room: RoomId, reason: &str) -> Result<(), RoomError> {
        match self.registry.remove(room) {
            Some(entry) => {
                tracing::info!(room_id = %room, members = entry.members.len(), reason, "shutting down room");
                let _ = entry.handle.close(reason).await;
                Ok(())
            }
            None if self.registry.ever_existed(room) => {
                tracing::debug!(room_id = %room, "room already closed");
                Ok(())
            }
            None => Err(RoomError::NotFound(room)),
        }
    }

    async fn close_all(&mut self, reason: &str) {
        for entry in self.registry.drain() {
            let _ = entry.handle.close(reason).await;
        }
    }
}
