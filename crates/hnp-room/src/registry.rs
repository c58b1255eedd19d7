//! The room registry and admission policy.
//!
//! Pure bookkeeping: owned and mutated only by the manager actor, so none
//! of this needs locks or async.

use std::collections::{BTreeMap, BTreeSet};

use hnp_protocol::{ConnectionId, RoomId};
use serde::{Deserialize, Serialize};

use crate::{AdmissionError, RoomHandle, RoomState};

/// Point-in-time view of one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub members: usize,
    pub capacity: usize,
    pub state: RoomState,
}

pub(crate) struct RoomEntry {
    pub(crate) handle: RoomHandle,
    pub(crate) state: RoomState,
    pub(crate) members: BTreeSet<ConnectionId>,
    /// Bumped on every transition into `Closing`; a grace timer only acts
    /// if the generation it was armed with is still current.
    pub(crate) generation: u64,
}

/// Where an admission should land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    Existing(RoomId),
    New,
}

pub(crate) struct Registry {
    rooms: BTreeMap<RoomId, RoomEntry>,
    next_id: u32,
    max_rooms: usize,
    capacity: usize,
}

impl Registry {
    pub(crate) fn new(max_rooms: usize, capacity: usize) -> Self {
        Self {
            rooms: BTreeMap::new(),
            next_id: 1,
            max_rooms,
            capacity,
        }
    }

    /// Applies the admission policy without changing anything.
    ///
    /// 1. A named, live room is joined if it has space, else `RoomFull`.
    /// 2. Otherwise the lowest-id room with space is joined.
    /// 3. Otherwise a new room is created while under `max_rooms`.
    /// 4. Otherwise `ServerFull`.
    pub(crate) fn choose(&self, requested: Option<RoomId>) -> Result<Slot, AdmissionError> {
        if let Some(id) = requested {
            if let Some(entry) = self.rooms.get(&id) {
                return if self.has_space(entry) {
                    Ok(Slot::Existing(id))
                } else {
                    Err(AdmissionError::RoomFull(id))
                };
            }
        }

        if let Some((id, _)) = self.rooms.iter().find(|(_, e)| self.has_space(e)) {
            return Ok(Slot::Existing(*id));
        }

        if self.rooms.len() < self.max_rooms {
            return Ok(Slot::New);
        }
        Err(AdmissionError::ServerFull)
    }

    fn has_space(&self, entry: &RoomEntry) -> bool {
        entry.state.accepts_members() && entry.members.len() < self.capacity
    }

    pub(crate) fn allocate_id(&mut self) -> RoomId {
        let id = RoomId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Returns `true` if `id` was handed out at some point.
    pub(crate) fn ever_existed(&self, id: RoomId) -> bool {
        id.0 >= 1 && id.0 < self.next_id
    }

    pub(crate) fn insert(&mut self, handle: RoomHandle) {
        self.rooms.insert(
            handle.room_id(),
            RoomEntry {
                handle,
                state: RoomState::Open,
                members: BTreeSet::new(),
                generation: 0,
            },
        );
    }

    pub(crate) fn get(&self, id: RoomId) -> Option<&RoomEntry> {
        self.rooms.get(&id)
    }

    pub(crate) fn remove(&mut self, id: RoomId) -> Option<RoomEntry> {
        self.rooms.remove(&id)
    }

    pub(crate) fn drain(&mut self) -> Vec<RoomEntry> {
        std::mem::take(&mut self.rooms).into_values().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Records a new member. Leaving `Closing` invalidates the pending
    /// grace timer.
    pub(crate) fn add_member(&mut self, id: RoomId, conn: ConnectionId) -> Option<RoomState> {
        let capacity = self.capacity;
        let entry = self.rooms.get_mut(&id)?;
        entry.members.insert(conn);
        if entry.state == RoomState::Closing {
            entry.generation += 1;
        }
        entry.state = RoomState::for_members(entry.members.len(), capacity);
        Some(entry.state)
    }

    /// Drops a member. Returns the new state and generation, or `None` if
    /// the room or the member is unknown.
    pub(crate) fn remove_member(
        &mut self,
        id: RoomId,
        conn: ConnectionId,
    ) -> Option<(RoomState, u64)> {
        let capacity = self.capacity;
        let entry = self.rooms.get_mut(&id)?;
        if !entry.members.remove(&conn) {
            return None;
        }
        let state = RoomState::for_members(entry.members.len(), capacity);
        if state == RoomState::Closing {
            entry.generation += 1;
        }
        entry.state = state;
        Some((state, entry.generation))
    }

    pub(crate) fn snapshot(&self) -> Vec<RoomSnapshot> {
        self.rooms
            .iter()
            .map(|(id, e)| RoomSnapshot {
                id: *id,
                members: e.members.len(),
                capacity: self.capacity,
                state: e.state,
            })
            .collect()
    }
}
