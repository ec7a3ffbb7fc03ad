//! Room registry: which sessions are in which room.
//!
//! ```text
//! Room: study-123      Room: study-456
//! ├── session-a        ├── session-d
//! ├── session-b        └── session-e
//! └── session-c
//! ```
//!
//! The registry is plain data. The hub wraps it in a `RwLock`, mutates it
//! only from its worker, and lets outside readers take the shared side.
//!
//! Invariants kept by every method:
//! - a room entry exists iff at least one admitted session is bound to it
//! - a session id appears at most once, in exactly one room entry

use std::collections::{HashMap, HashSet};

use crate::domain::foundation::{AuthenticatedUser, RoomId, SessionId, UserId};

use super::session::SessionHandle;

#[derive(Debug, Default)]
pub struct RoomRegistry {
    /// All admitted sessions by id.
    sessions: HashMap<SessionId, SessionHandle>,

    /// Room -> ids of the sessions currently in it.
    rooms: HashMap<RoomId, HashSet<SessionId>>,

    next_admission: u64,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits a session into the global set and its room.
    ///
    /// Returns `false` (and drops `handle`) if a session with the same id is
    /// already admitted, or if the handle cannot move to `Admitted`.
    pub fn insert(&mut self, mut handle: SessionHandle) -> bool {
        let id = handle.id();
        if self.sessions.contains_key(&id) {
            return false;
        }

        self.next_admission += 1;
        if handle.admit(self.next_admission).is_err() {
            return false;
        }

        self.rooms
            .entry(handle.identity().room_id.clone())
            .or_default()
            .insert(id);
        self.sessions.insert(id, handle);
        true
    }

    /// Removes a session from its room and the global set.
    ///
    /// Deletes the room entry when it becomes empty. The caller owns the
    /// returned handle and is responsible for closing it.
    pub fn remove(&mut self, id: &SessionId) -> Option<SessionHandle> {
        let handle = self.sessions.remove(id)?;
        let room_id = &handle.identity().room_id;

        if let Some(members) = self.rooms.get_mut(room_id) {
            members.remove(id);
            if members.is_empty() {
                self.rooms.remove(room_id);
            }
        }

        Some(handle)
    }

    pub fn get(&self, id: &SessionId) -> Option<&SessionHandle> {
        self.sessions.get(id)
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Sessions in a room (empty if the room does not exist).
    pub fn members<'a>(&'a self, room: &RoomId) -> impl Iterator<Item = &'a SessionHandle> + 'a {
        self.rooms
            .get(room)
            .into_iter()
            .flatten()
            .filter_map(|id| self.sessions.get(id))
    }

    /// Most recently admitted session bound to `user`, in any room.
    pub fn find_by_user(&self, user: &UserId) -> Option<&SessionHandle> {
        self.sessions
            .values()
            .filter(|h| &h.identity().user.id == user)
            .max_by_key(|h| h.admission())
    }

    /// Identities online in a room, in admission order.
    pub fn online_users(&self, room: &RoomId) -> Vec<AuthenticatedUser> {
        let mut members: Vec<&SessionHandle> = self.members(room).collect();
        members.sort_by_key(|h| h.admission());
        members
            .into_iter()
            .map(|h| h.identity().user.clone())
            .collect()
    }

    /// Number of sessions in a room (0 if the room doesn't exist).
    pub fn member_count(&self, room: &RoomId) -> usize {
        self.rooms.get(room).map(HashSet::len).unwrap_or(0)
    }

    /// All rooms that currently have members.
    pub fn active_rooms(&self) -> Vec<RoomId> {
        self.rooms.keys().cloned().collect()
    }

    /// Total admitted sessions across all rooms.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
