//! GetOnlineUsersHandler - who is connected to a room right now.

use crate::adapters::websocket::HubHandle;
use crate::domain::foundation::{AuthenticatedUser, RoomId};

/// Query for the identities online in a room.
#[derive(Debug, Clone)]
pub struct GetOnlineUsersQuery {
    pub room_id: RoomId,
}

/// Reads room membership through the hub's shared-lock path.
#[derive(Clone)]
pub struct GetOnlineUsersHandler {
    hub: HubHandle,
}

impl GetOnlineUsersHandler {
    pub fn new(hub: HubHandle) -> Self {
        Self { hub }
    }

    /// One entry per session, in admission order. Empty for unknown rooms.
    pub async fn handle(&self, query: GetOnlineUsersQuery) -> Vec<AuthenticatedUser> {
        self.hub.online_users(&query.room_id).await
    }
}
