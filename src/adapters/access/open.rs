//! Access checker that admits every verified identity.
//!
//! Rooms have no directory of their own, so once identity has been verified
//! there is nothing further to check. Replace with a membership-backed
//! checker when rooms gain owners.

use async_trait::async_trait;

use crate::domain::foundation::{AuthenticatedUser, DomainError, RoomId};
use crate::ports::{AccessResult, RoomAccessChecker};

/// Grants every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenRoomAccess;

impl OpenRoomAccess {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RoomAccessChecker for OpenRoomAccess {
    async fn can_join(
        &self,
        user: &AuthenticatedUser,
        room: &RoomId,
    ) -> Result<AccessResult, DomainError> {
        tracing::trace!(user_id = %user.id, room_id = %room, "open room access");
        Ok(AccessResult::Allowed)
    }
}
