//! Scripted access checker for testing.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::domain::foundation::{AuthenticatedUser, DomainError, ErrorCode, RoomId, UserId};
use crate::ports::{AccessDeniedReason, AccessResult, RoomAccessChecker};

#[derive(Debug, Clone)]
enum Mode {
    AllowAll,
    DenyAll,
    AllowList(HashSet<(UserId, RoomId)>),
    Fail,
}

/// Access checker with a fixed answer or an explicit allow list.
#[derive(Debug, Clone)]
pub struct MockRoomAccess {
    mode: Mode,
}

impl MockRoomAccess {
    pub fn allow_all() -> Self {
        Self { mode: Mode::AllowAll }
    }

    pub fn deny_all() -> Self {
        Self { mode: Mode::DenyAll }
    }

    /// Every check returns a database error.
    pub fn failing() -> Self {
        Self { mode: Mode::Fail }
    }

    /// Only the listed `(user, room)` pairs are allowed.
    pub fn allow_list() -> Self {
        Self {
            mode: Mode::AllowList(HashSet::new()),
        }
    }

    /// Adds a pair to the allow list. No effect in the other modes.
    pub fn allowing(mut self, user: &UserId, room: &RoomId) -> Self {
        if let Mode::AllowList(pairs) = &mut self.mode {
            pairs.insert((user.clone(), room.clone()));
        }
        self
    }
}

#[async_trait]
impl RoomAccessChecker for MockRoomAccess {
    async fn can_join(
        &self,
        user: &AuthenticatedUser,
        room: &RoomId,
    ) -> Result<AccessResult, DomainError> {
        match &self.mode {
            Mode::AllowAll => Ok(AccessResult::Allowed),
            Mode::DenyAll => Ok(AccessResult::Denied(AccessDeniedReason::NotParticipant)),
            Mode::AllowList(pairs) if pairs.contains(&(user.id.clone(), room.clone())) => {
                Ok(AccessResult::Allowed)
            }
            Mode::AllowList(_) => Ok(AccessResult::Denied(AccessDeniedReason::NotParticipant)),
            Mode::Fail => Err(DomainError::new(
                ErrorCode::DatabaseError,
                "access directory unavailable",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> AuthenticatedUser {
        AuthenticatedUser::new(UserId::new(id).unwrap(), id)
    }

    #[tokio::test]
    async fn allow_list_admits_only_listed_pairs() {
        let room = RoomId::new("a").unwrap();
        let alice = user("alice");
        let checker = MockRoomAccess::allow_list().allowing(&alice.id, &room);

        assert!(checker.can_join(&alice, &room).await.unwrap().is_allowed());
        assert!(!checker.can_join(&user("bob"), &room).await.unwrap().is_allowed());
        assert!(!checker
            .can_join(&alice, &RoomId::new("b").unwrap())
            .await
            .unwrap()
            .is_allowed());
    }

    #[tokio::test]
    async fn failing_returns_error() {
        let checker = MockRoomAccess::failing();
        assert!(checker
            .can_join(&user("a"), &RoomId::new("a").unwrap())
            .await
            .is_err());
    }
}
