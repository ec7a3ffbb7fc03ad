//! Room access port.
//!
//! Answers "may this verified user join (or read) this room?". Like the
//! membership gate it replaces, the check is **fail-secure**: callers treat
//! an `Err` the same as a denial.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{AuthenticatedUser, DomainError, RoomId};

/// Port for checking whether a user may take part in a room.
#[async_trait]
pub trait RoomAccessChecker: Send + Sync {
    /// Check if `user` may join `room` (live session or history read).
    async fn can_join(
        &self,
        user: &AuthenticatedUser,
        room: &RoomId,
    ) -> Result<AccessResult, DomainError>;
}

/// Result of an access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessResult {
    /// Access is granted.
    Allowed,
    /// Access is denied with a specific reason.
    Denied(AccessDeniedReason),
}

impl AccessResult {
    /// Returns true if access is allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessResult::Allowed)
    }

    /// Converts the result to a Result type, with denied becoming an error.
    pub fn into_result(self) -> Result<(), AccessDeniedReason> {
        match self {
            AccessResult::Allowed => Ok(()),
            AccessResult::Denied(reason) => Err(reason),
        }
    }
}

/// Reason why access was denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccessDeniedReason {
    /// User is neither the room's creator nor a listed participant.
    NotParticipant,

    /// The room does not exist in the room directory.
    UnknownRoom,
}

impl AccessDeniedReason {
    /// Get a user-facing message for the denial reason.
    pub fn user_message(&self) -> &'static str {
        match self {
            AccessDeniedReason::NotParticipant => "Access denied to this room",
            AccessDeniedReason::UnknownRoom => "Room not found",
        }
    }
}

impl std::fmt::Display for AccessDeniedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.user_message())
    }
}
