//! GetChatHistoryHandler - persisted chat messages for a room.

use std::sync::Arc;

use crate::domain::foundation::{AuthenticatedUser, RoomId};
use crate::domain::realtime::ChatRecord;
use crate::ports::{AccessDeniedReason, AccessResult, ChatHistory, RoomAccessChecker};

use super::RealtimeQueryError;

/// Query for a room's chat history on behalf of a user.
#[derive(Debug, Clone)]
pub struct GetChatHistoryQuery {
    pub room_id: RoomId,
    pub user: AuthenticatedUser,
}

/// Handler for reading chat history.
///
/// The caller must pass the room access check. A failing check is treated
/// as a denial.
pub struct GetChatHistoryHandler {
    history: Arc<dyn ChatHistory>,
    access: Arc<dyn RoomAccessChecker>,
}

impl GetChatHistoryHandler {
    pub fn new(history: Arc<dyn ChatHistory>, access: Arc<dyn RoomAccessChecker>) -> Self {
        Self { history, access }
    }

    /// Messages oldest first.
    pub async fn handle(
        &self,
        query: GetChatHistoryQuery,
    ) -> Result<Vec<ChatRecord>, RealtimeQueryError> {
        match self.access.can_join(&query.user, &query.room_id).await {
            Ok(AccessResult::Allowed) => {}
            Ok(AccessResult::Denied(reason)) => return Err(RealtimeQueryError::Forbidden(reason)),
            Err(e) => {
                tracing::error!(room_id = %query.room_id, error = %e, "room access check failed");
                return Err(RealtimeQueryError::Forbidden(
                    AccessDeniedReason::NotParticipant,
                ));
            }
        }

        self.history
            .query_by_room(&query.room_id)
            .await
            .map_err(RealtimeQueryError::HistoryUnavailable)
    }
}
