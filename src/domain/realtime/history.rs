//! Persisted chat messages.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::foundation::{RoomId, Timestamp, UserId};

use super::event::RoomEvent;

/// One chat message as stored by the history sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRecord {
    pub id: Uuid,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub username: String,
    pub content: String,
    pub timestamp: Timestamp,
    pub created_at: Timestamp,
}

impl ChatRecord {
    /// Captures the persisted subset of a chat event.
    pub fn from_event(event: &RoomEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            room_id: event.room_id.clone(),
            user_id: event.user_id.clone(),
            username: event.username.clone(),
            content: event.content.clone(),
            timestamp: event.timestamp,
            created_at: Timestamp::now(),
        }
    }
}
