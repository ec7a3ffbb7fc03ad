//! Chat history port (the history sink).
//!
//! The hub appends every chat event here before broadcasting it, but never
//! waits on the outcome: append failures are only logged. Reads come from
//! the HTTP query surface.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, RoomId};
use crate::domain::realtime::ChatRecord;

/// Append-only store of chat messages, queryable by room.
#[async_trait]
pub trait ChatHistory: Send + Sync {
    /// Persist one chat message.
    async fn append(&self, record: &ChatRecord) -> Result<(), DomainError>;

    /// All messages for a room, oldest first.
    async fn query_by_room(&self, room: &RoomId) -> Result<Vec<ChatRecord>, DomainError>;
}
