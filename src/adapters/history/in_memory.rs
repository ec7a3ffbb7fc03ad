//! In-memory chat history.
//!
//! Used by tests and when no database is configured. History is lost on
//! restart.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, ErrorCode, RoomId};
use crate::domain::realtime::ChatRecord;
use crate::ports::ChatHistory;

/// Chat history kept in a vector, in append order.
#[derive(Default)]
pub struct InMemoryChatHistory {
    records: RwLock<Vec<ChatRecord>>,
    fail_appends: AtomicBool,
}

impl InMemoryChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    // Poisoning is ignored: every write is a single push.
    fn read(&self) -> RwLockReadGuard<'_, Vec<ChatRecord>> {
        self.records.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<ChatRecord>> {
        self.records.write().unwrap_or_else(|e| e.into_inner())
    }

    // === Test Helpers ===

    /// Makes every subsequent append fail with a database error.
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Number of stored records across all rooms.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ChatHistory for InMemoryChatHistory {
    async fn append(&self, record: &ChatRecord) -> Result<(), DomainError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                "Failed to insert chat message: store unavailable",
            ));
        }
        self.write().push(record.clone());
        Ok(())
    }

    async fn query_by_room(&self, room: &RoomId) -> Result<Vec<ChatRecord>, DomainError> {
        let mut records: Vec<ChatRecord> = self
            .read()
            .iter()
            .filter(|r| &r.room_id == room)
            .cloned()
            .collect();
        records.sort_by_key(|r| *r.timestamp.as_datetime());
        Ok(records)
    }
}
