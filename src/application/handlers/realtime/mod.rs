//! Realtime query handlers.
//!
//! Read-only views over the hub and the chat history, used by the HTTP
//! query routes. Neither handler mutates room membership.

mod get_chat_history;
mod get_online_users;

pub use get_chat_history::{GetChatHistoryHandler, GetChatHistoryQuery};
pub use get_online_users::{GetOnlineUsersHandler, GetOnlineUsersQuery};

use thiserror::Error;

use crate::domain::foundation::DomainError;
use crate::ports::AccessDeniedReason;

/// Errors from realtime queries.
#[derive(Debug, Error)]
pub enum RealtimeQueryError {
    #[error("access denied: {0}")]
    Forbidden(AccessDeniedReason),

    #[error("chat history unavailable: {0}")]
    HistoryUnavailable(DomainError),
}
