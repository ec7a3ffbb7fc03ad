//! Command and query handlers.

pub mod realtime;

pub use realtime::{
    GetChatHistoryHandler, GetChatHistoryQuery, GetOnlineUsersHandler, GetOnlineUsersQuery,
    RealtimeQueryError,
};
