//! Application layer - Queries and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Room membership is mutated only by the hub; the handlers here read.

pub mod handlers;

pub use handlers::{
    GetChatHistoryHandler, GetChatHistoryQuery, GetOnlineUsersHandler, GetOnlineUsersQuery,
    RealtimeQueryError,
};
