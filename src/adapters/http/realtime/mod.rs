//! HTTP adapter for the realtime query endpoints.

mod dto;
mod handlers;
mod routes;

pub use dto::{ChatHistoryResponse, ErrorResponse, OnlineUserResponse, OnlineUsersResponse};
pub use handlers::RealtimeHandlers;
pub use routes::realtime_routes;
