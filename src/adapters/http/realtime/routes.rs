//! HTTP routes for the realtime query endpoints.

use axum::{middleware, routing::get, Router};

use crate::adapters::http::middleware::{auth_middleware, AuthState};

use super::handlers::{get_chat_history, get_online_users, RealtimeHandlers};

/// Creates the realtime query router. Every route requires a Bearer token.
pub fn realtime_routes(handlers: RealtimeHandlers, auth: AuthState) -> Router {
    Router::new()
        .route("/online/:room_id", get(get_online_users))
        .route("/chat/:room_id", get(get_chat_history))
        .with_state(handlers)
        .layer(middleware::from_fn_with_state(auth, auth_middleware))
}
