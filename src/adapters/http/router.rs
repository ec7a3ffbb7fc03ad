//! Assembles the public API surface.

use std::time::Duration;

use axum::Router;
use tower_http::timeout::TimeoutLayer;

use crate::adapters::websocket::{websocket_router, WebSocketState};

use super::middleware::AuthState;
use super::realtime::{realtime_routes, RealtimeHandlers};

/// Routes under `/api/v1/realtime`:
///
/// - `GET /ws` - WebSocket upgrade
/// - `GET /online/:room_id` - identities online in a room
/// - `GET /chat/:room_id` - persisted chat history
///
/// `request_timeout` bounds the query routes only.
pub fn api_router(
    ws_state: WebSocketState,
    handlers: RealtimeHandlers,
    auth: AuthState,
    request_timeout: Duration,
) -> Router {
    let queries = realtime_routes(handlers, auth).layer(TimeoutLayer::new(request_timeout));
    let realtime = websocket_router().with_state(ws_state).merge(queries);

    Router::new().nest("/api/v1/realtime", realtime)
}
