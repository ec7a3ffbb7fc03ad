//! WebSocket upgrade handler for room sessions.
//!
//! Handles the HTTP → WebSocket upgrade and the connection lifecycle:
//! 1. Require a room id
//! 2. Verify the caller's identity (or issue a guest identity when
//!    anonymous access is enabled)
//! 3. Check the caller may join the room
//! 4. Upgrade, register the session with the hub and run both pumps
//!
//! Nothing is admitted until steps 1-3 have passed.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::StreamExt;
use serde::Deserialize;

use crate::domain::foundation::{AuthError, AuthenticatedUser, RoomId, SessionId};
use crate::domain::realtime::SessionIdentity;
use crate::ports::{AccessResult, RoomAccessChecker, SessionValidator};

use super::hub::HubHandle;
use super::pumps::{drive_session, PumpConfig};
use super::session::open_session;

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct WebSocketState {
    pub hub: HubHandle,
    pub validator: Arc<dyn SessionValidator>,
    pub access: Arc<dyn RoomAccessChecker>,
    /// Admit connections without a token under a fresh guest identity.
    pub allow_anonymous: bool,
    /// Capacity of each session's outbound queue.
    pub queue_capacity: usize,
    pub pump: PumpConfig,
}

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub room_id: Option<String>,
    /// Browsers cannot set headers on an upgrade, so the token may ride here.
    pub token: Option<String>,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// Bearer token from the `Authorization` header, else the `token` parameter.
fn extract_token<'a>(headers: &'a HeaderMap, params: &'a ConnectParams) -> Option<&'a str> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .or(params.token.as_deref())
        .filter(|t| !t.is_empty())
}

async fn authenticate(
    state: &WebSocketState,
    token: Option<&str>,
) -> Result<AuthenticatedUser, Response> {
    let Some(token) = token else {
        if state.allow_anonymous {
            return Ok(AuthenticatedUser::guest());
        }
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            "Authentication required",
        ));
    };

    state.validator.validate(token).await.map_err(|e| match e {
        AuthError::TokenExpired => error_response(StatusCode::UNAUTHORIZED, "Token expired"),
        AuthError::ServiceUnavailable(msg) => {
            tracing::error!("Auth service unavailable: {}", msg);
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Authentication service unavailable",
            )
        }
        _ => error_response(StatusCode::UNAUTHORIZED, "Invalid token"),
    })
}

/// Handle WebSocket upgrade requests.
///
/// Route: `GET /realtime/ws?roomId=<id>[&token=<jwt>]`
pub async fn ws_handler(
    State(state): State<WebSocketState>,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let room_id = match params.room_id.as_deref().map(RoomId::new) {
        Some(Ok(room)) => room,
        _ => return error_response(StatusCode::BAD_REQUEST, "Room ID required"),
    };

    let user = match authenticate(&state, extract_token(&headers, &params)).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    match state.access.can_join(&user, &room_id).await {
        Ok(AccessResult::Allowed) => {}
        Ok(AccessResult::Denied(reason)) => {
            tracing::debug!(user_id = %user.id, %room_id, %reason, "room access denied");
            return error_response(StatusCode::FORBIDDEN, "Access denied to this room");
        }
        Err(e) => {
            tracing::error!(user_id = %user.id, %room_id, error = %e, "room access check failed");
            return error_response(StatusCode::FORBIDDEN, "Access denied to this room");
        }
    }

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let identity = SessionIdentity::new(SessionId::new(), user, room_id);
    ws.max_message_size(state.pump.max_message_bytes)
        .on_upgrade(move |socket| run_session(socket, identity, state))
}

/// Runs one established connection until it is dismissed.
async fn run_session(socket: WebSocket, identity: SessionIdentity, state: WebSocketState) {
    let (handle, queue) = open_session(identity.clone(), state.queue_capacity);

    if let Err(e) = state.hub.register(handle).await {
        tracing::warn!(session_id = %identity.id, error = %e, "could not register session");
        return;
    }

    let (sink, stream) = socket.split();
    drive_session(stream, sink, queue, identity, state.hub.clone(), state.pump.clone()).await;
}

/// Create axum router for the WebSocket endpoint.
///
/// ```ignore
/// let app = Router::new().nest("/api/v1/realtime", websocket_router().with_state(state));
/// ```
pub fn websocket_router() -> Router<WebSocketState> {
    Router::new().route("/ws", get(ws_handler))
}
