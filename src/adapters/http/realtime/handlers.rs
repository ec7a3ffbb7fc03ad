//! HTTP handlers for the realtime query endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::adapters::http::middleware::RequireAuth;
use crate::application::handlers::realtime::{
    GetChatHistoryHandler, GetChatHistoryQuery, GetOnlineUsersHandler, GetOnlineUsersQuery,
    RealtimeQueryError,
};
use crate::domain::foundation::RoomId;

use super::dto::{ChatHistoryResponse, ErrorResponse, OnlineUsersResponse};

#[derive(Clone)]
pub struct RealtimeHandlers {
    online_handler: Arc<GetOnlineUsersHandler>,
    history_handler: Arc<GetChatHistoryHandler>,
}

impl RealtimeHandlers {
    pub fn new(
        online_handler: Arc<GetOnlineUsersHandler>,
        history_handler: Arc<GetChatHistoryHandler>,
    ) -> Self {
        Self {
            online_handler,
            history_handler,
        }
    }
}

fn parse_room(room_id: String) -> Result<RoomId, Response> {
    RoomId::new(room_id).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request("Room ID required")),
        )
            .into_response()
    })
}

/// GET /realtime/online/:room_id - identities connected to a room
pub async fn get_online_users(
    State(handlers): State<RealtimeHandlers>,
    RequireAuth(_user): RequireAuth,
    Path(room_id): Path<String>,
) -> Response {
    let room_id = match parse_room(room_id) {
        Ok(room) => room,
        Err(response) => return response,
    };

    let users = handlers
        .online_handler
        .handle(GetOnlineUsersQuery { room_id })
        .await;

    let response = OnlineUsersResponse {
        online_users: users.into_iter().map(Into::into).collect(),
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// GET /realtime/chat/:room_id - persisted chat history, oldest first
pub async fn get_chat_history(
    State(handlers): State<RealtimeHandlers>,
    RequireAuth(user): RequireAuth,
    Path(room_id): Path<String>,
) -> Response {
    let room_id = match parse_room(room_id) {
        Ok(room) => room,
        Err(response) => return response,
    };

    match handlers
        .history_handler
        .handle(GetChatHistoryQuery { room_id, user })
        .await
    {
        Ok(messages) => (StatusCode::OK, Json(ChatHistoryResponse { messages })).into_response(),
        Err(e) => handle_query_error(e),
    }
}

fn handle_query_error(error: RealtimeQueryError) -> Response {
    match error {
        RealtimeQueryError::Forbidden(_) => (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::forbidden("Access denied to this room")),
        )
            .into_response(),
        RealtimeQueryError::HistoryUnavailable(e) => {
            tracing::error!(error = %e, "failed to fetch chat history");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::internal("Failed to fetch chat history")),
            )
                .into_response()
        }
    }
}
