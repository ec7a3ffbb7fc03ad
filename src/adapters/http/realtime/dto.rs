//! Response bodies for the realtime query endpoints.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::AuthenticatedUser;
use crate::domain::realtime::ChatRecord;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUserResponse {
    pub user_id: String,
    pub username: String,
}

impl From<AuthenticatedUser> for OnlineUserResponse {
    fn from(user: AuthenticatedUser) -> Self {
        Self {
            user_id: user.id.to_string(),
            username: user.username,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUsersResponse {
    pub online_users: Vec<OnlineUserResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatHistoryResponse {
    pub messages: Vec<ChatRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: "BAD_REQUEST".to_string(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: "FORBIDDEN".to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: "INTERNAL_ERROR".to_string(),
        }
    }
}
