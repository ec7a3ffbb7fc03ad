//! Authentication types for the domain layer.
//!
//! An `AuthenticatedUser` is what the identity collaborator hands back after
//! verifying a token. Nothing else in the crate trusts client-supplied
//! identity.

use super::UserId;
use thiserror::Error;

/// Verified identity bound to a connection or HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// The unique user identifier from the token issuer.
    pub id: UserId,

    /// Display name shown to other room members.
    pub username: String,
}

impl AuthenticatedUser {
    /// Creates a new authenticated user.
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
        }
    }

    /// Identity handed to a connection when anonymous access is enabled.
    pub fn guest() -> Self {
        Self::new(UserId::guest(), "Guest")
    }
}

/// Authentication errors that can occur during token validation.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The token is missing, malformed, or has an invalid signature.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// The token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// The token is valid but was issued for another purpose (e.g. refresh).
    #[error("Wrong token type")]
    WrongTokenType,

    /// The identity service could not be reached.
    #[error("Auth service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AuthError {
    /// Creates a service unavailable error with a message.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Returns true if the caller should obtain a new token.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidToken | AuthError::TokenExpired | AuthError::WrongTokenType
        )
    }
}
