//! HS256 access-token validator.
//!
//! Tokens carry `user_id`, `username` and `token_type` claims alongside the
//! registered `exp`/`iat`/`nbf`. Only `token_type = "access"` is accepted;
//! refresh tokens are rejected even when correctly signed.

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{AuthError, AuthenticatedUser, UserId};
use crate::ports::SessionValidator;

const ACCESS_TOKEN_TYPE: &str = "access";

/// Claims carried by access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub user_id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    pub token_type: String,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
    #[serde(default)]
    pub nbf: i64,
}

/// Validates HS256 tokens signed with a shared secret.
pub struct JwtSessionValidator {
    secret: SecretString,
}

impl JwtSessionValidator {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp"]);
        validation
    }
}

#[async_trait]
impl SessionValidator for JwtSessionValidator {
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let key = DecodingKey::from_secret(self.secret.expose_secret().as_bytes());
        let data = decode::<AccessClaims>(token, &key, &Self::validation()).map_err(|e| {
            use jsonwebtoken::errors::ErrorKind;
            match e.kind() {
                ErrorKind::ExpiredSignature => {
                    tracing::debug!("Token expired");
                    AuthError::TokenExpired
                }
                _ => {
                    tracing::debug!("Token validation failed: {}", e);
                    AuthError::InvalidToken
                }
            }
        })?;
        let claims = data.claims;

        if claims.token_type != ACCESS_TOKEN_TYPE {
            tracing::debug!(token_type = %claims.token_type, "rejecting non-access token");
            return Err(AuthError::WrongTokenType);
        }

        let id = UserId::new(claims.user_id).map_err(|_| AuthError::InvalidToken)?;
        Ok(AuthenticatedUser::new(id, claims.username))
    }
}
