//! Authentication configuration

use serde::Deserialize;
use std::fmt;

use super::error::ValidationError;
use super::server::Environment;

/// Minimum HS256 secret length accepted in production.
pub const MIN_PRODUCTION_SECRET_BYTES: usize = 32;

/// Authentication configuration (HS256 access tokens)
#[derive(Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Shared secret used to verify access tokens
    #[serde(default)]
    pub jwt_secret: String,

    /// Admit WebSocket connections without a token under a guest identity
    #[serde(default)]
    pub allow_anonymous: bool,
}

impl AuthConfig {
    /// Validate authentication configuration
    ///
    /// Production requires a long secret and forbids anonymous access.
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.jwt_secret.is_empty() {
            return Err(ValidationError::MissingRequired("AUTH__JWT_SECRET"));
        }

        if *environment == Environment::Production {
            if self.jwt_secret.len() < MIN_PRODUCTION_SECRET_BYTES {
                return Err(ValidationError::JwtSecretTooShort(
                    MIN_PRODUCTION_SECRET_BYTES,
                ));
            }
            if self.allow_anonymous {
                return Err(ValidationError::AnonymousInProduction);
            }
        }

        Ok(())
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("allow_anonymous", &self.allow_anonymous)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_secret(secret: &str) -> AuthConfig {
        AuthConfig {
            jwt_secret: secret.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_auth_config_defaults() {
        let config = AuthConfig::default();
        assert!(!config.allow_anonymous);
        assert!(config.jwt_secret.is_empty());
    }

    #[test]
    fn test_validation_missing_secret() {
        let config = AuthConfig::default();
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::MissingRequired("AUTH__JWT_SECRET"))
        );
    }

    #[test]
    fn test_short_secret_allowed_outside_production() {
        let config = with_secret("dev-secret");
        assert!(config.validate(&Environment::Development).is_ok());
        assert_eq!(
            config.validate(&Environment::Production),
            Err(ValidationError::JwtSecretTooShort(32))
        );
    }

    #[test]
    fn test_anonymous_rejected_in_production() {
        let config = AuthConfig {
            allow_anonymous: true,
            ..with_secret("0123456789abcdef0123456789abcdef")
        };
        assert!(config.validate(&Environment::Staging).is_ok());
        assert_eq!(
            config.validate(&Environment::Production),
            Err(ValidationError::AnonymousInProduction)
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", with_secret("super-secret-value"));
        assert!(!rendered.contains("super-secret-value"));
    }
}
