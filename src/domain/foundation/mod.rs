//! Foundation module - Shared domain primitives.
//!
//! Identifiers, timestamps, identity and error types shared by the
//! realtime domain and its adapters.

mod auth;
mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use auth::{AuthError, AuthenticatedUser};
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{RoomId, SessionId, UserId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
