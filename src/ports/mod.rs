//! Ports - Interfaces for external collaborators.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the hub and the outside world. Adapters implement these ports.
//!
//! - `SessionValidator` - token -> verified identity
//! - `RoomAccessChecker` - may this identity join this room
//! - `ChatHistory` - durable chat history (append / query by room)

mod chat_history;
mod room_access;
mod session_validator;

pub use chat_history::ChatHistory;
pub use room_access::{AccessDeniedReason, AccessResult, RoomAccessChecker};
pub use session_validator::SessionValidator;
