//! Realtime domain: events, routing rules and session lifecycle.
//!
//! Pure types only; the hub, registry and pumps that act on them live in
//! `adapters::websocket`.

mod event;
mod history;
mod routing;
mod session;

pub use event::{EventType, InboundFrame, RoomEvent, TARGET_USER_KEY};
pub use history::ChatRecord;
pub use routing::{route_for, Route};
pub use session::{DisconnectReason, SessionIdentity, SessionState};
