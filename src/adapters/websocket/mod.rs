//! WebSocket adapters for real-time rooms.
//!
//! # Architecture
//!
//! ```text
//!   client ◀──ws──▶ handler ── upgrade ──▶ drive_session
//!                                           ├── inbound_pump ──try_dispatch──┐
//!                                           └── outbound_pump ◀── queue ──┐  │
//!                                                                         │  ▼
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │ Hub worker   register > unregister > dispatch, one request at a time        │
//! │   RoomRegistry                                                              │
//! │   Room: study-123    Room: study-456                                        │
//! │   ├── session-a      ├── session-d                                          │
//! │   └── session-b      └── session-e                                          │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`session`] - hub-side session handle and its outbound queue
//! - [`rooms`] - room registry
//! - [`hub`] - the worker that owns all registry mutation, and its handle
//! - [`pumps`] - per-connection read and write loops
//! - [`handler`] - Axum WebSocket upgrade handler

pub mod handler;
pub mod hub;
pub mod pumps;
pub mod rooms;
pub mod session;

pub use handler::{websocket_router, ws_handler, ConnectParams, WebSocketState};
pub use hub::{Hub, HubConfig, HubError, HubHandle};
pub use pumps::{drive_session, inbound_pump, outbound_pump, PumpConfig, PumpError};
pub use rooms::RoomRegistry;
pub use session::{open_session, DeliveryError, SessionHandle};
