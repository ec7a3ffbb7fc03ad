//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `websocket` - hub, registry, pumps and the upgrade handler
//! - `http` - REST query routes and auth middleware
//! - `history` - chat history stores (in-memory, PostgreSQL)
//! - `auth` - token validators
//! - `access` - room access checkers

pub mod access;
pub mod auth;
pub mod history;
pub mod http;
pub mod websocket;
