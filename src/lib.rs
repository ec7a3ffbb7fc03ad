//! roomhub - real-time room messaging hub.
//!
//! Fans out room-scoped chat, presence, typing and call-signaling events to
//! WebSocket sessions. One hub worker owns all room membership; each
//! connection runs an inbound and an outbound pump.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
