//! HTTP adapters - REST API implementations.

pub mod middleware;
pub mod realtime;
mod router;

pub use realtime::{realtime_routes, RealtimeHandlers};
pub use router::api_router;
