//! Domain layer.
//!
//! - `foundation` - identifiers, timestamps, identity and errors
//! - `realtime` - room events, routing rules and session lifecycle

pub mod foundation;
pub mod realtime;
