//! Chat history adapters.
//!
//! - `InMemoryChatHistory` - process-local store (tests, or no database configured)
//! - `PostgresChatHistory` - `chat_messages` table

mod in_memory;
mod postgres;

pub use in_memory::InMemoryChatHistory;
pub use postgres::PostgresChatHistory;
