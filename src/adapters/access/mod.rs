//! Room access adapters.
//!
//! - `OpenRoomAccess` - any verified user may join any room
//! - `MockRoomAccess` - scripted answers for tests

mod mock;
mod open;

pub use mock::MockRoomAccess;
pub use open::OpenRoomAccess;
