//! Delivery rules per event type.
//!
//! The hub asks [`route_for`] how to deliver an event and then carries the
//! answer out against the registry. Keeping the classification pure lets
//! the rules be tested without any sessions.

use crate::domain::foundation::UserId;

use super::event::{EventType, RoomEvent};

/// How a dispatched event reaches its recipients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Append to chat history, then broadcast to the whole room.
    PersistAndBroadcast,

    /// Broadcast to the room, skipping every session bound to the author.
    BroadcastExceptAuthor,

    /// Deliver only to the session bound to this identity, in any room.
    Direct(UserId),

    /// Broadcast to every session in the room, author included.
    Broadcast,

    /// Signaling addressed to an identity no session can hold.
    Unreachable,
}

/// Classifies an event.
pub fn route_for(event: &RoomEvent) -> Route {
    match &event.event_type {
        EventType::Chat => Route::PersistAndBroadcast,
        EventType::Typing | EventType::StopTyping => Route::BroadcastExceptAuthor,
        signaling if signaling.is_signaling() => match event.target_user_id() {
            Some(target) => UserId::new(target).map_or(Route::Unreachable, Route::Direct),
            // group call without a named peer
            None => Route::BroadcastExceptAuthor,
        },
        lifecycle if lifecycle.is_call_lifecycle() => Route::Broadcast,
        _ => Route::Broadcast,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{AuthenticatedUser, RoomId, SessionId, Timestamp};
    use crate::domain::realtime::event::TARGET_USER_KEY;
    use crate::domain::realtime::session::SessionIdentity;
    use serde_json::json;

    fn event(event_type: EventType) -> RoomEvent {
        let identity = SessionIdentity::new(
            SessionId::new(),
            AuthenticatedUser::new(UserId::new("author").unwrap(), "author"),
            RoomId::new("room").unwrap(),
        );
        let mut event = RoomEvent::user_online(&identity);
        event.event_type = event_type;
        event.timestamp = Timestamp::now();
        event
    }

    #[test]
    fn chat_is_persisted_then_broadcast() {
        assert_eq!(route_for(&event(EventType::Chat)), Route::PersistAndBroadcast);
    }

    #[test]
    fn typing_indicators_skip_the_author() {
        assert_eq!(route_for(&event(EventType::Typing)), Route::BroadcastExceptAuthor);
        assert_eq!(
            route_for(&event(EventType::StopTyping)),
            Route::BroadcastExceptAuthor
        );
    }

    #[test]
    fn targeted_signaling_is_direct() {
        for kind in [EventType::RtcOffer, EventType::RtcAnswer, EventType::RtcCandidate] {
            let mut e = event(kind);
            e.data.insert(TARGET_USER_KEY.to_string(), json!("peer"));
            assert_eq!(route_for(&e), Route::Direct(UserId::new("peer").unwrap()));
        }
    }

    #[test]
    fn untargeted_signaling_goes_to_the_rest_of_the_room() {
        assert_eq!(
            route_for(&event(EventType::RtcOffer)),
            Route::BroadcastExceptAuthor
        );
    }

    #[test]
    fn signaling_to_an_empty_target_is_unreachable() {
        let mut e = event(EventType::RtcOffer);
        e.data.insert(TARGET_USER_KEY.to_string(), json!(""));
        assert_eq!(route_for(&e), Route::Unreachable);
    }

    #[test]
    fn call_lifecycle_and_unknown_types_include_the_author() {
        for kind in [
            EventType::StartCall,
            EventType::EndCall,
            EventType::CallDeclined,
            EventType::Join,
            EventType::Other("reaction".into()),
        ] {
            assert_eq!(route_for(&event(kind)), Route::Broadcast);
        }
    }
}
