//! Room event envelope.
//!
//! Every event that crosses the hub is a [`RoomEvent`]. Clients only ever
//! send an [`InboundFrame`]; the identity and room fields of a `RoomEvent`
//! are filled from the session by [`RoomEvent::stamp`], so nothing the
//! client claims about who it is survives parsing.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::foundation::{RoomId, Timestamp, UserId};

use super::session::SessionIdentity;

/// Payload key naming the recipient of a signaling event.
pub const TARGET_USER_KEY: &str = "targetUserId";

/// Event types understood by the hub.
///
/// Unknown strings are preserved in [`EventType::Other`] and routed with the
/// default broadcast rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    Join,
    Leave,
    Chat,
    Typing,
    StopTyping,
    UserOnline,
    UserOffline,
    Error,
    Success,
    RtcOffer,
    RtcAnswer,
    RtcCandidate,
    StartCall,
    EndCall,
    CallDeclined,
    Other(String),
}

impl EventType {
    /// Wire name of the event type.
    pub fn as_str(&self) -> &str {
        match self {
            EventType::Join => "join",
            EventType::Leave => "leave",
            EventType::Chat => "chat",
            EventType::Typing => "typing",
            EventType::StopTyping => "stop_typing",
            EventType::UserOnline => "user_online",
            EventType::UserOffline => "user_offline",
            EventType::Error => "error",
            EventType::Success => "success",
            EventType::RtcOffer => "rtc_offer",
            EventType::RtcAnswer => "rtc_answer",
            EventType::RtcCandidate => "rtc_candidate",
            EventType::StartCall => "start_call",
            EventType::EndCall => "end_call",
            EventType::CallDeclined => "call_declined",
            EventType::Other(other) => other,
        }
    }

    /// Offer/answer/candidate exchange for peer connections.
    pub fn is_signaling(&self) -> bool {
        matches!(
            self,
            EventType::RtcOffer | EventType::RtcAnswer | EventType::RtcCandidate
        )
    }

    /// Call start/end/declined notifications.
    pub fn is_call_lifecycle(&self) -> bool {
        matches!(
            self,
            EventType::StartCall | EventType::EndCall | EventType::CallDeclined
        )
    }
}

impl From<String> for EventType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "join" => EventType::Join,
            "leave" => EventType::Leave,
            "chat" => EventType::Chat,
            "typing" => EventType::Typing,
            "stop_typing" => EventType::StopTyping,
            "user_online" => EventType::UserOnline,
            "user_offline" => EventType::UserOffline,
            "error" => EventType::Error,
            "success" => EventType::Success,
            "rtc_offer" => EventType::RtcOffer,
            "rtc_answer" => EventType::RtcAnswer,
            "rtc_candidate" => EventType::RtcCandidate,
            "start_call" => EventType::StartCall,
            "end_call" => EventType::EndCall,
            "call_declined" => EventType::CallDeclined,
            _ => EventType::Other(value),
        }
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        match value {
            EventType::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A frame as sent by a client.
///
/// Only the fields a client is allowed to choose are read. `roomId`,
/// `userId`, `username` and `timestamp` are ignored if present.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundFrame {
    #[serde(rename = "type")]
    pub event_type: EventType,

    #[serde(default)]
    pub content: Option<String>,

    #[serde(default)]
    pub data: Option<Map<String, Value>>,
}

/// The envelope the hub routes and clients receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,

    pub room_id: RoomId,

    pub user_id: UserId,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,

    pub timestamp: Timestamp,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

impl RoomEvent {
    /// Builds the routable event from a client frame.
    ///
    /// Room, user, username and timestamp always come from the session.
    pub fn stamp(frame: InboundFrame, identity: &SessionIdentity, now: Timestamp) -> Self {
        Self {
            event_type: frame.event_type,
            room_id: identity.room_id.clone(),
            user_id: identity.user.id.clone(),
            username: identity.user.username.clone(),
            content: frame.content.unwrap_or_default(),
            timestamp: now,
            data: frame.data.unwrap_or_default(),
        }
    }

    /// "user online" announcement for a newly admitted session.
    pub fn user_online(identity: &SessionIdentity) -> Self {
        Self::presence(EventType::UserOnline, identity)
    }

    /// "user offline" announcement for a dismissed session.
    pub fn user_offline(identity: &SessionIdentity) -> Self {
        Self::presence(EventType::UserOffline, identity)
    }

    fn presence(event_type: EventType, identity: &SessionIdentity) -> Self {
        Self {
            event_type,
            room_id: identity.room_id.clone(),
            user_id: identity.user.id.clone(),
            username: identity.user.username.clone(),
            content: String::new(),
            timestamp: Timestamp::now(),
            data: Map::new(),
        }
    }

    /// Recipient named in the payload, if any.
    ///
    /// Any string counts as a named recipient, even one that can never
    /// match a session. Only a missing or non-string value means "no target".
    pub fn target_user_id(&self) -> Option<&str> {
        self.data.get(TARGET_USER_KEY).and_then(Value::as_str)
    }
}
