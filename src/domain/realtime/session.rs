//! Session identity and lifecycle.
//!
//! From the hub's point of view a session moves
//! `Unregistered -> Admitted -> Dismissed`. Dismissal is terminal and can be
//! triggered by several causes, all named by [`DisconnectReason`].

use std::fmt;

use crate::domain::foundation::{AuthenticatedUser, RoomId, SessionId, StateMachine};

/// Who a session is and which room it is bound to for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub id: SessionId,
    pub user: AuthenticatedUser,
    pub room_id: RoomId,
}

impl SessionIdentity {
    pub fn new(id: SessionId, user: AuthenticatedUser, room_id: RoomId) -> Self {
        Self { id, user, room_id }
    }
}

/// Lifecycle of a session as seen by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unregistered,
    Admitted,
    Dismissed,
}

impl StateMachine for SessionState {
    fn can_transition_to(&self, target: &Self) -> bool {
        matches!(
            (self, target),
            (SessionState::Unregistered, SessionState::Admitted)
                | (SessionState::Unregistered, SessionState::Dismissed)
                | (SessionState::Admitted, SessionState::Dismissed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            SessionState::Unregistered => vec![SessionState::Admitted, SessionState::Dismissed],
            SessionState::Admitted => vec![SessionState::Dismissed],
            SessionState::Dismissed => vec![],
        }
    }
}

/// Why a session was dismissed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The client sent a close frame or the stream ended.
    ClientClosed,
    /// The transport returned an error while reading.
    ReadFailed,
    /// A frame could not be decoded as an event.
    Malformed,
    /// A frame exceeded the configured size limit.
    MessageTooLarge,
    /// No liveness acknowledgment arrived within the read deadline.
    IdleTimeout,
    /// A write or keepalive ping failed or missed its deadline.
    WriteFailed,
    /// The outbound queue was full when the hub tried to deliver.
    SlowConsumer,
    /// The outbound pump is gone, so nobody drains the queue.
    OutboundGone,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::ClientClosed => "client_closed",
            DisconnectReason::ReadFailed => "read_failed",
            DisconnectReason::Malformed => "malformed",
            DisconnectReason::MessageTooLarge => "message_too_large",
            DisconnectReason::IdleTimeout => "idle_timeout",
            DisconnectReason::WriteFailed => "write_failed",
            DisconnectReason::SlowConsumer => "slow_consumer",
            DisconnectReason::OutboundGone => "outbound_gone",
        }
    }

    /// True for the causes the hub detects itself while delivering.
    pub fn is_eviction(&self) -> bool {
        matches!(
            self,
            DisconnectReason::SlowConsumer | DisconnectReason::OutboundGone
        )
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
