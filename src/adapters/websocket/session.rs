//! Hub-side handle for one live connection.
//!
//! The handle owns the only sender of the session's outbound queue, so the
//! queue closes exactly when the handle is closed (or dropped). The matching
//! receiver goes to the session's outbound pump.

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::domain::foundation::{SessionId, StateMachine, ValidationError};
use crate::domain::realtime::{DisconnectReason, RoomEvent, SessionIdentity, SessionState};

/// Why an event could not be placed on an outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The queue is at capacity.
    Full,
    /// The queue was closed, or its receiver is gone.
    Closed,
}

impl DeliveryError {
    /// Eviction cause when a broadcast delivery fails.
    pub fn disconnect_reason(&self) -> DisconnectReason {
        match self {
            DeliveryError::Full => DisconnectReason::SlowConsumer,
            DeliveryError::Closed => DisconnectReason::OutboundGone,
        }
    }
}

/// Hub-side view of a session.
#[derive(Debug)]
pub struct SessionHandle {
    identity: SessionIdentity,
    outbound: Option<mpsc::Sender<RoomEvent>>,
    state: SessionState,
    admission: u64,
}

/// Creates a session handle and the receiving end of its outbound queue.
pub fn open_session(
    identity: SessionIdentity,
    queue_capacity: usize,
) -> (SessionHandle, mpsc::Receiver<RoomEvent>) {
    let (tx, rx) = mpsc::channel(queue_capacity.max(1));
    let handle = SessionHandle {
        identity,
        outbound: Some(tx),
        state: SessionState::Unregistered,
        admission: 0,
    };
    (handle, rx)
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.identity.id
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Admission order; later admissions have larger values.
    pub fn admission(&self) -> u64 {
        self.admission
    }

    pub(crate) fn admit(&mut self, admission: u64) -> Result<(), ValidationError> {
        self.state = self.state.transition_to(SessionState::Admitted)?;
        self.admission = admission;
        Ok(())
    }

    /// Non-blocking enqueue onto the outbound queue.
    pub fn try_deliver(&self, event: RoomEvent) -> Result<(), DeliveryError> {
        let Some(tx) = &self.outbound else {
            return Err(DeliveryError::Closed);
        };
        tx.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Full,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Closes the outbound queue and marks the session dismissed.
    ///
    /// Returns `true` only for the call that actually closed the queue.
    pub fn close(&mut self) -> bool {
        let Some(tx) = self.outbound.take() else {
            return false;
        };
        drop(tx);
        self.state = SessionState::Dismissed;
        true
    }
}
