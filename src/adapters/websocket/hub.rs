//! The hub: sole writer of the room registry and sole arbiter of delivery.
//!
//! # Two paths into the same state
//!
//! ```text
//!   pumps ──register/unregister/dispatch──▶ bounded queues ──▶ Hub worker
//!                                                               │ write lock
//!                                                               ▼
//!   HTTP handlers ──online_users()──── read lock ─────────▶ RoomRegistry
//! ```
//!
//! Every mutation (admit, dismiss, dispatch) is a message processed one at
//! a time by the worker, so membership changes and routing decisions are
//! totally ordered. Readers outside the worker go through [`HubHandle`]'s
//! lock-guarded accessors and can never write.
//!
//! Locks are only held for in-memory work. Outbound deliveries are
//! `try_send`, and history appends run on their own task.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, RwLock};

use crate::domain::foundation::{AuthenticatedUser, RoomId, SessionId, UserId};
use crate::domain::realtime::{route_for, ChatRecord, DisconnectReason, RoomEvent, Route};
use crate::ports::ChatHistory;

use super::rooms::RoomRegistry;
use super::session::SessionHandle;

/// Queue sizes and timeouts for the hub worker.
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub register_capacity: usize,
    pub unregister_capacity: usize,
    pub dispatch_capacity: usize,
    /// Upper bound on a single history append.
    pub history_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            register_capacity: 100,
            unregister_capacity: 100,
            dispatch_capacity: 1000,
            history_timeout: Duration::from_secs(5),
        }
    }
}

/// Errors returned to callers of [`HubHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HubError {
    #[error("hub worker has stopped")]
    Stopped,

    #[error("dispatch queue is full")]
    DispatchQueueFull,
}

#[derive(Debug)]
struct Unregister {
    session_id: SessionId,
    reason: DisconnectReason,
}

/// Which sessions a broadcast skips.
#[derive(Debug, Clone)]
enum Skip {
    Nobody,
    Session(SessionId),
    User(UserId),
}

impl Skip {
    fn skips(&self, handle: &SessionHandle) -> bool {
        match self {
            Skip::Nobody => false,
            Skip::Session(id) => handle.id() == *id,
            Skip::User(user) => &handle.identity().user.id == user,
        }
    }
}

/// The hub worker. Run it with [`Hub::run`] or use [`Hub::spawn`].
pub struct Hub {
    registry: Arc<RwLock<RoomRegistry>>,
    history: Arc<dyn ChatHistory>,
    history_timeout: Duration,
    register_rx: mpsc::Receiver<SessionHandle>,
    unregister_rx: mpsc::Receiver<Unregister>,
    dispatch_rx: mpsc::Receiver<RoomEvent>,
}

/// Cloneable front door to the hub.
#[derive(Clone)]
pub struct HubHandle {
    registry: Arc<RwLock<RoomRegistry>>,
    register_tx: mpsc::Sender<SessionHandle>,
    unregister_tx: mpsc::Sender<Unregister>,
    dispatch_tx: mpsc::Sender<RoomEvent>,
}

impl Hub {
    /// Builds a worker and its handle without starting the worker.
    pub fn new(config: HubConfig, history: Arc<dyn ChatHistory>) -> (Self, HubHandle) {
        let registry = Arc::new(RwLock::new(RoomRegistry::new()));
        let (register_tx, register_rx) = mpsc::channel(config.register_capacity.max(1));
        let (unregister_tx, unregister_rx) = mpsc::channel(config.unregister_capacity.max(1));
        let (dispatch_tx, dispatch_rx) = mpsc::channel(config.dispatch_capacity.max(1));

        let hub = Self {
            registry: registry.clone(),
            history,
            history_timeout: config.history_timeout,
            register_rx,
            unregister_rx,
            dispatch_rx,
        };
        let handle = HubHandle {
            registry,
            register_tx,
            unregister_tx,
            dispatch_tx,
        };
        (hub, handle)
    }

    /// Builds the hub and runs its worker on the current runtime.
    pub fn spawn(config: HubConfig, history: Arc<dyn ChatHistory>) -> HubHandle {
        let (hub, handle) = Self::new(config, history);
        tokio::spawn(hub.run());
        handle
    }

    /// Processes requests until every [`HubHandle`] has been dropped.
    ///
    /// Registrations are taken before unregistrations, and both before
    /// dispatches, whenever several are ready at once.
    ///
    /// The three requests travel on separate queues, so send order alone
    /// does not put a session's admission ahead of its first event; the
    /// priority does. The cost is that a sustained burst of registrations
    /// holds dispatch back until the register queue drains.
    pub async fn run(mut self) {
        tracing::info!("hub worker started");
        loop {
            tokio::select! {
                biased;
                Some(handle) = self.register_rx.recv() => self.admit(handle).await,
                Some(req) = self.unregister_rx.recv() => {
                    self.dismiss(req.session_id, req.reason).await;
                }
                Some(event) = self.dispatch_rx.recv() => self.dispatch(event).await,
                else => break,
            }
        }
        tracing::info!("hub worker stopped");
    }

    async fn admit(&self, handle: SessionHandle) {
        let identity = handle.identity().clone();
        let mut registry = self.registry.write().await;

        if !registry.insert(handle) {
            tracing::debug!(session_id = %identity.id, "session already admitted or closed, ignoring");
            return;
        }

        tracing::info!(
            session_id = %identity.id,
            user_id = %identity.user.id,
            room_id = %identity.room_id,
            members = registry.member_count(&identity.room_id),
            "session admitted"
        );

        let online = RoomEvent::user_online(&identity);
        let failed = fan_out(&registry, &online, &Skip::Session(identity.id));
        evict(&mut registry, failed);
    }

    async fn dismiss(&self, session_id: SessionId, reason: DisconnectReason) {
        let mut registry = self.registry.write().await;
        if !registry.contains(&session_id) {
            tracing::trace!(%session_id, %reason, "session already dismissed");
            return;
        }
        evict(&mut registry, vec![(session_id, reason)]);
    }

    async fn dispatch(&self, event: RoomEvent) {
        let route = route_for(&event);

        if route == Route::PersistAndBroadcast {
            self.persist(&event);
        }

        let mut registry = self.registry.write().await;
        let failed = match route {
            Route::PersistAndBroadcast | Route::Broadcast => {
                fan_out(&registry, &event, &Skip::Nobody)
            }
            Route::BroadcastExceptAuthor => {
                fan_out(&registry, &event, &Skip::User(event.user_id.clone()))
            }
            Route::Direct(target) => {
                deliver_direct(&registry, &target, event);
                Vec::new()
            }
            Route::Unreachable => {
                tracing::debug!(event_type = %event.event_type, "signaling target invalid, dropping");
                Vec::new()
            }
        };
        evict(&mut registry, failed);
    }

    /// Fire-and-forget append; the outcome is only logged.
    fn persist(&self, event: &RoomEvent) {
        let record = ChatRecord::from_event(event);
        let history = self.history.clone();
        let timeout = self.history_timeout;

        tokio::spawn(async move {
            match tokio::time::timeout(timeout, history.append(&record)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(room_id = %record.room_id, error = %e, "failed to save chat message");
                }
                Err(_) => {
                    tracing::error!(room_id = %record.room_id, "saving chat message timed out");
                }
            }
        });
    }
}

/// Delivers to every room member not skipped; returns the failures.
fn fan_out(
    registry: &RoomRegistry,
    event: &RoomEvent,
    skip: &Skip,
) -> Vec<(SessionId, DisconnectReason)> {
    registry
        .members(&event.room_id)
        .filter(|handle| !skip.skips(handle))
        .filter_map(|handle| {
            handle
                .try_deliver(event.clone())
                .err()
                .map(|e| (handle.id(), e.disconnect_reason()))
        })
        .collect()
}

/// Signaling delivery. A miss or a full queue drops the event; the target
/// is not evicted and the sender is not told.
fn deliver_direct(registry: &RoomRegistry, target: &UserId, event: RoomEvent) {
    let Some(handle) = registry.find_by_user(target) else {
        tracing::debug!(target_user = %target, event_type = %event.event_type, "signaling target not connected, dropping");
        return;
    };
    if let Err(e) = handle.try_deliver(event) {
        tracing::debug!(target_user = %target, error = ?e, "failed to deliver signaling event, dropping");
    }
}

/// The single `Admitted -> Dismissed` transition.
///
/// Removes each session, closes its queue and tells the rest of its room.
/// Announcing can expose further slow consumers; those are worked off the
/// same queue rather than recursively.
fn evict(registry: &mut RoomRegistry, initial: Vec<(SessionId, DisconnectReason)>) {
    let mut pending: VecDeque<_> = initial.into();

    while let Some((session_id, reason)) = pending.pop_front() {
        let Some(mut handle) = registry.remove(&session_id) else {
            continue;
        };
        handle.close();

        let identity = handle.identity();
        if reason.is_eviction() {
            tracing::warn!(
                %session_id,
                user_id = %identity.user.id,
                room_id = %identity.room_id,
                %reason,
                "evicting session"
            );
        } else {
            tracing::info!(
                %session_id,
                user_id = %identity.user.id,
                room_id = %identity.room_id,
                %reason,
                "session dismissed"
            );
        }

        let offline = RoomEvent::user_offline(identity);
        pending.extend(fan_out(registry, &offline, &Skip::Nobody));
    }
}

impl HubHandle {
    /// Hands a new session to the hub for admission.
    ///
    /// Waits for room in the registration queue.
    pub async fn register(&self, handle: SessionHandle) -> Result<(), HubError> {
        self.register_tx
            .send(handle)
            .await
            .map_err(|_| HubError::Stopped)
    }

    /// Asks the hub to dismiss a session. Safe to call more than once.
    pub async fn unregister(
        &self,
        session_id: SessionId,
        reason: DisconnectReason,
    ) -> Result<(), HubError> {
        self.unregister_tx
            .send(Unregister { session_id, reason })
            .await
            .map_err(|_| HubError::Stopped)
    }

    /// Non-blocking enqueue of an event for routing.
    pub fn try_dispatch(&self, event: RoomEvent) -> Result<(), HubError> {
        self.dispatch_tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => HubError::DispatchQueueFull,
            mpsc::error::TrySendError::Closed(_) => HubError::Stopped,
        })
    }

    /// Identities currently online in a room.
    pub async fn online_users(&self, room: &RoomId) -> Vec<AuthenticatedUser> {
        self.registry.read().await.online_users(room)
    }

    /// Number of sessions in a room.
    pub async fn member_count(&self, room: &RoomId) -> usize {
        self.registry.read().await.member_count(room)
    }

    /// Whether a session is currently admitted.
    pub async fn is_admitted(&self, session_id: &SessionId) -> bool {
        self.registry.read().await.contains(session_id)
    }

    /// Rooms that currently have members.
    pub async fn active_rooms(&self) -> Vec<RoomId> {
        self.registry.read().await.active_rooms()
    }

    /// Total admitted sessions.
    pub async fn session_count(&self) -> usize {
        self.registry.read().await.session_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::history::InMemoryChatHistory;
    use crate::adapters::websocket::session::open_session;
    use crate::domain::foundation::Timestamp;
    use crate::domain::realtime::{EventType, InboundFrame, SessionIdentity};
    use serde_json::json;
    use tokio::sync::mpsc::error::TryRecvError;

    fn identity(user: &str, room: &str) -> SessionIdentity {
        SessionIdentity::new(
            SessionId::new(),
            AuthenticatedUser::new(UserId::new(user).unwrap(), user),
            RoomId::new(room).unwrap(),
        )
    }

    fn event(from: &SessionIdentity, value: serde_json::Value) -> RoomEvent {
        let frame: InboundFrame = serde_json::from_value(value).unwrap();
        RoomEvent::stamp(frame, from, Timestamp::now())
    }

    /// Runs the worker for exactly the requests already queued.
    async fn settle(hub: &mut Hub) {
        loop {
            if let Ok(handle) = hub.register_rx.try_recv() {
                hub.admit(handle).await;
            } else if let Ok(req) = hub.unregister_rx.try_recv() {
                hub.dismiss(req.session_id, req.reason).await;
            } else if let Ok(event) = hub.dispatch_rx.try_recv() {
                hub.dispatch(event).await;
            } else {
                break;
            }
        }
    }

    fn hub() -> (Hub, HubHandle, Arc<InMemoryChatHistory>) {
        let history = Arc::new(InMemoryChatHistory::new());
        let (hub, handle) = Hub::new(HubConfig::default(), history.clone());
        (hub, handle, history)
    }

    #[tokio::test]
    async fn admit_announces_to_others_but_not_self() {
        let (mut hub, handle, _) = hub();
        let alice = identity("alice", "a");
        let bob = identity("bob", "a");
        let (h_alice, mut rx_alice) = open_session(alice.clone(), 8);
        let (h_bob, mut rx_bob) = open_session(bob.clone(), 8);

        handle.register(h_alice).await.unwrap();
        settle(&mut hub).await;
        handle.register(h_bob).await.unwrap();
        settle(&mut hub).await;

        let seen = rx_alice.try_recv().unwrap();
        assert_eq!(seen.event_type, EventType::UserOnline);
        assert_eq!(seen.user_id.as_str(), "bob");
        assert!(matches!(rx_alice.try_recv(), Err(TryRecvError::Empty)));
        assert!(matches!(rx_bob.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn dismiss_closes_queue_and_announces_offline() {
        let (mut hub, handle, _) = hub();
        let alice = identity("alice", "a");
        let bob = identity("bob", "a");
        let (h_alice, mut rx_alice) = open_session(alice.clone(), 8);
        let (h_bob, mut rx_bob) = open_session(bob.clone(), 8);
        handle.register(h_alice).await.unwrap();
        handle.register(h_bob).await.unwrap();
        settle(&mut hub).await;
        let _ = rx_alice.try_recv();

        handle
            .unregister(bob.id, DisconnectReason::ClientClosed)
            .await
            .unwrap();
        settle(&mut hub).await;

        assert!(matches!(rx_bob.try_recv(), Err(TryRecvError::Disconnected)));
        let seen = rx_alice.try_recv().unwrap();
        assert_eq!(seen.event_type, EventType::UserOffline);
        assert_eq!(seen.user_id.as_str(), "bob");
    }

    #[tokio::test]
    async fn dismissing_twice_announces_once() {
        let (mut hub, handle, _) = hub();
        let alice = identity("alice", "a");
        let bob = identity("bob", "a");
        let (h_alice, mut rx_alice) = open_session(alice.clone(), 8);
        let (h_bob, _rx_bob) = open_session(bob.clone(), 8);
        handle.register(h_alice).await.unwrap();
        handle.register(h_bob).await.unwrap();
        settle(&mut hub).await;
        let _ = rx_alice.try_recv();

        handle.unregister(bob.id, DisconnectReason::ReadFailed).await.unwrap();
        handle.unregister(bob.id, DisconnectReason::WriteFailed).await.unwrap();
        settle(&mut hub).await;

        assert_eq!(rx_alice.try_recv().unwrap().event_type, EventType::UserOffline);
        assert!(matches!(rx_alice.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn last_member_leaving_removes_room() {
        let (mut hub, handle, _) = hub();
        let alice = identity("alice", "a");
        let (h_alice, _rx) = open_session(alice.clone(), 8);
        handle.register(h_alice).await.unwrap();
        settle(&mut hub).await;
        assert_eq!(handle.active_rooms().await.len(), 1);

        handle.unregister(alice.id, DisconnectReason::ClientClosed).await.unwrap();
        settle(&mut hub).await;

        assert!(handle.active_rooms().await.is_empty());
        assert_eq!(handle.session_count().await, 0);
    }

    #[tokio::test]
    async fn typing_skips_every_session_of_the_author() {
        let (mut hub, handle, _) = hub();
        let alice = identity("alice", "a");
        let bob = identity("bob", "a");
        let (h_alice, mut rx_alice) = open_session(alice.clone(), 8);
        let (h_bob, mut rx_bob) = open_session(bob.clone(), 8);
        handle.register(h_alice).await.unwrap();
        handle.register(h_bob).await.unwrap();
        settle(&mut hub).await;
        while rx_alice.try_recv().is_ok() {}

        handle
            .try_dispatch(event(&alice, json!({"type": "typing"})))
            .unwrap();
        settle(&mut hub).await;

        assert_eq!(rx_bob.try_recv().unwrap().event_type, EventType::Typing);
        assert!(rx_alice.try_recv().is_err());
    }

    #[tokio::test]
    async fn call_lifecycle_includes_author() {
        let (mut hub, handle, _) = hub();
        let alice = identity("alice", "a");
        let (h_alice, mut rx_alice) = open_session(alice.clone(), 8);
        handle.register(h_alice).await.unwrap();
        settle(&mut hub).await;

        handle
            .try_dispatch(event(&alice, json!({"type": "start_call"})))
            .unwrap();
        settle(&mut hub).await;

        assert_eq!(rx_alice.try_recv().unwrap().event_type, EventType::StartCall);
    }

    #[tokio::test]
    async fn queued_registration_is_admitted_before_queued_dispatch() {
        let (hub, handle, _) = hub();
        let alice = identity("alice", "a");
        let (h_alice, mut rx_alice) = open_session(alice.clone(), 8);

        // both requests are waiting before the worker starts
        handle.register(h_alice).await.unwrap();
        handle
            .try_dispatch(event(&alice, json!({"type": "chat", "content": "first"})))
            .unwrap();
        tokio::spawn(hub.run());

        let seen = tokio::time::timeout(Duration::from_secs(2), rx_alice.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seen.content, "first");
    }

    #[tokio::test]
    async fn chat_is_appended_to_history() {
        let (mut hub, handle, history) = hub();
        let alice = identity("alice", "a");
        let (h_alice, mut rx_alice) = open_session(alice.clone(), 8);
        handle.register(h_alice).await.unwrap();
        settle(&mut hub).await;

        handle
            .try_dispatch(event(&alice, json!({"type": "chat", "content": "hi"})))
            .unwrap();
        settle(&mut hub).await;

        assert_eq!(rx_alice.try_recv().unwrap().content, "hi");
        for _ in 0..50 {
            if history.len() == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        let stored = history.query_by_room(&alice.room_id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].content, "hi");
    }

    #[tokio::test]
    async fn failing_history_does_not_block_chat() {
        let history = Arc::new(InMemoryChatHistory::new());
        history.fail_appends(true);
        let (mut hub, handle) = Hub::new(HubConfig::default(), history.clone());
        let alice = identity("alice", "a");
        let (h_alice, mut rx_alice) = open_session(alice.clone(), 8);
        handle.register(h_alice).await.unwrap();
        settle(&mut hub).await;

        handle
            .try_dispatch(event(&alice, json!({"type": "chat", "content": "still here"})))
            .unwrap();
        settle(&mut hub).await;

        assert_eq!(rx_alice.try_recv().unwrap().content, "still here");
    }

    #[tokio::test]
    async fn signaling_full_target_is_not_evicted() {
        let (mut hub, handle, _) = hub();
        let alice = identity("alice", "a");
        let bob = identity("bob", "a");
        let (h_alice, _rx_alice) = open_session(alice.clone(), 8);
        let (h_bob, mut rx_bob) = open_session(bob.clone(), 1);
        handle.register(h_bob).await.unwrap();
        settle(&mut hub).await;
        handle.register(h_alice).await.unwrap();
        settle(&mut hub).await;
        // bob's single slot now holds alice's online event

        handle
            .try_dispatch(event(
                &alice,
                json!({"type": "rtc_offer", "data": {"targetUserId": "bob"}}),
            ))
            .unwrap();
        settle(&mut hub).await;

        assert!(handle.is_admitted(&bob.id).await);
        assert_eq!(rx_bob.try_recv().unwrap().event_type, EventType::UserOnline);
        assert!(rx_bob.try_recv().is_err());
    }

    #[tokio::test]
    async fn eviction_cascades_without_recursion() {
        let (mut hub, handle, _) = hub();
        let talker = identity("talker", "a");
        let slow_1 = identity("slow-1", "a");
        let slow_2 = identity("slow-2", "a");
        let (h_talker, _rx_t) = open_session(talker.clone(), 64);
        let (h_s1, _rx_1) = open_session(slow_1.clone(), 1);
        let (h_s2, _rx_2) = open_session(slow_2.clone(), 1);
        handle.register(h_s1).await.unwrap();
        handle.register(h_s2).await.unwrap();
        settle(&mut hub).await;
        // slow-1 holds slow-2's online event; slow-2's queue is empty
        handle.register(h_talker).await.unwrap();
        settle(&mut hub).await;
        // slow-1's online delivery failed -> evicted; slow-2 got talker online,
        // then slow-1 offline overflowed it -> evicted too

        assert!(handle.is_admitted(&talker.id).await);
        assert!(!handle.is_admitted(&slow_1.id).await);
        assert!(!handle.is_admitted(&slow_2.id).await);
        assert_eq!(handle.member_count(&talker.room_id).await, 1);
    }

    #[tokio::test]
    async fn try_dispatch_reports_full_queue() {
        let history = Arc::new(InMemoryChatHistory::new());
        let config = HubConfig {
            dispatch_capacity: 1,
            ..HubConfig::default()
        };
        let (_hub, handle) = Hub::new(config, history);
        let alice = identity("alice", "a");

        handle
            .try_dispatch(event(&alice, json!({"type": "chat"})))
            .unwrap();
        assert_eq!(
            handle.try_dispatch(event(&alice, json!({"type": "chat"}))),
            Err(HubError::DispatchQueueFull)
        );
    }

    #[tokio::test]
    async fn handle_reports_stopped_worker() {
        let (hub, handle, _) = hub();
        drop(hub);
        let alice = identity("alice", "a");
        let (h_alice, _rx) = open_session(alice.clone(), 1);

        assert_eq!(handle.register(h_alice).await, Err(HubError::Stopped));
        assert_eq!(
            handle.try_dispatch(event(&alice, json!({"type": "chat"}))),
            Err(HubError::Stopped)
        );
    }
}
