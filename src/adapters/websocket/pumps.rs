//! The two per-connection loops.
//!
//! - the inbound pump reads frames, stamps them with the session identity
//!   and offers them to the hub's dispatch queue
//! - the outbound pump writes queued events and keepalive pings
//!
//! Both are generic over the socket halves so they can be driven by
//! in-memory channels. [`drive_session`] runs the pair and makes sure the
//! session is dismissed whichever side fails first.

use std::fmt::Display;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::domain::foundation::Timestamp;
use crate::domain::realtime::{DisconnectReason, InboundFrame, RoomEvent, SessionIdentity};

use super::hub::{HubError, HubHandle};

/// Deadlines and limits for one connection.
#[derive(Debug, Clone)]
pub struct PumpConfig {
    /// How long a read may wait; renewed by every pong.
    pub pong_wait: Duration,
    /// Interval between keepalive pings. Must be shorter than `pong_wait`.
    pub ping_period: Duration,
    /// Bound on every single write.
    pub write_wait: Duration,
    pub max_message_bytes: usize,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            pong_wait: Duration::from_secs(60),
            ping_period: Duration::from_secs(54),
            write_wait: Duration::from_secs(10),
            max_message_bytes: 64 * 1024,
        }
    }
}

/// A failed read or write.
#[derive(Debug, Error)]
pub enum PumpError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("deadline exceeded")]
    Timeout,

    #[error("message of {size} bytes exceeds limit of {limit}")]
    MessageTooLarge { size: usize, limit: usize },

    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("unsupported frame type")]
    UnsupportedFrame,
}

impl PumpError {
    /// Disconnect reason when this error ends the read loop.
    pub fn read_reason(&self) -> DisconnectReason {
        match self {
            PumpError::Transport(_) => DisconnectReason::ReadFailed,
            PumpError::Timeout => DisconnectReason::IdleTimeout,
            PumpError::MessageTooLarge { .. } => DisconnectReason::MessageTooLarge,
            PumpError::Malformed(_) | PumpError::UnsupportedFrame => DisconnectReason::Malformed,
        }
    }
}

/// What a single transport message means to the read loop.
enum Inbound {
    Event(InboundFrame),
    Pong,
    Ignored,
    Closed,
}

fn decode(message: Message, max_bytes: usize) -> Result<Inbound, PumpError> {
    match message {
        Message::Text(text) => {
            if text.len() > max_bytes {
                return Err(PumpError::MessageTooLarge {
                    size: text.len(),
                    limit: max_bytes,
                });
            }
            serde_json::from_str(&text)
                .map(Inbound::Event)
                .map_err(|e| PumpError::Malformed(e.to_string()))
        }
        Message::Binary(_) => Err(PumpError::UnsupportedFrame),
        Message::Pong(_) => Ok(Inbound::Pong),
        // answered by the transport
        Message::Ping(_) => Ok(Inbound::Ignored),
        Message::Close(_) => Ok(Inbound::Closed),
    }
}

/// Reads until the client goes away or misbehaves.
///
/// Every parsed frame is stamped with `identity` and offered to the hub
/// without waiting; if the dispatch queue is full the event is dropped.
pub async fn inbound_pump<S>(
    mut stream: S,
    identity: &SessionIdentity,
    hub: &HubHandle,
    config: &PumpConfig,
) -> DisconnectReason
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let mut deadline = Instant::now() + config.pong_wait;

    loop {
        let message = match tokio::time::timeout_at(deadline, stream.next()).await {
            Err(_) => return PumpError::Timeout.read_reason(),
            Ok(None) => return DisconnectReason::ClientClosed,
            Ok(Some(Err(e))) => {
                tracing::debug!(session_id = %identity.id, error = %e, "read failed");
                return PumpError::Transport(e.to_string()).read_reason();
            }
            Ok(Some(Ok(message))) => message,
        };

        let frame = match decode(message, config.max_message_bytes) {
            Ok(Inbound::Event(frame)) => frame,
            Ok(Inbound::Pong) => {
                deadline = Instant::now() + config.pong_wait;
                continue;
            }
            Ok(Inbound::Ignored) => continue,
            Ok(Inbound::Closed) => return DisconnectReason::ClientClosed,
            Err(e) => {
                tracing::debug!(session_id = %identity.id, error = %e, "rejecting inbound frame");
                return e.read_reason();
            }
        };

        let event = RoomEvent::stamp(frame, identity, Timestamp::now());
        match hub.try_dispatch(event) {
            Ok(()) => {}
            Err(HubError::DispatchQueueFull) => {
                tracing::debug!(session_id = %identity.id, "dispatch queue full, dropping event");
            }
            Err(HubError::Stopped) => return DisconnectReason::ReadFailed,
        }
    }
}

async fn write<S>(sink: &mut S, message: Message, wait: Duration) -> Result<(), PumpError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    match tokio::time::timeout(wait, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(PumpError::Transport(e.to_string())),
        Err(_) => Err(PumpError::Timeout),
    }
}

/// Writes queued events and periodic pings.
///
/// Returns `None` when the hub closed the queue (a close frame has been
/// sent), or the reason the pump gave up on the transport.
pub async fn outbound_pump<S>(
    mut sink: S,
    mut queue: mpsc::Receiver<RoomEvent>,
    config: &PumpConfig,
) -> Option<DisconnectReason>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut ping = tokio::time::interval_at(Instant::now() + config.ping_period, config.ping_period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let message = tokio::select! {
            event = queue.recv() => match event {
                Some(event) => match serde_json::to_string(&event) {
                    Ok(json) => Message::Text(json),
                    Err(e) => {
                        tracing::error!(error = %e, "failed to encode event, skipping");
                        continue;
                    }
                },
                None => {
                    let _ = write(&mut sink, Message::Close(None), config.write_wait).await;
                    return None;
                }
            },
            _ = ping.tick() => Message::Ping(Vec::new()),
        };

        if let Err(e) = write(&mut sink, message, config.write_wait).await {
            tracing::debug!(error = %e, "write failed");
            return Some(DisconnectReason::WriteFailed);
        }
    }
}

/// Runs both pumps for an admitted session until they converge.
///
/// If reading stops first the session is unregistered and the outbound
/// pump is left to flush and send its close frame. If writing stops first
/// the session is unregistered and reading is abandoned.
pub async fn drive_session<St, Si>(
    stream: St,
    sink: Si,
    queue: mpsc::Receiver<RoomEvent>,
    identity: SessionIdentity,
    hub: HubHandle,
    config: PumpConfig,
) where
    St: Stream<Item = Result<Message, axum::Error>> + Unpin,
    Si: Sink<Message> + Unpin,
    Si::Error: Display,
{
    let inbound = inbound_pump(stream, &identity, &hub, &config);
    let outbound = outbound_pump(sink, queue, &config);
    tokio::pin!(inbound);
    tokio::pin!(outbound);

    tokio::select! {
        reason = &mut inbound => {
            tracing::debug!(session_id = %identity.id, %reason, "inbound pump finished");
            if hub.unregister(identity.id, reason).await.is_ok() {
                outbound.await;
            }
        }
        result = &mut outbound => {
            if let Some(reason) = result {
                tracing::debug!(session_id = %identity.id, %reason, "outbound pump finished");
                let _ = hub.unregister(identity.id, reason).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::history::InMemoryChatHistory;
    use crate::adapters::websocket::hub::{Hub, HubConfig};
    use crate::adapters::websocket::session::open_session;
    use crate::domain::foundation::{AuthenticatedUser, RoomId, SessionId, UserId};
    use crate::domain::realtime::EventType;
    use futures::channel::mpsc as fmpsc;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};

    fn identity(user: &str) -> SessionIdentity {
        SessionIdentity::new(
            SessionId::new(),
            AuthenticatedUser::new(UserId::new(user).unwrap(), user),
            RoomId::new("room-a").unwrap(),
        )
    }

    fn spawn_hub() -> HubHandle {
        Hub::spawn(HubConfig::default(), Arc::new(InMemoryChatHistory::new()))
    }

    /// Admits a listener in room-a and returns its queue once admission is visible.
    async fn listener(hub: &HubHandle) -> mpsc::Receiver<RoomEvent> {
        let id = identity("listener");
        let (handle, rx) = open_session(id.clone(), 64);
        hub.register(handle).await.unwrap();
        while !hub.is_admitted(&id.id).await {
            tokio::task::yield_now().await;
        }
        rx
    }

    fn text(value: &str) -> Result<Message, axum::Error> {
        Ok(Message::Text(value.to_string()))
    }

    #[tokio::test]
    async fn inbound_stamps_and_dispatches_frames() {
        let hub = spawn_hub();
        let mut seen = listener(&hub).await;
        let alice = identity("alice");
        let (tx, rx) = fmpsc::unbounded();

        tx.unbounded_send(text(r#"{"type":"chat","content":"hi","userId":"mallory"}"#))
            .unwrap();
        tx.unbounded_send(Ok(Message::Close(None))).unwrap();

        let reason = inbound_pump(rx, &alice, &hub, &PumpConfig::default()).await;
        assert_eq!(reason, DisconnectReason::ClientClosed);

        let event = seen.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::Chat);
        assert_eq!(event.user_id.as_str(), "alice");
        assert_eq!(event.content, "hi");
    }

    #[tokio::test]
    async fn inbound_rejects_malformed_json() {
        let hub = spawn_hub();
        let (tx, rx) = fmpsc::unbounded();
        tx.unbounded_send(text("{not json")).unwrap();

        let reason = inbound_pump(rx, &identity("a"), &hub, &PumpConfig::default()).await;
        assert_eq!(reason, DisconnectReason::Malformed);
    }

    #[tokio::test]
    async fn inbound_rejects_binary_frames() {
        let hub = spawn_hub();
        let (tx, rx) = fmpsc::unbounded();
        tx.unbounded_send(Ok(Message::Binary(vec![1, 2, 3]))).unwrap();

        let reason = inbound_pump(rx, &identity("a"), &hub, &PumpConfig::default()).await;
        assert_eq!(reason, DisconnectReason::Malformed);
    }

    #[tokio::test]
    async fn inbound_enforces_message_limit() {
        let hub = spawn_hub();
        let config = PumpConfig {
            max_message_bytes: 16,
            ..PumpConfig::default()
        };
        let (tx, rx) = fmpsc::unbounded();
        tx.unbounded_send(text(r#"{"type":"chat","content":"far too long"}"#))
            .unwrap();

        let reason = inbound_pump(rx, &identity("a"), &hub, &config).await;
        assert_eq!(reason, DisconnectReason::MessageTooLarge);
    }

    #[tokio::test]
    async fn inbound_reports_transport_errors() {
        let hub = spawn_hub();
        let (tx, rx) = fmpsc::unbounded();
        tx.unbounded_send(Err(axum::Error::new(std::io::Error::other("reset"))))
            .unwrap();

        let reason = inbound_pump(rx, &identity("a"), &hub, &PumpConfig::default()).await;
        assert_eq!(reason, DisconnectReason::ReadFailed);
    }

    #[tokio::test]
    async fn inbound_ends_when_stream_ends() {
        let hub = spawn_hub();
        let (tx, rx) = fmpsc::unbounded::<Result<Message, axum::Error>>();
        drop(tx);

        let reason = inbound_pump(rx, &identity("a"), &hub, &PumpConfig::default()).await;
        assert_eq!(reason, DisconnectReason::ClientClosed);
    }

    #[tokio::test(start_paused = true)]
    async fn inbound_times_out_without_pongs() {
        let hub = spawn_hub();
        let (_tx, rx) = fmpsc::unbounded::<Result<Message, axum::Error>>();
        let start = Instant::now();

        let reason = inbound_pump(rx, &identity("a"), &hub, &PumpConfig::default()).await;

        assert_eq!(reason, DisconnectReason::IdleTimeout);
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn pong_renews_read_deadline() {
        let hub = spawn_hub();
        let (tx, rx) = fmpsc::unbounded();
        let start = Instant::now();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(50)).await;
            tx.unbounded_send(Ok(Message::Pong(Vec::new()))).unwrap();
            // keep the stream open past the renewed deadline
            tokio::time::sleep(Duration::from_secs(120)).await;
            drop(tx);
        });

        let reason = inbound_pump(rx, &identity("a"), &hub, &PumpConfig::default()).await;

        assert_eq!(reason, DisconnectReason::IdleTimeout);
        assert!(start.elapsed() >= Duration::from_secs(110));
    }

    #[tokio::test(start_paused = true)]
    async fn text_frames_do_not_renew_read_deadline() {
        let hub = spawn_hub();
        let (tx, rx) = fmpsc::unbounded();
        let start = Instant::now();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(50)).await;
            tx.unbounded_send(text(r#"{"type":"typing"}"#)).unwrap();
            tokio::time::sleep(Duration::from_secs(120)).await;
            drop(tx);
        });

        let reason = inbound_pump(rx, &identity("a"), &hub, &PumpConfig::default()).await;

        assert_eq!(reason, DisconnectReason::IdleTimeout);
        assert!(start.elapsed() < Duration::from_secs(61));
    }

    #[tokio::test]
    async fn outbound_writes_events_then_closes() {
        let id = identity("a");
        let (handle, queue) = open_session(id.clone(), 8);
        let (sink, mut written) = fmpsc::unbounded::<Message>();

        handle.try_deliver(RoomEvent::user_online(&id)).unwrap();
        drop(handle);

        let result = outbound_pump(sink, queue, &PumpConfig::default()).await;
        assert_eq!(result, None);

        match written.next().await {
            Some(Message::Text(json)) => assert!(json.contains(r#""type":"user_online""#)),
            other => panic!("expected text frame, got {other:?}"),
        }
        assert!(matches!(written.next().await, Some(Message::Close(None))));
    }

    #[tokio::test(start_paused = true)]
    async fn outbound_sends_keepalive_pings() {
        let (handle, queue) = open_session(identity("a"), 8);
        let (sink, mut written) = fmpsc::unbounded::<Message>();
        let start = Instant::now();

        let pump = tokio::spawn(async move {
            outbound_pump(sink, queue, &PumpConfig::default()).await
        });

        assert!(matches!(written.next().await, Some(Message::Ping(_))));
        assert!(start.elapsed() >= Duration::from_secs(54));

        drop(handle);
        assert_eq!(pump.await.unwrap(), None);
    }

    #[tokio::test]
    async fn outbound_reports_write_failure() {
        let id = identity("a");
        let (handle, queue) = open_session(id.clone(), 8);
        let (sink, written) = fmpsc::unbounded::<Message>();
        drop(written);

        handle.try_deliver(RoomEvent::user_online(&id)).unwrap();

        let result = outbound_pump(sink, queue, &PumpConfig::default()).await;
        assert_eq!(result, Some(DisconnectReason::WriteFailed));
    }

    /// A transport that never becomes writable.
    struct StalledSink;

    impl Sink<Message> for StalledSink {
        type Error = std::convert::Infallible;

        fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }

        fn start_send(self: Pin<&mut Self>, _item: Message) -> Result<(), Self::Error> {
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_write_fails_after_write_wait() {
        let id = identity("a");
        let (handle, queue) = open_session(id.clone(), 8);
        handle.try_deliver(RoomEvent::user_online(&id)).unwrap();
        let start = Instant::now();

        let result = outbound_pump(StalledSink, queue, &PumpConfig::default()).await;

        assert_eq!(result, Some(DisconnectReason::WriteFailed));
        assert!(start.elapsed() >= Duration::from_secs(10));
        assert!(start.elapsed() < Duration::from_secs(54));
        drop(handle);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_ping_fails_after_write_wait() {
        let (handle, queue) = open_session(identity("a"), 8);
        let start = Instant::now();

        let result = outbound_pump(StalledSink, queue, &PumpConfig::default()).await;

        assert_eq!(result, Some(DisconnectReason::WriteFailed));
        assert!(start.elapsed() >= Duration::from_secs(64));
        drop(handle);
    }

    #[tokio::test]
    async fn inbound_keeps_reading_when_dispatch_queue_is_full() {
        let config = HubConfig {
            dispatch_capacity: 1,
            ..HubConfig::default()
        };
        // worker never runs, so the queue fills after one event
        let (_idle_hub, hub) = Hub::new(config, Arc::new(InMemoryChatHistory::new()));
        let alice = identity("alice");
        let (tx, rx) = fmpsc::unbounded();
        for content in ["one", "two", "three"] {
            tx.unbounded_send(text(&format!(r#"{{"type":"chat","content":"{content}"}}"#)))
                .unwrap();
        }
        tx.unbounded_send(Ok(Message::Close(None))).unwrap();

        let reason = inbound_pump(rx, &alice, &hub, &PumpConfig::default()).await;

        assert_eq!(reason, DisconnectReason::ClientClosed);
        assert_eq!(
            hub.try_dispatch(RoomEvent::user_online(&alice)),
            Err(HubError::DispatchQueueFull)
        );
    }

    #[tokio::test]
    async fn client_close_dismisses_session() {
        let hub = spawn_hub();
        let mut seen = listener(&hub).await;
        let alice = identity("alice");
        let (handle, queue) = open_session(alice.clone(), 8);
        hub.register(handle).await.unwrap();

        let (tx, stream) = fmpsc::unbounded();
        let (sink, mut written) = fmpsc::unbounded::<Message>();
        tx.unbounded_send(Ok(Message::Close(None))).unwrap();

        drive_session(stream, sink, queue, alice.clone(), hub.clone(), PumpConfig::default())
            .await;

        assert!(!hub.is_admitted(&alice.id).await);
        assert_eq!(seen.recv().await.unwrap().event_type, EventType::UserOnline);
        assert_eq!(seen.recv().await.unwrap().event_type, EventType::UserOffline);
        // the hub closed the queue, so the outbound side said goodbye
        let mut frames = Vec::new();
        while let Some(frame) = written.next().await {
            frames.push(frame);
        }
        assert!(matches!(frames.last(), Some(Message::Close(None))));
    }

    #[tokio::test]
    async fn write_failure_dismisses_session() {
        let hub = spawn_hub();
        let mut seen = listener(&hub).await;
        let alice = identity("alice");
        let (handle, queue) = open_session(alice.clone(), 8);
        hub.register(handle).await.unwrap();

        let (_tx, stream) = fmpsc::unbounded::<Result<Message, axum::Error>>();
        let (sink, written) = fmpsc::unbounded::<Message>();
        drop(written);

        // anything sent to alice now fails to write
        let bob = identity("bob");
        let (bob_handle, _bob_rx) = open_session(bob, 8);
        hub.register(bob_handle).await.unwrap();

        drive_session(stream, sink, queue, alice.clone(), hub.clone(), PumpConfig::default())
            .await;

        assert_eq!(seen.recv().await.unwrap().event_type, EventType::UserOnline);
        while hub.is_admitted(&alice.id).await {
            tokio::task::yield_now().await;
        }
    }
}
