//! Per-connection session: one read loop and one write loop.
//!
//! Either loop ending removes the connection from the manager. Removal
//! closes the outbound queue, which makes the write loop send a Close frame
//! and fires the close signal the read loop watches, so the surviving loop
//! always follows. Removal itself happens once. After removal every write
//! is bounded by a short grace period, so a peer that stopped reading cannot
//! hold the writer (and with it the socket) open.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt};
use relay_core::{Envelope, RelayError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, instrument, warn};

use super::connection::ClientConnection;
use super::manager::ConnectionManager;

/// How long a closed connection may keep flushing to a peer that has
/// stopped reading.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Handles to a running session.
pub struct SessionHandle {
    /// The registered connection.
    pub connection: Arc<ClientConnection>,
    /// Inbound loop task.
    pub reader: JoinHandle<()>,
    /// Outbound loop task.
    pub writer: JoinHandle<()>,
}

/// Register an upgraded socket and start its loops.
pub fn admit(socket: WebSocket, manager: Arc<ConnectionManager>) -> SessionHandle {
    let (sink, stream) = socket.split();
    spawn_session(sink, stream, manager)
}

/// Register a connection over any message sink/stream pair and start its
/// loops.
pub fn spawn_session<S, R, E>(
    sink: S,
    stream: R,
    manager: Arc<ConnectionManager>,
) -> SessionHandle
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display + Send,
    R: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: Display + Send + 'static,
{
    let (connection, rx) = manager.register();
    info!(conn_id = %connection.id(), "client connected");

    let reader = {
        let connection = Arc::clone(&connection);
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            let result = read_loop(stream, &connection, &manager).await;
            finish(&manager, &connection, "read", result);
        })
    };

    let writer = {
        let connection = Arc::clone(&connection);
        let ping_interval = manager.config().ping_interval();
        tokio::spawn(async move {
            let result = write_loop(sink, rx, &connection, ping_interval).await;
            finish(&manager, &connection, "write", result);
        })
    };

    SessionHandle {
        connection,
        reader,
        writer,
    }
}

fn finish(
    manager: &ConnectionManager,
    connection: &ClientConnection,
    side: &'static str,
    result: Result<(), RelayError>,
) {
    if let Err(e) = &result {
        debug!(conn_id = %connection.id(), side, kind = e.kind(), error = %e, "loop ended");
    }
    if manager.remove(connection.id()) {
        info!(
            conn_id = %connection.id(),
            side,
            duration_secs = connection.age().as_secs_f64(),
            "client disconnected"
        );
    }
}

/// Read frames until the peer goes away, the read deadline lapses, or the
/// connection is closed.
#[instrument(skip_all, fields(conn_id = %connection.id()))]
async fn read_loop<R, E>(
    mut stream: R,
    connection: &ClientConnection,
    manager: &ConnectionManager,
) -> Result<(), RelayError>
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let pong_wait = manager.config().pong_wait;
    let max_message_size = manager.config().max_message_size;
    let mut deadline = Instant::now() + pong_wait;

    loop {
        let next = tokio::select! {
            () = connection.closed() => return Ok(()),
            next = time::timeout_at(deadline, stream.next()) => next,
        };
        let frame = match next {
            Err(_elapsed) => return Err(RelayError::transport("read deadline exceeded")),
            Ok(None) => return Ok(()),
            Ok(Some(Err(e))) => return Err(RelayError::transport(e)),
            Ok(Some(Ok(frame))) => frame,
        };

        let data: &[u8] = match &frame {
            Message::Text(text) => text.as_str().as_bytes(),
            Message::Binary(bytes) => bytes.as_ref(),
            Message::Pong(_) => {
                deadline = Instant::now() + pong_wait;
                continue;
            }
            Message::Ping(_) => continue,
            Message::Close(_) => {
                debug!("peer sent close frame");
                return Ok(());
            }
        };

        if data.len() > max_message_size {
            warn!(len = data.len(), max_message_size, "dropping oversized message");
            continue;
        }

        let envelope = match Envelope::decode(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "dropping undecodable message");
                continue;
            }
        };

        if let Err(e) = manager.route(&envelope, connection).await {
            warn!(
                event_type = %envelope.event_type,
                kind = e.kind(),
                error = %e,
                "event handling failed"
            );
        }
    }
}

/// Drain the outbound queue onto the socket and keep the peer alive with
/// Pings.
#[instrument(skip_all, fields(conn_id = %connection.id()))]
async fn write_loop<S>(
    mut sink: S,
    mut rx: mpsc::Receiver<Arc<Envelope>>,
    connection: &ClientConnection,
    ping_interval: Duration,
) -> Result<(), RelayError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut ticker = time::interval(ping_interval);
    // The first tick completes immediately.
    let _ = ticker.tick().await;

    loop {
        tokio::select! {
            queued = rx.recv() => {
                let Some(envelope) = queued else {
                    let _ = send_frame(&mut sink, Message::Close(None), connection).await;
                    return Ok(());
                };
                let text = envelope.encode()?;
                send_frame(&mut sink, Message::Text(text.into()), connection).await?;
            }
            _ = ticker.tick() => {
                send_frame(&mut sink, Message::Ping(vec![].into()), connection).await?;
            }
        }
    }
}

/// Send one frame. Once the connection is closed the peer gets
/// [`CLOSE_GRACE`] to accept it before the send is abandoned.
async fn send_frame<S>(
    sink: &mut S,
    frame: Message,
    connection: &ClientConnection,
) -> Result<(), RelayError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let send = sink.send(frame);
    tokio::pin!(send);
    tokio::select! {
        result = &mut send => return result.map_err(RelayError::transport),
        () = connection.closed() => {}
    }
    match time::timeout(CLOSE_GRACE, send).await {
        Ok(result) => result.map_err(RelayError::transport),
        Err(_elapsed) => Err(RelayError::transport("peer stalled after close")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;
    use crate::websocket::test_helpers::{make_manager, make_manager_with};
    use futures::channel::mpsc as chan;
    use relay_core::events::EVENT_NEW_MESSAGE;
    use serde_json::{Value, json};
    use std::convert::Infallible;

    struct Peer {
        inbound: chan::UnboundedSender<Result<Message, Infallible>>,
        outbound: chan::UnboundedReceiver<Message>,
        session: SessionHandle,
    }

    impl Peer {
        fn send(&self, msg: Message) {
            self.inbound.unbounded_send(Ok(msg)).unwrap();
        }

        fn send_text(&self, text: &str) {
            self.send(Message::Text(text.into()));
        }

        async fn next(&mut self) -> Message {
            self.outbound.next().await.expect("outbound stream ended")
        }

        async fn next_envelope(&mut self) -> Value {
            match self.next().await {
                Message::Text(t) => serde_json::from_str(t.as_str()).unwrap(),
                other => panic!("expected text frame, got {other:?}"),
            }
        }
    }

    fn connect(manager: &Arc<ConnectionManager>) -> Peer {
        let (in_tx, in_rx) = chan::unbounded();
        let (out_tx, out_rx) = chan::unbounded();
        let session = spawn_session(out_tx, in_rx, Arc::clone(manager));
        Peer {
            inbound: in_tx,
            outbound: out_rx,
            session,
        }
    }

    fn send_message(message: &str, from: &str) -> String {
        json!({"type": "send_message", "payload": {"message": message, "from": from}})
            .to_string()
    }

    #[tokio::test(start_paused = true)]
    async fn ping_is_sent_at_ninety_percent_of_pong_wait() {
        let manager = make_manager();
        let mut peer = connect(&manager);
        let start = Instant::now();

        assert!(matches!(peer.next().await, Message::Ping(_)));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(9), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(10), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn silent_peer_is_torn_down_at_deadline() {
        let manager = make_manager();
        let mut peer = connect(&manager);
        let id = peer.session.connection.id().clone();

        assert!(matches!(peer.next().await, Message::Ping(_)));
        assert!(matches!(peer.next().await, Message::Close(None)));
        assert!(!manager.contains(&id));

        peer.session.reader.await.unwrap();
        peer.session.writer.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn pong_extends_the_deadline() {
        let manager = make_manager();
        let mut peer = connect(&manager);
        let id = peer.session.connection.id().clone();

        for _ in 0..3 {
            assert!(matches!(peer.next().await, Message::Ping(_)));
            peer.send(Message::Pong(vec![].into()));
        }
        assert!(manager.contains(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn peer_ping_does_not_extend_the_deadline() {
        let manager = make_manager();
        let mut peer = connect(&manager);
        let id = peer.session.connection.id().clone();

        assert!(matches!(peer.next().await, Message::Ping(_)));
        peer.send(Message::Ping(vec![].into()));
        assert!(matches!(peer.next().await, Message::Close(None)));
        assert!(!manager.contains(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn message_is_echoed_to_sender() {
        let manager = make_manager();
        let mut peer = connect(&manager);

        peer.send_text(&send_message("hi", "alice"));
        let env = peer.next_envelope().await;
        assert_eq!(env["type"], EVENT_NEW_MESSAGE);
        assert_eq!(env["payload"]["message"], "hi");
        assert_eq!(env["payload"]["from"], "alice");
    }

    #[tokio::test(start_paused = true)]
    async fn binary_frames_are_decoded() {
        let manager = make_manager();
        let mut peer = connect(&manager);

        peer.send(Message::Binary(send_message("bin", "bob").into_bytes().into()));
        let env = peer.next_envelope().await;
        assert_eq!(env["payload"]["message"], "bin");
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_message_is_dropped_and_loop_continues() {
        let manager = make_manager_with(ConnectionConfig {
            max_message_size: 64,
            ..ConnectionConfig::default()
        });
        let mut peer = connect(&manager);

        peer.send_text(&send_message(&"x".repeat(100), "alice"));
        peer.send_text(&send_message("small", "alice"));

        let env = peer.next_envelope().await;
        assert_eq!(env["payload"]["message"], "small");
        assert!(manager.contains(peer.session.connection.id()));
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_and_unknown_messages_keep_connection_alive() {
        let manager = make_manager();
        let mut peer = connect(&manager);

        peer.send_text("not json");
        peer.send_text(r#"{"type":"","payload":{}}"#);
        peer.send_text(r#"{"type":"typing","payload":{}}"#);
        peer.send_text(r#"{"type":"send_message","payload":{"from":"alice"}}"#);
        peer.send_text(&send_message("after", "alice"));

        let env = peer.next_envelope().await;
        assert_eq!(env["payload"]["message"], "after");
        assert!(manager.contains(peer.session.connection.id()));
    }

    #[tokio::test(start_paused = true)]
    async fn peer_close_tears_down_once() {
        let manager = make_manager();
        let mut peer = connect(&manager);

        peer.send(Message::Close(None));
        assert!(matches!(peer.next().await, Message::Close(None)));

        peer.session.reader.await.unwrap();
        peer.session.writer.await.unwrap();
        assert_eq!(manager.connection_count(), 0);
        assert!(!manager.remove(peer.session.connection.id()));
    }

    #[tokio::test(start_paused = true)]
    async fn stream_end_tears_down() {
        let manager = make_manager();
        let Peer {
            inbound,
            mut outbound,
            session,
        } = connect(&manager);

        drop(inbound);
        assert!(matches!(outbound.next().await, Some(Message::Close(None))));
        session.reader.await.unwrap();
        session.writer.await.unwrap();
        assert_eq!(manager.connection_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn write_failure_tears_down_both_loops() {
        let manager = make_manager();
        let Peer {
            inbound: _inbound,
            outbound,
            session,
        } = connect(&manager);

        drop(outbound);
        let _ = manager.broadcast(Envelope::new("tick", json!(null)));

        session.writer.await.unwrap();
        session.reader.await.unwrap();
        assert_eq!(manager.connection_count(), 0);
        assert!(session.connection.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn removal_flushes_queue_then_closes() {
        let manager = make_manager();
        let mut peer = connect(&manager);

        let _ = manager.broadcast(Envelope::new("first", json!(1)));
        assert!(manager.remove(peer.session.connection.id()));

        let env = peer.next_envelope().await;
        assert_eq!(env["type"], "first");
        assert!(matches!(peer.next().await, Message::Close(None)));
    }

    #[tokio::test(start_paused = true)]
    async fn broadcast_reaches_every_session() {
        let manager = make_manager();
        let mut alice = connect(&manager);
        let mut bob = connect(&manager);

        alice.send_text(&send_message("hello", "alice"));
        assert_eq!(alice.next_envelope().await["payload"]["message"], "hello");
        assert_eq!(bob.next_envelope().await["payload"]["message"], "hello");
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_peer_releases_writer_after_teardown() {
        let manager = make_manager();
        let (in_tx, in_rx) = chan::unbounded::<Result<Message, Infallible>>();
        // Never polled: the sink accepts one frame and then blocks.
        let (out_tx, _out_rx) = chan::channel::<Message>(0);
        let session = spawn_session(out_tx, in_rx, Arc::clone(&manager));
        let id = session.connection.id().clone();

        for i in 0..8 {
            let _ = manager.broadcast(Envelope::new("tick", json!(i)));
        }
        time::sleep(Duration::from_secs(30)).await;
        assert!(!manager.contains(&id));

        time::timeout(Duration::from_secs(3600), session.writer)
            .await
            .expect("writer still holds the sink")
            .unwrap();
        session.reader.await.unwrap();
        drop(in_tx);
    }

    #[tokio::test(start_paused = true)]
    async fn overflowed_peer_is_disconnected_while_stalled() {
        let manager = make_manager_with(ConnectionConfig {
            outbound_queue_capacity: 2,
            ..ConnectionConfig::default()
        });
        let (_in_tx, in_rx) = chan::unbounded::<Result<Message, Infallible>>();
        let (out_tx, _out_rx) = chan::channel::<Message>(0);
        let session = spawn_session(out_tx, in_rx, Arc::clone(&manager));
        let id = session.connection.id().clone();

        for i in 0..16 {
            let _ = manager.broadcast(Envelope::new("tick", json!(i)));
            tokio::task::yield_now().await;
        }
        assert!(!manager.contains(&id));

        time::timeout(CLOSE_GRACE * 2, session.writer)
            .await
            .expect("writer outlived the close grace")
            .unwrap();
        time::timeout(CLOSE_GRACE, session.reader)
            .await
            .expect("reader outlived the close signal")
            .unwrap();
    }
}
