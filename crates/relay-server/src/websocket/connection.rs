//! WebSocket client connection state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use relay_core::{ConnectionId, Envelope};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

/// Outcome of enqueuing an envelope for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Accepted by the outbound queue.
    Queued,
    /// The queue is at capacity; the peer is not keeping up.
    Full,
    /// The connection is closing; nothing more will be sent.
    Closed,
}

/// Represents an admitted WebSocket client.
///
/// The transport halves live in the session's two loop tasks. This struct is
/// the shared handle: the outbound queue sender and the close signal.
pub struct ClientConnection {
    id: ConnectionId,
    /// Sender side of the outbound queue; `None` once closed.
    tx: Mutex<Option<mpsc::Sender<Arc<Envelope>>>>,
    /// Fired once on close; both loops watch it.
    closed: CancellationToken,
    connected_at: Instant,
}

impl ClientConnection {
    /// Create a new connection around its outbound queue sender.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Arc<Envelope>>) -> Self {
        Self {
            id,
            tx: Mutex::new(Some(tx)),
            closed: CancellationToken::new(),
            connected_at: Instant::now(),
        }
    }

    /// Connection identity.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Enqueue an envelope without waiting.
    pub fn enqueue(&self, envelope: Arc<Envelope>) -> Delivery {
        let tx = self.tx.lock();
        let Some(tx) = tx.as_ref() else {
            return Delivery::Closed;
        };
        match tx.try_send(envelope) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) => Delivery::Full,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Close the outbound queue and signal both loops.
    ///
    /// Messages already queued are still flushed before the write loop sends
    /// its Close frame. Returns `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        let sender = self.tx.lock().take();
        self.closed.cancel();
        sender.is_some()
    }

    /// Whether [`Self::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the connection is closed.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
