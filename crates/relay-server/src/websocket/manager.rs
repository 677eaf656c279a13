//! Connection registry: admission, fan-out and teardown.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::{counter, gauge};
use parking_lot::RwLock;
use relay_auth::{Authenticator, CredentialStore, LoginRequest, Otp};
use relay_core::{ConnectionId, Envelope, RelayError};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::connection::{ClientConnection, Delivery};
use crate::config::ConnectionConfig;
use crate::events::{EventRouter, HandlerContext};

/// Owns the live connection set, the event router and the credential store.
///
/// Insert and remove take the write lock; broadcast snapshots under the read
/// lock and releases it before touching any connection.
pub struct ConnectionManager {
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
    router: EventRouter,
    credentials: Arc<CredentialStore>,
    config: ConnectionConfig,
}

impl ConnectionManager {
    /// Create a manager with no connections.
    pub fn new(
        router: EventRouter,
        credentials: Arc<CredentialStore>,
        config: ConnectionConfig,
    ) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            router,
            credentials,
            config,
        }
    }

    // ── Admission ───────────────────────────────────────────────────

    /// Check the `otp` presented on an upgrade request.
    ///
    /// Consumes the credential on success.
    pub fn authorize(&self, otp: Option<&str>) -> Result<(), RelayError> {
        match otp {
            Some(key) if !key.is_empty() && self.credentials.verify(key) => Ok(()),
            _ => Err(RelayError::Unauthorized),
        }
    }

    /// Issue a credential for an authenticated login.
    pub fn issue_credential(
        &self,
        authenticator: &dyn Authenticator,
        request: &LoginRequest,
    ) -> Result<Otp, RelayError> {
        if !authenticator.authenticate(request) {
            return Err(RelayError::Unauthorized);
        }
        Ok(self.credentials.issue())
    }

    /// Create and insert a connection.
    ///
    /// Returns the shared handle and the receiving end of its outbound queue,
    /// which belongs to the write loop.
    pub fn register(&self) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<Envelope>>) {
        let (tx, rx) = mpsc::channel(self.config.outbound_queue_capacity);
        let connection = Arc::new(ClientConnection::new(ConnectionId::new(), tx));
        let _ = self
            .connections
            .write()
            .insert(connection.id().clone(), Arc::clone(&connection));
        counter!("relay_connections_total").increment(1);
        gauge!("relay_connections_active").increment(1.0);
        debug!(conn_id = %connection.id(), "connection registered");
        (connection, rx)
    }

    /// Close and delete a connection.
    ///
    /// Returns `true` only for the call that removed it; later calls are
    /// no-ops.
    pub fn remove(&self, id: &ConnectionId) -> bool {
        let mut connections = self.connections.write();
        let Some(connection) = connections.remove(id) else {
            return false;
        };
        let _ = connection.close();
        gauge!("relay_connections_active").decrement(1.0);
        true
    }

    /// Close every connection.
    pub fn close_all(&self) -> usize {
        let ids: Vec<ConnectionId> = self.connections.read().keys().cloned().collect();
        ids.iter().filter(|id| self.remove(id)).count()
    }

    // ── Dispatch ────────────────────────────────────────────────────

    /// Route an inbound envelope to its handler.
    pub async fn route(
        &self,
        envelope: &Envelope,
        origin: &ClientConnection,
    ) -> Result<(), RelayError> {
        let ctx = HandlerContext {
            origin,
            manager: self,
        };
        self.router.route(envelope, &ctx).await
    }

    /// Enqueue `envelope` on every registered connection.
    ///
    /// Peers whose queue is full are disconnected. Returns the number of
    /// connections that accepted the envelope.
    pub fn broadcast(&self, envelope: Envelope) -> usize {
        let envelope = Arc::new(envelope);
        let snapshot: Vec<Arc<ClientConnection>> =
            self.connections.read().values().cloned().collect();

        let mut delivered = 0;
        let mut overflowed = Vec::new();
        for connection in &snapshot {
            match connection.enqueue(Arc::clone(&envelope)) {
                Delivery::Queued => delivered += 1,
                Delivery::Full => overflowed.push(connection.id().clone()),
                Delivery::Closed => {}
            }
        }

        for id in overflowed {
            if self.remove(&id) {
                warn!(conn_id = %id, "outbound queue full, disconnecting slow peer");
                counter!("relay_dropped_peers_total").increment(1);
            }
        }

        debug!(
            event_type = %envelope.event_type,
            recipients = snapshot.len(),
            delivered,
            "broadcast"
        );
        delivered
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.read().contains_key(id)
    }

    /// The shared credential store.
    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// Per-connection settings.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}
