//! WebSocket connection state, the connection manager, and per-connection
//! read/write sessions.

pub mod connection;
pub mod manager;
pub mod session;

#[cfg(test)]
pub(crate) mod test_helpers {
    use std::sync::Arc;
    use std::time::Duration;

    use relay_auth::CredentialStore;

    use super::manager::ConnectionManager;
    use crate::config::ConnectionConfig;
    use crate::events::EventRouter;

    /// Manager with the default router and connection settings.
    pub fn make_manager() -> Arc<ConnectionManager> {
        make_manager_with(ConnectionConfig::default())
    }

    /// Manager with the default router and the given connection settings.
    pub fn make_manager_with(config: ConnectionConfig) -> Arc<ConnectionManager> {
        Arc::new(ConnectionManager::new(
            EventRouter::with_defaults(),
            Arc::new(CredentialStore::new(Duration::from_secs(5))),
            config,
        ))
    }
}
