//! `RelayServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use relay_auth::{Authenticator, CredentialStore};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::events::EventRouter;
use crate::routes::{self, AppState};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::manager::ConnectionManager;

/// The relay server.
pub struct RelayServer {
    config: Arc<ServerConfig>,
    manager: Arc<ConnectionManager>,
    authenticator: Arc<dyn Authenticator>,
    metrics: PrometheusHandle,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl RelayServer {
    /// Create a new server. Nothing runs until [`Self::listen`].
    pub fn new(
        config: ServerConfig,
        router: EventRouter,
        authenticator: Arc<dyn Authenticator>,
        metrics: PrometheusHandle,
    ) -> Self {
        let credentials = Arc::new(CredentialStore::new(config.otp_retention));
        let manager = Arc::new(ConnectionManager::new(
            router,
            credentials,
            config.connection.clone(),
        ));
        Self {
            config: Arc::new(config),
            manager,
            authenticator,
            metrics,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            manager: Arc::clone(&self.manager),
            authenticator: Arc::clone(&self.authenticator),
            config: Arc::clone(&self.config),
            metrics: self.metrics.clone(),
            start_time: self.start_time,
        };

        Router::new()
            .route("/ws", get(routes::ws_handler))
            .route("/login", post(routes::login_handler))
            .route("/debug", get(routes::debug_handler))
            .route("/health", get(routes::health_handler))
            .route("/metrics", get(routes::metrics_handler))
            .fallback_service(ServeDir::new(&self.config.static_dir))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind, start the credential sweep, and serve until shutdown.
    ///
    /// Returns the bound address and the serve task. Firing the shutdown
    /// token closes every connection, stops the sweep and drains the
    /// listener; the task ends once all of that is done.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        let token = self.shutdown.token();

        let sweeper = self
            .manager
            .credentials()
            .spawn_sweeper(self.config.otp_sweep_interval, token.clone());

        let close_connections = {
            let manager = Arc::clone(&self.manager);
            async move {
                token.cancelled().await;
                let closed = manager.close_all();
                info!(closed, "shutdown: closed connections");
            }
        };

        let app = self.router();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(close_connections)
                .await
            {
                warn!(error = %e, "server error");
            }
            let _ = sweeper.await;
        });

        info!(%addr, "relay server listening");
        Ok((addr, handle))
    }

    /// The connection registry.
    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
