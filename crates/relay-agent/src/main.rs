//! # relay-agent
//!
//! Relay server binary: loads settings, installs logging and metrics, and
//! serves until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use relay_auth::StaticCredentials;
use relay_server::{EventRouter, RelayServer, ServerConfig};
use relay_settings::RelaySettings;

/// Real-time message relay.
#[derive(Parser, Debug)]
#[command(name = "relay-agent", about = "Real-time WebSocket message relay")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings; 0 auto-assigns).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.relay/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of static assets served at `/` (overrides settings).
    #[arg(long)]
    static_dir: Option<PathBuf>,
}

impl Cli {
    fn load_settings(&self) -> Result<RelaySettings> {
        let path = self.config.clone().unwrap_or_else(relay_settings::settings_path);
        relay_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))
    }

    /// Settings mapped to server config, with CLI flags applied last.
    fn server_config(&self, settings: &RelaySettings) -> ServerConfig {
        let mut config = ServerConfig::from_settings(settings);
        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(dir) = &self.static_dir {
            config.static_dir.clone_from(dir);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = args.load_settings()?;

    relay_logging::init_subscriber(&settings.logging.level, settings.logging.json)
        .context("Failed to initialize logging")?;

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install metrics recorder")?;

    let authenticator = Arc::new(StaticCredentials::new(
        settings.auth.username.clone(),
        settings.auth.password.clone(),
    ));
    let router = EventRouter::with_defaults();
    let event_types = router.event_types();
    let server = RelayServer::new(args.server_config(&settings), router, authenticator, metrics);

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!(?event_types, "relay listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.shutdown().graceful_shutdown(vec![handle], None).await;
    tracing::info!("Shutdown complete");
    Ok(())
}
