//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use relay_settings::RelaySettings;

/// Configuration for the relay server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (`0` auto-assigns).
    pub port: u16,
    /// Directory served at `/`.
    pub static_dir: PathBuf,
    /// Origins allowed to open `/ws`. Empty allows any.
    pub allowed_origins: Vec<String>,
    /// Per-connection limits and keepalive.
    pub connection: ConnectionConfig,
    /// Lifetime of an unverified credential.
    pub otp_retention: Duration,
    /// Credential sweep period.
    pub otp_sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            static_dir: PathBuf::from("frontend"),
            allowed_origins: Vec::new(),
            connection: ConnectionConfig::default(),
            otp_retention: Duration::from_secs(5),
            otp_sweep_interval: Duration::from_millis(400),
        }
    }
}

impl ServerConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &RelaySettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            static_dir: PathBuf::from(&settings.server.static_dir),
            allowed_origins: settings.server.allowed_origins.clone(),
            connection: ConnectionConfig {
                max_message_size: settings.connection.max_message_size,
                max_frame_size: settings.connection.max_frame_size,
                pong_wait: Duration::from_millis(settings.connection.pong_wait_ms),
                outbound_queue_capacity: settings.connection.outbound_queue_capacity,
            },
            otp_retention: Duration::from_millis(settings.credentials.retention_ms),
            otp_sweep_interval: Duration::from_millis(settings.credentials.sweep_interval_ms),
        }
    }

    /// Whether a browser `Origin` header may open a socket.
    ///
    /// Requests without an `Origin` (non-browser clients) are always allowed.
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        match origin {
            None => true,
            Some(_) if self.allowed_origins.is_empty() => true,
            Some(origin) => self.allowed_origins.iter().any(|o| o == origin),
        }
    }
}

/// Per-connection settings.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Largest inbound message handled; larger ones are dropped.
    pub max_message_size: usize,
    /// Transport cap; larger frames fail the read side.
    pub max_frame_size: usize,
    /// Read deadline window, reset by every Pong.
    pub pong_wait: Duration,
    /// Outbound queue depth.
    pub outbound_queue_capacity: usize,
}

impl ConnectionConfig {
    /// Keepalive period: 90% of the pong wait, so a Ping always goes out
    /// before the peer's deadline can lapse.
    pub fn ping_interval(&self) -> Duration {
        self.pong_wait * 9 / 10
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_message_size: 512,
            max_frame_size: 64 * 1024,
            pong_wait: Duration::from_secs(10),
            outbound_queue_capacity: 256,
        }
    }
}
