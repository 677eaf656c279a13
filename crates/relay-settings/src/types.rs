//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file may specify any subset of fields.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 9000 },
///   "credentials": { "retentionMs": 3000 }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// HTTP listener and static assets.
    pub server: ServerSettings,
    /// Per-connection limits and keepalive.
    pub connection: ConnectionSettings,
    /// One-time credential retention.
    pub credentials: CredentialSettings,
    /// The fixed login pair.
    pub auth: AuthSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl RelaySettings {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.connection.pong_wait_ms == 0 {
            return Err(SettingsError::invalid("connection.pongWaitMs", "must be > 0"));
        }
        if self.connection.outbound_queue_capacity == 0 {
            return Err(SettingsError::invalid(
                "connection.outboundQueueCapacity",
                "must be > 0",
            ));
        }
        if self.connection.max_message_size > self.connection.max_frame_size {
            return Err(SettingsError::invalid(
                "connection.maxMessageSize",
                "must not exceed connection.maxFrameSize",
            ));
        }
        if self.credentials.sweep_interval_ms == 0 {
            return Err(SettingsError::invalid("credentials.sweepIntervalMs", "must be > 0"));
        }
        Ok(())
    }
}

/// HTTP listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Directory served at `/`.
    pub static_dir: String,
    /// Browser origins allowed to open `/ws`. Empty allows any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            static_dir: "frontend".to_string(),
            allowed_origins: vec!["http://localhost:8080".to_string()],
        }
    }
}

/// Per-connection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionSettings {
    /// Largest inbound message handled; bigger ones are dropped.
    pub max_message_size: usize,
    /// Hard transport cap; bigger frames close the connection.
    pub max_frame_size: usize,
    /// How long to wait for a Pong before the read side gives up.
    pub pong_wait_ms: u64,
    /// Outbound queue depth before a peer counts as too slow.
    pub outbound_queue_capacity: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            max_message_size: 512,
            max_frame_size: 64 * 1024,
            pong_wait_ms: 10_000,
            outbound_queue_capacity: 256,
        }
    }
}

/// One-time credential settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CredentialSettings {
    /// Credential lifetime.
    pub retention_ms: u64,
    /// Sweep period.
    pub sweep_interval_ms: u64,
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            retention_ms: 5_000,
            sweep_interval_ms: 400,
        }
    }
}

/// Fixed login pair.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// Accepted username.
    pub username: String,
    /// Accepted password.
    pub password: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            username: "relay".to_string(),
            password: "relay".to_string(),
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = RelaySettings::default();
        assert_eq!(s.server.host, "127.0.0.1");
        assert_eq!(s.server.port, 8080);
        assert_eq!(s.connection.max_message_size, 512);
        assert_eq!(s.connection.pong_wait_ms, 10_000);
        assert_eq!(s.credentials.retention_ms, 5_000);
        assert_eq!(s.credentials.sweep_interval_ms, 400);
        assert_eq!(s.logging.level, "info");
        assert!(s.validate().is_ok());
    }

    #[test]
    fn serializes_camel_case() {
        let value = serde_json::to_value(RelaySettings::default()).unwrap();
        assert!(value["server"]["staticDir"].is_string());
        assert!(value["connection"]["pongWaitMs"].is_number());
        assert!(value["credentials"]["sweepIntervalMs"].is_number());
    }

    #[test]
    fn partial_section_keeps_defaults() {
        let s: RelaySettings =
            serde_json::from_str(r#"{"connection": {"maxMessageSize": 1024}}"#).unwrap();
        assert_eq!(s.connection.max_message_size, 1024);
        assert_eq!(s.connection.pong_wait_ms, 10_000);
    }

    #[test]
    fn zero_pong_wait_is_invalid() {
        let mut s = RelaySettings::default();
        s.connection.pong_wait_ms = 0;
        assert!(matches!(
            s.validate(),
            Err(SettingsError::InvalidValue { field: "connection.pongWaitMs", .. })
        ));
    }

    #[test]
    fn message_size_above_frame_cap_is_invalid() {
        let mut s = RelaySettings::default();
        s.connection.max_message_size = s.connection.max_frame_size + 1;
        assert!(matches!(
            s.validate(),
            Err(SettingsError::InvalidValue { field: "connection.maxMessageSize", .. })
        ));
    }

    #[test]
    fn zero_queue_capacity_is_invalid() {
        let mut s = RelaySettings::default();
        s.connection.outbound_queue_capacity = 0;
        assert!(s.validate().is_err());
    }
}
