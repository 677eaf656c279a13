//! Errors raised while loading [`RelaySettings`](crate::RelaySettings).

use std::path::PathBuf;

use thiserror::Error;

/// Why a settings file could not become a usable [`RelaySettings`](crate::RelaySettings).
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read settings file {}: {source}", .path.display())]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not JSON matching the settings schema.
    #[error("malformed settings file {}: {source}", .path.display())]
    Malformed {
        /// File that was being parsed.
        path: PathBuf,
        /// Parse or schema failure.
        #[source]
        source: serde_json::Error,
    },

    /// A field holds a value the relay cannot run with.
    #[error("invalid setting {field}: {reason}")]
    InvalidValue {
        /// JSON path of the offending field, e.g. `connection.pongWaitMs`.
        field: &'static str,
        /// What the value must satisfy.
        reason: &'static str,
    },
}

impl SettingsError {
    pub(crate) fn invalid(field: &'static str, reason: &'static str) -> Self {
        Self::InvalidValue { field, reason }
    }
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_value_names_the_field() {
        let err = SettingsError::invalid("connection.pongWaitMs", "must be > 0");
        assert_eq!(err.to_string(), "invalid setting connection.pongWaitMs: must be > 0");
    }

    #[test]
    fn malformed_names_the_file() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = SettingsError::Malformed {
            path: PathBuf::from("/etc/relay/settings.json"),
            source,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("malformed settings file /etc/relay/settings.json:"), "{msg}");
    }

    #[test]
    fn read_keeps_io_source() {
        let err = SettingsError::Read {
            path: PathBuf::from("settings.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "denied");
    }
}
