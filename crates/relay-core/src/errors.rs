//! Relay error taxonomy.
//!
//! Per-message errors (`UnsupportedEventType`, `BadPayload`, `InvalidEnvelope`)
//! are logged and leave the connection alive. `EncodingFailure` and
//! `Transport` end the loop that hit them, which tears the connection down.

/// Errors raised while admitting, routing, or relaying events.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Missing, unknown, expired, or already used one-time credential.
    #[error("unauthorized")]
    Unauthorized,

    /// No handler is registered for the envelope's `type`.
    #[error("event type '{0}' is not supported")]
    UnsupportedEventType(String),

    /// The envelope payload does not match the handler's schema.
    #[error("bad payload: {0}")]
    BadPayload(String),

    /// The frame is not a valid envelope (bad JSON or empty `type`).
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// Outbound serialization failed.
    #[error("encoding failure: {0}")]
    EncodingFailure(String),

    /// Read/write failure or read-deadline expiry.
    #[error("transport error: {0}")]
    Transport(String),
}

impl RelayError {
    /// Short classification string for logging/metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::UnsupportedEventType(_) => "unsupported_event_type",
            Self::BadPayload(_) => "bad_payload",
            Self::InvalidEnvelope(_) => "invalid_envelope",
            Self::EncodingFailure(_) => "encoding_failure",
            Self::Transport(_) => "transport",
        }
    }

    /// Wrap any displayable transport error.
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Result alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
