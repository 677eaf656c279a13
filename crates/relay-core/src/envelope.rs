//! The `{type, payload}` wire envelope.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{RelayError, Result};

/// Typed message wrapper exchanged in both directions.
///
/// `type` selects the handler; `payload` is opaque JSON until that handler
/// decodes it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event discriminator. Never empty once decoded.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Handler-specific payload (`null` when absent).
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    /// Build an envelope from an already-encoded payload.
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }

    /// Build an envelope by serializing `payload`.
    pub fn with_payload<T: Serialize>(event_type: impl Into<String>, payload: &T) -> Result<Self> {
        let payload =
            serde_json::to_value(payload).map_err(|e| RelayError::EncodingFailure(e.to_string()))?;
        Ok(Self::new(event_type, payload))
    }

    /// Decode one inbound frame.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let envelope: Self =
            serde_json::from_slice(bytes).map_err(|e| RelayError::InvalidEnvelope(e.to_string()))?;
        if envelope.event_type.is_empty() {
            return Err(RelayError::InvalidEnvelope("empty event type".into()));
        }
        Ok(envelope)
    }

    /// Encode for an outbound text frame.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| RelayError::EncodingFailure(e.to_string()))
    }

    /// Decode the payload into a handler's schema.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.payload).map_err(|e| RelayError::BadPayload(e.to_string()))
    }
}
