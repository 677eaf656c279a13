//! Built-in event types and payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Inbound chat message request.
pub const EVENT_SEND_MESSAGE: &str = "send_message";

/// Outbound chat message fan-out.
pub const EVENT_NEW_MESSAGE: &str = "new_message";

/// Payload of a `send_message` request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageEvent {
    /// Message text.
    pub message: String,
    /// Display name of the sender.
    pub from: String,
}

/// Payload of a `new_message` broadcast.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessageEvent {
    /// The relayed request, flattened into `{message, from}`.
    #[serde(flatten)]
    pub message: SendMessageEvent,
    /// When the relay accepted the message.
    pub sent: DateTime<Utc>,
}

impl NewMessageEvent {
    /// Stamp a request with the current time.
    pub fn stamp(message: SendMessageEvent) -> Self {
        Self {
            message,
            sent: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn send_message_requires_both_fields() {
        let ok: Result<SendMessageEvent, _> =
            serde_json::from_value(json!({"message": "hi", "from": "alice"}));
        assert!(ok.is_ok());

        let missing: Result<SendMessageEvent, _> = serde_json::from_value(json!({"from": "alice"}));
        assert!(missing.is_err());
    }

    #[test]
    fn new_message_is_flat() {
        let event = NewMessageEvent::stamp(SendMessageEvent {
            message: "hi".into(),
            from: "alice".into(),
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["message"], "hi");
        assert_eq!(value["from"], "alice");
        assert!(value["sent"].is_string());
    }

    #[test]
    fn sent_is_rfc3339() {
        let value = json!({"message": "m", "from": "f", "sent": "2026-01-01T00:00:00Z"});
        let event: NewMessageEvent = serde_json::from_value(value).unwrap();
        assert_eq!(event.sent.to_rfc3339(), "2026-01-01T00:00:00+00:00");
    }
}
