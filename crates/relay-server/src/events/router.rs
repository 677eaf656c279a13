//! Event handler trait and `type` → handler dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use relay_core::events::EVENT_SEND_MESSAGE;
use relay_core::{Envelope, RelayError};

use super::send_message::SendMessageHandler;
use crate::websocket::connection::ClientConnection;
use crate::websocket::manager::ConnectionManager;

/// What a handler can reach while processing one envelope.
pub struct HandlerContext<'a> {
    /// The connection the envelope arrived on.
    pub origin: &'a ClientConnection,
    /// The registry, for fan-out.
    pub manager: &'a ConnectionManager,
}

/// Trait implemented by every event handler.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Process one envelope whose `type` this handler is registered for.
    async fn handle(
        &self,
        envelope: &Envelope,
        ctx: &HandlerContext<'_>,
    ) -> Result<(), RelayError>;
}

/// Table mapping event types to handlers.
///
/// Built once at startup and owned by the connection manager; never mutated
/// after that.
pub struct EventRouter {
    handlers: HashMap<String, Arc<dyn EventHandler>>,
}

impl EventRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Router with the built-in handlers registered.
    pub fn with_defaults() -> Self {
        let mut router = Self::new();
        router.register(EVENT_SEND_MESSAGE, SendMessageHandler);
        router
    }

    /// Register a handler for an event type, replacing any previous one.
    pub fn register(&mut self, event_type: &str, handler: impl EventHandler + 'static) {
        let _ = self.handlers.insert(event_type.to_owned(), Arc::new(handler));
    }

    /// Dispatch an envelope to its handler.
    pub async fn route(
        &self,
        envelope: &Envelope,
        ctx: &HandlerContext<'_>,
    ) -> Result<(), RelayError> {
        let Some(handler) = self.handlers.get(&envelope.event_type) else {
            counter!("relay_event_errors_total", "kind" => "unsupported_event_type").increment(1);
            return Err(RelayError::UnsupportedEventType(envelope.event_type.clone()));
        };

        counter!("relay_events_total", "event_type" => envelope.event_type.clone()).increment(1);
        let result = handler.handle(envelope, ctx).await;
        if let Err(e) = &result {
            counter!("relay_event_errors_total", "kind" => e.kind()).increment(1);
        }
        result
    }

    /// Registered event types (sorted).
    pub fn event_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}
