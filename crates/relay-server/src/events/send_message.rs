//! `send_message` → `new_message` fan-out.

use async_trait::async_trait;
use relay_core::events::{EVENT_NEW_MESSAGE, NewMessageEvent, SendMessageEvent};
use relay_core::{Envelope, RelayError};
use tracing::debug;

use super::router::{EventHandler, HandlerContext};

/// Stamps an inbound chat message and relays it to every connection,
/// the sender included.
pub struct SendMessageHandler;

#[async_trait]
impl EventHandler for SendMessageHandler {
    async fn handle(
        &self,
        envelope: &Envelope,
        ctx: &HandlerContext<'_>,
    ) -> Result<(), RelayError> {
        let request: SendMessageEvent = envelope.payload_as()?;
        let stamped = NewMessageEvent::stamp(request);
        let outbound = Envelope::with_payload(EVENT_NEW_MESSAGE, &stamped)?;
        let delivered = ctx.manager.broadcast(outbound);
        debug!(conn_id = %ctx.origin.id(), delivered, "message relayed");
        Ok(())
    }
}
