//! Event dispatch: the `type` → handler table and the built-in handlers.

pub mod router;
pub mod send_message;

pub use router::{EventHandler, EventRouter, HandlerContext};
pub use send_message::SendMessageHandler;
