//! # relay-core
//!
//! Shared vocabulary for the relay crates:
//!
//! - **Envelope**: the `{type, payload}` wrapper exchanged over every socket
//! - **Events**: `send_message` / `new_message` payload types
//! - **Errors**: `RelayError` taxonomy via `thiserror`
//! - **IDs**: branded `ConnectionId`

#![deny(unsafe_code)]

pub mod envelope;
pub mod errors;
pub mod events;
pub mod ids;

pub use envelope::Envelope;
pub use errors::{RelayError, Result};
pub use ids::ConnectionId;
