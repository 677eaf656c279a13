//! # relay-server
//!
//! Axum HTTP + `WebSocket` relay.
//!
//! - HTTP endpoints: login, admission (`/ws`), debug count, health, metrics,
//!   static assets
//! - `WebSocket` sessions: one read loop and one write loop per connection,
//!   Ping/Pong keepalive, idempotent teardown
//! - Connection manager: admission, fan-out to bounded per-connection queues
//! - Event router: `type` → handler dispatch
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod events;
pub mod health;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::{ConnectionConfig, ServerConfig};
pub use events::{EventHandler, EventRouter, HandlerContext};
pub use server::RelayServer;
