//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` pushes recorded accounting events to
//! clients, filtered by per-connection source subscriptions.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
