//! # Data Ingestors Module
//!
//! Clients for the upstream push sources feeding the gateway. Each ingestor
//! owns the full lifecycle of its source connection: connect, receive loop,
//! health signaling, reconnect and graceful teardown.
//!
//! ## Contained Modules:
//! - **`jx3_wss`**: A resilient, state-aware WebSocket client for the JX3
//!   push endpoint, with a fixed-delay reconnect policy and an explicit
//!   connection state machine.

use async_trait::async_trait;

/// The WebSocket client for the JX3 push endpoint.
pub mod jx3_wss;

// --- Public API Re-exports ---
pub use jx3_wss::{ConnectionState, Jx3WssManager, WssConfig};

/// Consumer of inbound frames.
///
/// The connection manager awaits each call before reading the next frame,
/// so implementations see frames strictly in arrival order.
#[async_trait]
pub trait FrameHandler: Send + Sync {
    /// Handles one raw text frame. Must not panic on malformed input.
    async fn on_frame(&self, text: &str);
}
