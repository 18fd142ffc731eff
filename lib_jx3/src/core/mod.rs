//! # Core Push Module
//!
//! This module forms the heart of the JX3 push gateway. It takes raw frames
//! from the upstream WebSocket feed and turns them into per-group chat
//! messages, gated by each group's own configuration.
//!
//! ## Core Components:
//!
//! - **`classifier`**: The fixed event taxonomy. Maps wire-level event codes
//!   onto the subscriber-facing `Topic` enum and derives the event's scope
//!   (global vs. bound to one game server). Unknown codes are dropped here.
//!
//! - **`router`**: The per-event dispatch pass. Reads a fresh subscriber
//!   snapshot, applies the topic and locality filters, and performs one
//!   isolated render+send per matching group.
//!
//! - **`render`**: The message templates. Turns a classified event into the
//!   user-facing Chinese push text, behind the `EventRenderer` trait so the
//!   router never depends on concrete templates.
//!
//! - **`pipeline`**: Glue between the connection manager and the router;
//!   guarantees frames are dispatched strictly in arrival order.
//!
//! - **`model`**: The `GroupBind` subscriber record and the error taxonomy
//!   shared by the collaborator traits.

/// The fixed code→topic table and frame classification.
pub mod classifier;
/// Subscriber records and the shared error taxonomy.
pub mod model;
/// Frame handling glue: classify, then dispatch in arrival order.
pub mod pipeline;
/// The default Chinese message templates.
pub mod render;
/// The per-subscriber delivery router and its collaborator traits.
pub mod router;

// --- Public API Re-exports ---
pub use classifier::{ClassifiedEvent, EventScope, Topic};
pub use model::{DeliveryOutcome, GroupBind};
pub use pipeline::EventPipeline;
pub use render::{EventRenderer, TemplateRenderer};
pub use router::{BroadcastSink, DeliveryRouter, SubscriberDirectory};
