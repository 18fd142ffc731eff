//! # lib_jx3
//!
//! Core subsystems for the JX3 push gateway:
//!
//! - `core`: event taxonomy, classification, message rendering and the
//!   per-subscriber delivery router.
//! - `ingestors`: the long-lived WebSocket connection manager for the
//!   upstream push endpoint.
//! - `connections`: external collaborators, the PostgreSQL bind store and
//!   the OneBot broadcast sink.

pub mod connections;
pub mod core;
pub mod ingestors;

// Re-export the types the server binary wires together.
// `self::` disambiguates the local module from the `core` built-in crate.
pub use self::core::classifier::{ClassifiedEvent, EventScope, Topic};
pub use self::core::model::GroupBind;
pub use self::core::pipeline::EventPipeline;
pub use self::core::render::TemplateRenderer;
pub use self::core::router::DeliveryRouter;
