//! # Core Data Model
//!
//! The subscriber record and the error taxonomy shared by the collaborator
//! traits. Kept free of any transport or storage types so both the postgres
//! store and the in-memory test directory can produce the same records.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::classifier::Topic;

/// One group's push configuration.
///
/// Owned by the persistence layer; the router only ever reads a snapshot
/// per dispatch pass so topic toggles take effect on the very next event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupBind {
    /// Destination id (chat group), the unique key.
    pub group_id: String,
    /// Bound game server. A group without one never matches scoped events.
    pub server: Option<String>,
    /// Optional per-group API ticket (used by the query command surface).
    pub ticket: Option<String>,
    /// Optional per-group API token.
    pub token: Option<String>,
    /// Optional per-group WebSocket token.
    pub ws_token: Option<String>,
    /// Topic toggle map, keyed by [`Topic::label`]. Unset keys are disabled.
    pub pushes: HashMap<String, bool>,
}

impl GroupBind {
    /// Whether this group has opted into the given topic.
    pub fn is_enabled(&self, topic: Topic) -> bool {
        self.pushes.get(topic.label()).copied().unwrap_or(false)
    }

    /// Sets one topic toggle.
    pub fn set_enabled(&mut self, topic: Topic, enabled: bool) {
        self.pushes.insert(topic.label().to_string(), enabled);
    }
}

/// Custom error types for subscriber directory reads.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The bind store could not be read; the dispatch pass is abandoned.
    #[error("bind store unavailable: {0}")]
    Unavailable(String),
}

/// Custom error types for message rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The payload is missing a field the template requires.
    #[error("payload missing field `{0}`")]
    MissingField(&'static str),
}

/// Custom error types for the broadcast sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The request never produced a usable response.
    #[error("broadcast transport error: {0}")]
    Transport(String),
    /// The delivery API answered, but refused the message.
    #[error("broadcast rejected: {0}")]
    Rejected(String),
}

/// Why one subscriber's delivery failed. Isolated per subscriber; never
/// aborts the rest of the dispatch pass.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Rendering the message failed for this subscriber.
    #[error("render failed: {0}")]
    Render(#[from] RenderError),
    /// Sending the message failed for this subscriber.
    #[error("send failed: {0}")]
    Sink(#[from] SinkError),
}

/// The tagged result of one subscriber's delivery attempt.
#[derive(Debug)]
pub struct DeliveryOutcome {
    /// The destination the attempt was for.
    pub group_id: String,
    /// Success, or the isolated failure reason.
    pub result: Result<(), DeliveryError>,
}
