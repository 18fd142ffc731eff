//! Glue between the connection manager and the router.
//!
//! One frame in, at most one dispatch pass out. The connection manager
//! awaits `on_frame` before reading the next frame, so dispatch passes for
//! distinct frames never interleave and arrival order is preserved.

use crate::core::classifier;
use crate::core::router::DeliveryRouter;
use crate::ingestors::FrameHandler;
use async_trait::async_trait;

/// Classifies each inbound frame and runs its dispatch pass.
pub struct EventPipeline {
    router: DeliveryRouter,
}

impl EventPipeline {
    /// Wraps a router as the connection manager's frame handler.
    pub fn new(router: DeliveryRouter) -> Self {
        Self { router }
    }
}

#[async_trait]
impl FrameHandler for EventPipeline {
    async fn on_frame(&self, text: &str) {
        // Malformed frames and unknown codes are dropped by the classifier.
        let Some(event) = classifier::classify(text) else {
            return;
        };
        self.router.dispatch(&event).await;
    }
}
