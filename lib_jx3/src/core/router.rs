//! # Delivery Router
//!
//! The per-event dispatch pass. For every inbound event the router reads a
//! fresh subscriber snapshot, applies the two independent filters (topic
//! opt-in, locality match) and performs one isolated render+send per
//! matching group.
//!
//! All collaborators are injected at construction; the router holds no
//! ambient state and caches nothing across passes, so a toggle flipped in
//! the bind store takes effect on the very next event.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::classifier::{ClassifiedEvent, EventScope};
use crate::core::model::{DeliveryError, DeliveryOutcome, DirectoryError, GroupBind, SinkError};
use crate::core::render::EventRenderer;

/// Read access to the current subscriber set.
///
/// `get_all` must be a consistent point-in-time snapshot; the router calls
/// it once per dispatch pass and never incrementally updates the result.
#[async_trait]
pub trait SubscriberDirectory: Send + Sync {
    /// Returns every subscriber record at call time.
    async fn get_all(&self) -> Result<Vec<GroupBind>, DirectoryError>;
}

/// Delivers a finished message to one destination.
///
/// Failures are per-destination and must never affect sibling deliveries.
#[async_trait]
pub trait BroadcastSink: Send + Sync {
    /// Sends `message` to the group identified by `group_id`.
    async fn send(&self, group_id: &str, message: &str) -> Result<(), SinkError>;
}

/// Routes classified events to subscribers.
pub struct DeliveryRouter {
    directory: Arc<dyn SubscriberDirectory>,
    renderer: Arc<dyn EventRenderer>,
    sink: Arc<dyn BroadcastSink>,
}

impl DeliveryRouter {
    /// Creates a router with explicit collaborators. No ambient lookups.
    pub fn new(
        directory: Arc<dyn SubscriberDirectory>,
        renderer: Arc<dyn EventRenderer>,
        sink: Arc<dyn BroadcastSink>,
    ) -> Self {
        Self {
            directory,
            renderer,
            sink,
        }
    }

    /// Runs one dispatch pass for `event` across the current subscribers.
    ///
    /// Returns one tagged outcome per attempted delivery. A directory read
    /// failure abandons the whole pass (the next event reads fresh again);
    /// renderer/sink failures are isolated to their subscriber.
    pub async fn dispatch(&self, event: &ClassifiedEvent) -> Vec<DeliveryOutcome> {
        let binds = match self.directory.get_all().await {
            Ok(binds) => binds,
            Err(e) => {
                log::error!(
                    "Abandoning dispatch of code {}: subscriber snapshot failed: {}",
                    event.code,
                    e
                );
                return Vec::new();
            }
        };

        let mut outcomes = Vec::new();
        for bind in &binds {
            if !bind.is_enabled(event.topic) {
                continue;
            }
            // Scoped events only reach groups bound to the same server. A
            // group without a bound server never matches a scoped event.
            if let EventScope::Scoped(server) = &event.scope {
                match bind.server.as_deref() {
                    Some(bound) if bound == server => {}
                    _ => continue,
                }
            }

            let result = self.deliver(event, bind).await;
            if let Err(e) = &result {
                log::warn!("Push to group {} failed: {}", bind.group_id, e);
            }
            outcomes.push(DeliveryOutcome {
                group_id: bind.group_id.clone(),
                result,
            });
        }

        log::debug!(
            "Dispatched code {} ({}): {}/{} deliveries ok",
            event.code,
            event.topic.label(),
            outcomes.iter().filter(|o| o.result.is_ok()).count(),
            outcomes.len()
        );
        outcomes
    }

    async fn deliver(
        &self,
        event: &ClassifiedEvent,
        bind: &GroupBind,
    ) -> Result<(), DeliveryError> {
        // Banner server for display only. For a global event to a group
        // without a bound server there is nothing sensible to show but the
        // all-servers marker.
        let locality = bind.server.as_deref().unwrap_or("全服");
        let message = self.renderer.render(event, locality)?;
        self.sink.send(&bind.group_id, &message).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connections::memory::MemoryDirectory;
    use crate::core::classifier::{classify, Topic};
    use crate::core::model::RenderError;
    use crate::core::render::TemplateRenderer;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records every send; never fails.
    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl BroadcastSink for RecordingSink {
        async fn send(&self, group_id: &str, message: &str) -> Result<(), SinkError> {
            self.sent
                .lock()
                .unwrap()
                .push((group_id.to_string(), message.to_string()));
            Ok(())
        }
    }

    impl RecordingSink {
        fn sent_to(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|(id, _)| id.clone())
                .collect()
        }
    }

    /// Fails the first render, succeeds afterwards.
    struct FlakyRenderer {
        calls: AtomicUsize,
    }

    impl EventRenderer for FlakyRenderer {
        fn render(&self, _: &ClassifiedEvent, _: &str) -> Result<String, RenderError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(RenderError::MissingField("name"))
            } else {
                Ok("rendered".to_string())
            }
        }
    }

    fn bind(group_id: &str, server: Option<&str>, enabled: &[Topic]) -> GroupBind {
        let mut bind = GroupBind {
            group_id: group_id.to_string(),
            server: server.map(str::to_string),
            ..GroupBind::default()
        };
        for topic in enabled {
            bind.set_enabled(*topic, true);
        }
        bind
    }

    fn router_with(
        binds: Vec<GroupBind>,
        sink: Arc<RecordingSink>,
    ) -> DeliveryRouter {
        DeliveryRouter::new(
            Arc::new(MemoryDirectory::new(binds)),
            Arc::new(TemplateRenderer::new()),
            sink,
        )
    }

    fn serendipity_event(server: &str) -> ClassifiedEvent {
        let frame = json!({
            "code": "1001",
            "data": { "server": server, "name": "Bob", "event": "X" }
        })
        .to_string();
        classify(&frame).unwrap()
    }

    fn news_event() -> ClassifiedEvent {
        let frame = json!({
            "code": "2002",
            "data": { "title": "标题", "url": "https://example.com" }
        })
        .to_string();
        classify(&frame).unwrap()
    }

    #[tokio::test]
    async fn test_disabled_topic_is_never_delivered() {
        // Scenario from the push feed: A enabled, B disabled, same server.
        let sink = Arc::new(RecordingSink::default());
        let router = router_with(
            vec![
                bind("A", Some("ServerOne"), &[Topic::Serendipity]),
                bind("B", Some("ServerOne"), &[]),
            ],
            Arc::clone(&sink),
        );

        let outcomes = router.dispatch(&serendipity_event("ServerOne")).await;
        assert_eq!(sink.sent_to(), vec!["A".to_string()]);
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].result.is_ok());
    }

    #[tokio::test]
    async fn test_global_event_ignores_locality() {
        let sink = Arc::new(RecordingSink::default());
        let router = router_with(
            vec![
                bind("A", Some("ServerOne"), &[Topic::News]),
                bind("C", Some("ServerTwo"), &[Topic::News]),
            ],
            Arc::clone(&sink),
        );

        router.dispatch(&news_event()).await;
        assert_eq!(sink.sent_to(), vec!["A".to_string(), "C".to_string()]);
    }

    #[tokio::test]
    async fn test_scoped_event_requires_exact_locality() {
        let sink = Arc::new(RecordingSink::default());
        let router = router_with(
            vec![
                bind("A", Some("ServerOne"), &[Topic::Serendipity]),
                bind("B", Some("ServerTwo"), &[Topic::Serendipity]),
                // No bound server: never matches scoped events.
                bind("C", None, &[Topic::Serendipity]),
            ],
            Arc::clone(&sink),
        );

        router.dispatch(&serendipity_event("ServerOne")).await;
        assert_eq!(sink.sent_to(), vec!["A".to_string()]);
    }

    #[tokio::test]
    async fn test_events_keep_arrival_order_per_destination() {
        let sink = Arc::new(RecordingSink::default());
        let router = router_with(
            vec![bind("A", Some("ServerOne"), &[Topic::Serendipity, Topic::News])],
            Arc::clone(&sink),
        );

        let e1 = serendipity_event("ServerOne");
        let e2 = news_event();
        router.dispatch(&e1).await;
        router.dispatch(&e2).await;

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].1.contains("奇遇报时"));
        assert!(sent[1].1.contains("官方新闻"));
    }

    #[tokio::test]
    async fn test_render_failure_does_not_block_siblings() {
        let sink = Arc::new(RecordingSink::default());
        let router = DeliveryRouter::new(
            Arc::new(MemoryDirectory::new(vec![
                bind("A", Some("ServerOne"), &[Topic::Serendipity]),
                bind("B", Some("ServerOne"), &[Topic::Serendipity]),
            ])),
            Arc::new(FlakyRenderer {
                calls: AtomicUsize::new(0),
            }),
            Arc::clone(&sink) as Arc<dyn BroadcastSink>,
        );

        let outcomes = router.dispatch(&serendipity_event("ServerOne")).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].result.is_err());
        assert!(outcomes[1].result.is_ok());
        // B still received its message despite A's renderer failure.
        assert_eq!(sink.sent_to(), vec!["B".to_string()]);
    }

    #[tokio::test]
    async fn test_unrecognized_code_never_reaches_the_sink() {
        let frame = json!({ "code": "9999", "data": { "server": "ServerOne" } }).to_string();
        assert!(classify(&frame).is_none());
        // Nothing to dispatch; zero sink invocations by construction.
    }

    #[tokio::test]
    async fn test_directory_failure_abandons_the_pass() {
        struct BrokenDirectory;

        #[async_trait]
        impl SubscriberDirectory for BrokenDirectory {
            async fn get_all(&self) -> Result<Vec<GroupBind>, DirectoryError> {
                Err(DirectoryError::Unavailable("pool exhausted".to_string()))
            }
        }

        let sink = Arc::new(RecordingSink::default());
        let router = DeliveryRouter::new(
            Arc::new(BrokenDirectory),
            Arc::new(TemplateRenderer::new()),
            Arc::clone(&sink) as Arc<dyn BroadcastSink>,
        );

        let outcomes = router.dispatch(&news_event()).await;
        assert!(outcomes.is_empty());
        assert!(sink.sent_to().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_takes_effect_on_next_event() {
        let directory = Arc::new(MemoryDirectory::new(vec![bind(
            "A",
            Some("ServerOne"),
            &[Topic::News],
        )]));
        let sink = Arc::new(RecordingSink::default());
        let router = DeliveryRouter::new(
            Arc::clone(&directory) as Arc<dyn SubscriberDirectory>,
            Arc::new(TemplateRenderer::new()),
            Arc::clone(&sink) as Arc<dyn BroadcastSink>,
        );

        router.dispatch(&news_event()).await;
        assert_eq!(sink.sent_to().len(), 1);

        // Flip the toggle off; the very next event must see it.
        directory.replace(vec![bind("A", Some("ServerOne"), &[])]);
        router.dispatch(&news_event()).await;
        assert_eq!(sink.sent_to().len(), 1);
    }
}
