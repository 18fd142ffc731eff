//! # Push Pipeline Dry Run
//!
//! Feeds canned frames through the classify→route pipeline against an
//! in-memory directory and a stdout sink, and prints every delivery
//! decision. No network, no database.

use std::sync::Arc;

use async_trait::async_trait;

use lib_jx3::connections::MemoryDirectory;
use lib_jx3::core::model::SinkError;
use lib_jx3::core::router::BroadcastSink;
use lib_jx3::ingestors::FrameHandler;
use lib_jx3::{DeliveryRouter, EventPipeline, GroupBind, TemplateRenderer, Topic};

/// Prints each delivery to stdout instead of calling a chat API.
struct StdoutSink;

#[async_trait]
impl BroadcastSink for StdoutSink {
    async fn send(&self, group_id: &str, message: &str) -> Result<(), SinkError> {
        println!("--> group {}:\n{}\n", group_id, message);
        Ok(())
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

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    // // Statement: Two groups on ServerOne (one opted out), one on ServerTwo
    let directory = Arc::new(MemoryDirectory::new(vec![
        bind("1001001", Some("ServerOne"), &[Topic::Serendipity, Topic::News]),
        bind("1001002", Some("ServerOne"), &[Topic::News]),
        bind("2002001", Some("ServerTwo"), &[Topic::Serendipity, Topic::News]),
    ]));

    let router = DeliveryRouter::new(directory, Arc::new(TemplateRenderer::new()), Arc::new(StdoutSink));
    let pipeline = EventPipeline::new(router);

    let frames = [
        // Scoped serendipity on ServerOne: only group 1001001 qualifies.
        r#"{"code":"1001","data":{"server":"ServerOne","name":"Bob","event":"阴阳两界"}}"#,
        // Global news: every news-enabled group qualifies.
        r#"{"code":"2002","data":{"title":"版本公告","url":"https://example.com/news"}}"#,
        // Unknown code: dropped by the classifier, zero deliveries.
        r#"{"code":"9999","data":{}}"#,
        // Malformed frame: dropped by the classifier.
        "not even json",
    ];

    for frame in frames {
        println!("[*] Frame: {}", frame);
        pipeline.on_frame(frame).await;
    }

    println!("[SUCCESS] Pipeline dry run complete.");
}
