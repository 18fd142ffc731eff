//! # Live Push Feed Test
//!
//! Connects to the real JX3 push endpoint and logs every inbound frame for
//! one minute, then tears down. Set `JX3_WS_TOKEN` to test token mode.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use lib_jx3::ingestors::{FrameHandler, Jx3WssManager, WssConfig};

struct PrintingHandler;

#[async_trait]
impl FrameHandler for PrintingHandler {
    async fn on_frame(&self, text: &str) {
        println!("[FRAME] {}", text);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let _ = rustls::crypto::ring::default_provider().install_default();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = WssConfig {
        ws_token: std::env::var("JX3_WS_TOKEN").ok(),
        ..WssConfig::default()
    };
    println!("[*] Connecting to {} ...", config.ws_url);

    let manager = Jx3WssManager::new(config, Arc::new(PrintingHandler));
    manager.start();

    tokio::time::sleep(Duration::from_secs(60)).await;
    println!("[*] One minute elapsed, state: {:?}. Shutting down.", manager.state());

    manager.stop().await;
    println!("[SUCCESS] Live feed test complete.");
    Ok(())
}
