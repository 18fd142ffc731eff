use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;

use lib_jx3::connections::{BindStore, OneBotSink};
use lib_jx3::ingestors::{Jx3WssManager, WssConfig};
use lib_jx3::{DeliveryRouter, EventPipeline, TemplateRenderer};

mod push_logic;
use push_logic::{config, logger};

#[tokio::main]
async fn main() -> Result<()> {
    // Explicitly install the default crypto provider for rustls
    let _ = rustls::crypto::ring::default_provider().install_default();
    dotenvy::dotenv().ok();

    let config = config::load_config();
    logger::setup_logging(
        config.log_dir.as_deref().unwrap_or(Path::new("./logs")),
        config.log_level.as_deref().unwrap_or("info"),
    )?;

    // Bind store (subscriber directory)
    let database_url = config
        .database_url
        .clone()
        .context("databaseUrl is not configured")?;
    let store = Arc::new(BindStore::connect(
        &database_url,
        config.db_max_connections.unwrap_or(4),
    )?);
    store.init_schema().await?;
    log::info!(
        "Bind store ready (default server: {})",
        config.default_server.as_deref().unwrap_or("-")
    );

    // Broadcast sink + renderer + router
    let onebot_url = config
        .onebot_url
        .clone()
        .context("onebotUrl is not configured")?;
    let sink = Arc::new(OneBotSink::new(&onebot_url, config.onebot_token.clone())?);
    let renderer = Arc::new(TemplateRenderer::new());
    let router = DeliveryRouter::new(store, renderer, sink);
    let pipeline = Arc::new(EventPipeline::new(router));

    // Upstream connection manager
    let manager = Jx3WssManager::new(
        WssConfig {
            ws_url: config
                .ws_url
                .clone()
                .context("wsUrl is not configured")?,
            ws_token: config.ws_token.clone(),
            reconnect_delay: Duration::from_secs(config.reconnect_delay_seconds.unwrap_or(10)),
        },
        pipeline,
    );
    manager.start();

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Ctrl-C received, initiating shutdown.");
        }
        _ = async {
            #[cfg(unix)]
            {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut term_signal) => {
                        term_signal.recv().await;
                        log::info!("SIGTERM received, initiating shutdown.");
                    }
                    Err(e) => {
                        log::error!("Failed to install SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                // On non-unix platforms, just wait forever.
                std::future::pending::<()>().await;
            }
        } => {}
    }

    // Scoped teardown: cancels any pending reconnect and joins the task.
    manager.stop().await;

    log::info!("Shutdown complete.");
    Ok(())
}
