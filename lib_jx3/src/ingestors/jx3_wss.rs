//! # JX3 WSS Ingestor
//!
//! The long-lived WebSocket client for the JX3 push endpoint. Owns the full
//! socket lifecycle: connect, receive loop, reconnect with a fixed delay,
//! and graceful teardown.
//!
//! The whole lifecycle is driven by a single tokio task, so the invariant
//! "at most one active socket, at most one pending reconnect timer" holds
//! by construction: the only reconnect timer is the `sleep` arm of the
//! task's own `select!`, and re-entering the scheduled state replaces it
//! instead of stacking a second one. A `stop()` racing an in-flight close
//! is resolved by an atomic flag the loop checks before re-arming.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use http::Uri;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::handshake::client::generate_key;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;

use crate::ingestors::FrameHandler;

/// Lifecycle states of the upstream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket, no pending reconnect. Terminal after teardown.
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// The socket is open and frames are being forwarded.
    Connected,
    /// The socket dropped; the single reconnect timer is armed.
    ReconnectScheduled,
}

/// Configuration for the JX3 push WebSocket.
#[derive(Debug, Clone)]
pub struct WssConfig {
    /// The push endpoint.
    pub ws_url: String,
    /// Optional token sent with the handshake. Absence is a valid
    /// "basic mode" connection, not an error.
    pub ws_token: Option<String>,
    /// Fixed delay before each reconnect attempt. Deliberately not an
    /// exponential backoff; the upstream expects patient, flat retries.
    pub reconnect_delay: Duration,
}

impl Default for WssConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://socket.jx3api.com".to_string(),
            ws_token: None,
            reconnect_delay: Duration::from_secs(10),
        }
    }
}

/// Errors raised while preparing the upstream handshake.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The configured endpoint URL cannot be used.
    #[error("invalid push endpoint: {0}")]
    InvalidEndpoint(String),
    /// The handshake request could not be built.
    #[error("handshake request error: {0}")]
    Handshake(String),
}

/// The connection manager for the JX3 push feed.
///
/// `start()` spawns the driving task exactly once; `stop()` is idempotent,
/// cancels any pending reconnect synchronously and suppresses every later
/// transition, including a close event already in flight.
pub struct Jx3WssManager {
    config: WssConfig,
    handler: Arc<dyn FrameHandler>,
    state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
    shutdown_tx: broadcast::Sender<()>,
    stopped: Arc<AtomicBool>,
    started: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Jx3WssManager {
    /// Creates a manager. Nothing connects until [`start`](Self::start).
    pub fn new(config: WssConfig, handler: Arc<dyn FrameHandler>) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            handler,
            state_tx,
            state_rx,
            shutdown_tx,
            stopped: Arc::new(AtomicBool::new(false)),
            started: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }

    /// Establishes the initial connection. A second call is a logged no-op.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            log::warn!("Jx3WssManager::start() called more than once; ignoring");
            return;
        }
        let handle = tokio::spawn(run_loop(
            self.config.clone(),
            Arc::clone(&self.handler),
            self.state_tx.clone(),
            self.shutdown_tx.subscribe(),
            Arc::clone(&self.stopped),
        ));
        *self.task.lock().expect("task lock poisoned") = Some(handle);
    }

    /// Scoped teardown. Cancels the pending reconnect timer, prevents all
    /// future reconnects and waits for the driving task to exit. Safe to
    /// call any number of times, before or after `start()`.
    pub async fn stop(&self) {
        // Flag first: a close handler observing the shutdown late must
        // still see the flag before it could re-arm the timer.
        self.stopped.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());

        let handle = self.task.lock().expect("task lock poisoned").take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                log::error!("Upstream task ended abnormally: {}", e);
            }
        }
        self.state_tx.send_replace(ConnectionState::Disconnected);
    }

    /// The current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// A watch handle for observing state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }
}

/// Primary execution loop with reconnection logic.
async fn run_loop(
    config: WssConfig,
    handler: Arc<dyn FrameHandler>,
    state_tx: watch::Sender<ConnectionState>,
    mut shutdown_rx: broadcast::Receiver<()>,
    stopped: Arc<AtomicBool>,
) {
    loop {
        if stopped.load(Ordering::SeqCst) {
            break;
        }
        state_tx.send_replace(ConnectionState::Connecting);
        log::info!("Connecting to JX3 push endpoint: {}", config.ws_url);

        let request = match build_request(&config) {
            Ok(request) => request,
            Err(e) => {
                // A bad endpoint cannot be retried into working.
                log::error!("Upstream configuration rejected: {}", e);
                break;
            }
        };

        match connect_async(request).await {
            Ok((ws_stream, _)) => {
                if config.ws_token.is_some() {
                    log::info!("WebSocket connected (token mode)");
                } else {
                    log::info!("WebSocket connected (basic mode)");
                }
                state_tx.send_replace(ConnectionState::Connected);

                let (mut write, mut read) = ws_stream.split();
                loop {
                    tokio::select! {
                        _ = shutdown_rx.recv() => {
                            log::info!("Upstream shutting down...");
                            let _ = write.close().await;
                            state_tx.send_replace(ConnectionState::Disconnected);
                            return;
                        }
                        msg = read.next() => {
                            match msg {
                                Some(Ok(WsMessage::Text(text))) => {
                                    // Awaited before the next read so frames
                                    // are dispatched strictly in arrival order.
                                    handler.on_frame(&text).await;
                                }
                                Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => {}
                                Some(Ok(WsMessage::Close(_))) => {
                                    log::warn!("Connection closed by remote");
                                    break;
                                }
                                Some(Err(e)) => {
                                    log::error!("Upstream read error: {}", e);
                                    break;
                                }
                                None => {
                                    log::warn!("Upstream stream ended");
                                    break;
                                }
                                _ => {}
                            }
                        }
                    }
                }
            }
            Err(e) => {
                log::error!("Failed to connect to push endpoint: {}", e);
            }
        }

        // A close racing stop() lands here; the flag wins and nothing re-arms.
        if stopped.load(Ordering::SeqCst) {
            break;
        }
        state_tx.send_replace(ConnectionState::ReconnectScheduled);
        log::warn!(
            "Connection lost, reconnecting in {}ms...",
            config.reconnect_delay.as_millis()
        );
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = sleep(config.reconnect_delay) => {}
        }
    }
    state_tx.send_replace(ConnectionState::Disconnected);
}

/// Builds the upgrade request, attaching the token header when configured.
fn build_request(config: &WssConfig) -> Result<http::Request<()>, IngestError> {
    let uri: Uri = config
        .ws_url
        .parse()
        .map_err(|e| IngestError::InvalidEndpoint(format!("{}: {}", config.ws_url, e)))?;
    let authority = uri
        .authority()
        .ok_or_else(|| IngestError::InvalidEndpoint("missing host".to_string()))?
        .as_str()
        .to_string();

    let mut builder = http::Request::builder()
        .method("GET")
        .uri(uri)
        .header("Host", authority)
        .header("Connection", "Upgrade")
        .header("Upgrade", "websocket")
        .header("Sec-WebSocket-Version", "13")
        .header("Sec-WebSocket-Key", generate_key());
    if let Some(token) = &config.ws_token {
        builder = builder.header("token", token.as_str());
    }
    builder
        .body(())
        .map_err(|e| IngestError::Handshake(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio_tungstenite::accept_async;

    /// Records forwarded frames in arrival order.
    #[derive(Default)]
    struct CollectingHandler {
        frames: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl FrameHandler for CollectingHandler {
        async fn on_frame(&self, text: &str) {
            self.frames.lock().unwrap().push(text.to_string());
        }
    }

    /// A local WebSocket server. Counts accepted connections; sends the
    /// given frames to each client, then either closes or stays open.
    async fn spawn_server(frames: Vec<String>, close_after: bool) -> (String, Arc<AtomicUsize>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connects = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&connects);

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let frames = frames.clone();
                tokio::spawn(async move {
                    let Ok(mut ws) = accept_async(stream).await else {
                        return;
                    };
                    for frame in frames {
                        let _ = ws.send(WsMessage::Text(frame.into())).await;
                    }
                    if close_after {
                        let _ = ws.close(None).await;
                    } else {
                        while let Some(msg) = ws.next().await {
                            if msg.is_err() {
                                break;
                            }
                        }
                    }
                });
            }
        });

        (format!("ws://{}", addr), connects)
    }

    fn manager(url: String, delay_ms: u64, handler: Arc<dyn FrameHandler>) -> Jx3WssManager {
        Jx3WssManager::new(
            WssConfig {
                ws_url: url,
                ws_token: None,
                reconnect_delay: Duration::from_millis(delay_ms),
            },
            handler,
        )
    }

    #[tokio::test]
    async fn test_frames_are_forwarded_in_arrival_order() {
        let (url, _) = spawn_server(
            vec![r#"{"code":"1"}"#.to_string(), r#"{"code":"2"}"#.to_string()],
            false,
        )
        .await;
        let handler = Arc::new(CollectingHandler::default());
        let mgr = manager(url, 50, Arc::clone(&handler) as Arc<dyn FrameHandler>);

        mgr.start();
        sleep(Duration::from_millis(300)).await;

        assert_eq!(mgr.state(), ConnectionState::Connected);
        let frames = handler.frames.lock().unwrap().clone();
        assert_eq!(frames, vec![r#"{"code":"1"}"#, r#"{"code":"2"}"#]);
        mgr.stop().await;
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_reconnects_with_a_single_timer_under_flapping() {
        // The server drops every connection immediately; the manager must
        // keep retrying on its fixed delay without stacking timers.
        let (url, connects) = spawn_server(Vec::new(), true).await;
        let handler = Arc::new(CollectingHandler::default());
        let mgr = manager(url, 100, handler);

        mgr.start();
        sleep(Duration::from_millis(650)).await;

        let count = connects.load(Ordering::SeqCst);
        // One initial connect plus a bounded number of timed retries. A
        // stacked-timer bug would blow well past this in 650ms.
        assert!((2..=8).contains(&count), "unexpected connect count {}", count);
        mgr.stop().await;
    }

    #[tokio::test]
    async fn test_stop_suppresses_reconnect_even_with_close_in_flight() {
        let (url, connects) = spawn_server(Vec::new(), true).await;
        let handler = Arc::new(CollectingHandler::default());
        let mgr = manager(url, 50, handler);

        mgr.start();
        sleep(Duration::from_millis(75)).await;
        mgr.stop().await;

        let count = connects.load(Ordering::SeqCst);
        assert!(count >= 1);
        sleep(Duration::from_millis(300)).await;
        assert_eq!(connects.load(Ordering::SeqCst), count);
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (url, _) = spawn_server(Vec::new(), false).await;
        let handler = Arc::new(CollectingHandler::default());
        let mgr = manager(url, 50, handler);

        mgr.start();
        sleep(Duration::from_millis(100)).await;
        mgr.stop().await;
        mgr.stop().await;
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_stop_without_start_is_a_noop() {
        let handler = Arc::new(CollectingHandler::default());
        let mgr = manager("ws://127.0.0.1:9".to_string(), 50, handler);
        mgr.stop().await;
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_start_twice_opens_one_connection() {
        let (url, connects) = spawn_server(Vec::new(), false).await;
        let handler = Arc::new(CollectingHandler::default());
        let mgr = manager(url, 50, handler);

        mgr.start();
        mgr.start();
        sleep(Duration::from_millis(200)).await;
        assert_eq!(connects.load(Ordering::SeqCst), 1);
        mgr.stop().await;
    }

    #[test]
    fn test_token_header_only_in_token_mode() {
        let basic = build_request(&WssConfig::default()).unwrap();
        assert!(basic.headers().get("token").is_none());

        let with_token = build_request(&WssConfig {
            ws_token: Some("secret".to_string()),
            ..WssConfig::default()
        })
        .unwrap();
        assert_eq!(with_token.headers()["token"], "secret");
    }
}
