//! # OneBot Broadcast Sink
//!
//! Delivers finished messages to chat groups through a OneBot-compatible
//! HTTP API (`send_group_msg`). One failed destination never affects the
//! others; the router logs and swallows the per-group error.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use url::Url;

use crate::core::model::SinkError;
use crate::core::router::BroadcastSink;

/// HTTP client for the OneBot `send_group_msg` endpoint.
pub struct OneBotSink {
    client: reqwest::Client,
    endpoint: Url,
    access_token: Option<String>,
}

impl OneBotSink {
    /// Creates a sink for the given OneBot HTTP API base URL.
    ///
    /// # Arguments
    /// * `api_url` - The API base (e.g. "http://127.0.0.1:5700/").
    /// * `access_token` - Optional bearer token for the API.
    pub fn new(api_url: &str, access_token: Option<String>) -> Result<Self, SinkError> {
        let base = Url::parse(api_url).map_err(|e| SinkError::Transport(e.to_string()))?;
        let endpoint = base
            .join("send_group_msg")
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            access_token,
        })
    }
}

#[async_trait]
impl BroadcastSink for OneBotSink {
    async fn send(&self, group_id: &str, message: &str) -> Result<(), SinkError> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .json(&json!({ "group_id": group_id, "message": message }));
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Rejected(format!("HTTP {}", status)));
        }

        // OneBot reports API-level failure in the body, not the HTTP status.
        let body: Value = response
            .json()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        if body.get("status").and_then(Value::as_str) == Some("failed") {
            let retcode = body.get("retcode").and_then(Value::as_i64).unwrap_or(-1);
            return Err(SinkError::Rejected(format!("retcode {}", retcode)));
        }
        Ok(())
    }
}
