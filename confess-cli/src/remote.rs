//! HTTP transport for the confession sync client.
//!
//! Connects to a confession server's /api endpoints:
//! - List:   GET  /api/confessions (probe + feed snapshot)
//! - Create: POST /api/confessions
//! - Stream: GET  /api/stream (persistent SSE, decoded to typed events)

use async_trait::async_trait;
use confess_core::{Confession, ConfessError, Result};
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;

/// One decoded event from the push stream.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Initial batch sent when the stream connection opens.
    Init(Vec<Confession>),
    /// A single record published after the init batch.
    Record(Confession),
}

/// Network seam of the sync session. Implemented by [`RemoteClient`] and
/// by a mock in session tests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the current snapshot. Also serves as the reachability probe.
    async fn list(&self) -> Result<Vec<Confession>>;

    /// Submit a new confession; returns the server-created record.
    async fn create(&self, message: &str) -> Result<Confession>;

    /// Open the push stream. Events arrive on the returned channel; the
    /// channel closing signals stream failure or server disconnect.
    async fn stream(&self) -> Result<mpsc::UnboundedReceiver<StreamEvent>>;
}

/// HTTP client for a remote confession server.
pub struct RemoteClient {
    base_url: String,
    http: reqwest::Client,
}

impl RemoteClient {
    /// Create a new client targeting `base_url` (e.g. `http://server:3000`).
    ///
    /// No overall request timeout: the stream connection is long-lived and
    /// its failure is detected through the transport's own error event.
    pub fn new(base_url: &str) -> Result<Self> {
        let url = base_url.trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| ConfessError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { base_url: url, http })
    }
}

#[async_trait]
impl Transport for RemoteClient {
    async fn list(&self) -> Result<Vec<Confession>> {
        let url = format!("{}/api/confessions", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ConfessError::Transport(format!("Failed to connect to {}: {}", url, e)))?;
        if !resp.status().is_success() {
            return Err(ConfessError::Transport(format!(
                "GET /api/confessions failed ({})",
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|e| ConfessError::Transport(format!("Malformed list response: {}", e)))
    }

    async fn create(&self, message: &str) -> Result<Confession> {
        let url = format!("{}/api/confessions", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "message": message }))
            .send()
            .await
            .map_err(|e| ConfessError::Transport(format!("Failed to connect to {}: {}", url, e)))?;

        let status = resp.status();
        if status == reqwest::StatusCode::BAD_REQUEST {
            let err: ApiError = resp.json().await.unwrap_or_default();
            return Err(ConfessError::Validation(err.error));
        }
        if !status.is_success() {
            return Err(ConfessError::Transport(format!(
                "POST /api/confessions failed ({})",
                status
            )));
        }
        resp.json()
            .await
            .map_err(|e| ConfessError::Transport(format!("Malformed create response: {}", e)))
    }

    async fn stream(&self) -> Result<mpsc::UnboundedReceiver<StreamEvent>> {
        let url = format!("{}/api/stream", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ConfessError::Transport(format!("Failed to open stream: {}", e)))?;
        if !resp.status().is_success() {
            return Err(ConfessError::Transport(format!(
                "GET /api/stream failed ({})",
                resp.status()
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut bytes = resp.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        tracing::debug!("Stream read failed: {}", e);
                        break;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                // Events are separated by a blank line.
                while let Some(end) = buffer.find("\n\n") {
                    let raw = buffer[..end].to_string();
                    buffer.drain(..end + 2);
                    if let Some(event) = decode_event(&raw) {
                        if tx.send(event).is_err() {
                            return; // receiver gone, stop reading
                        }
                    }
                }
            }
            // tx drops here; the closed channel signals stream failure
        });

        Ok(rx)
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: String,
}

impl Default for ApiError {
    fn default() -> Self {
        Self {
            error: "Message required".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct InitFrame {
    #[serde(rename = "type")]
    kind: String,
    confessions: Vec<Confession>,
}

/// Decode one SSE event. A malformed payload is dropped with a warning;
/// it never terminates the stream.
fn decode_event(raw: &str) -> Option<StreamEvent> {
    let mut data = String::new();
    for line in raw.lines() {
        if let Some(rest) = line.strip_prefix("data: ") {
            data.push_str(rest);
        } else if let Some(rest) = line.strip_prefix("data:") {
            data.push_str(rest);
        }
    }
    if data.is_empty() {
        return None;
    }

    if let Ok(init) = serde_json::from_str::<InitFrame>(&data) {
        if init.kind == "init" {
            return Some(StreamEvent::Init(init.confessions));
        }
    }
    match serde_json::from_str::<Confession>(&data) {
        Ok(record) => Some(StreamEvent::Record(record)),
        Err(e) => {
            tracing::warn!("Dropping malformed stream event: {}", e);
            None
        }
    }
}
