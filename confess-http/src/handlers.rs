//! API endpoint handlers.
//!
//! Endpoints:
//!   GET  /api/confessions → JSON array of up to 100 most-recent records
//!   POST /api/confessions → 201 with created record, 400 on validation
//!   GET  /api/stream      → text/event-stream: init batch, then one
//!                           event per published record until disconnect

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use confess_core::{BroadcastHub, ConfessError, RecordStore};
use futures::StreamExt;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Frame;
use hyper::Response;
use serde::Deserialize;
use serde::Serialize;

use crate::ApiBody;

/// Snapshot size for GET /api/confessions.
const LIST_LIMIT: usize = 100;

/// Size of the init batch sent when a stream connection opens.
const INIT_BATCH: usize = 50;

#[derive(Debug, Deserialize)]
struct CreateRequest {
    #[serde(default)]
    message: String,
}

// ─────────────────────────────────────────────────────
// GET /api/confessions
// ─────────────────────────────────────────────────────

pub async fn handle_list(store: &Arc<RecordStore>) -> Response<ApiBody> {
    let records = store.list(LIST_LIMIT).await;
    json_response(200, &records)
}

// ─────────────────────────────────────────────────────
// POST /api/confessions
// ─────────────────────────────────────────────────────

pub async fn handle_create(
    store: &Arc<RecordStore>,
    hub: &Arc<BroadcastHub>,
    body: &[u8],
) -> Response<ApiBody> {
    let request: CreateRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(_) => return json_error(400, "Message required"),
    };

    match store.append(&request.message).await {
        Ok(record) => {
            // Publish only after append has persisted, so subscribers
            // never observe a record the store did not accept.
            let delivered = hub.publish(&record);
            tracing::debug!("Created {} (delivered to {} subscribers)", record.id, delivered);
            json_response(201, &record)
        }
        Err(ConfessError::Validation(msg)) => json_error(400, &msg),
        Err(e) => {
            tracing::error!("Create failed: {}", e);
            json_error(500, "Internal error")
        }
    }
}

// ─────────────────────────────────────────────────────
// GET /api/stream
// ─────────────────────────────────────────────────────

pub async fn handle_stream(store: &Arc<RecordStore>, hub: &Arc<BroadcastHub>) -> Response<ApiBody> {
    // Subscribe before snapshotting the init batch: a record published in
    // between is then either in the batch or in the channel, and the
    // client deduplicates by id.
    let subscription = hub.subscribe();
    let init = store.list(INIT_BATCH).await;

    tracing::debug!(
        "Stream opened as subscriber {} ({} records in init batch)",
        subscription.id(),
        init.len()
    );

    let init_event = sse_event(&serde_json::json!({
        "type": "init",
        "confessions": init,
    }));

    // The subscription rides inside the stream; dropping the body on
    // client disconnect drops it and unsubscribes from the hub.
    let pushes = futures::stream::unfold(subscription, |mut subscription| async move {
        let record = subscription.recv().await?;
        Some((sse_event(&record), subscription))
    });

    let frames = futures::stream::once(async move { init_event })
        .chain(pushes)
        .map(|bytes| Ok::<_, Infallible>(Frame::data(bytes)));

    Response::builder()
        .status(200)
        .header("Content-Type", "text/event-stream")
        .header("Cache-Control", "no-store")
        .header("Access-Control-Allow-Origin", "*")
        .body(StreamBody::new(frames).boxed_unsync())
        .unwrap()
}

/// Frame a value as a single SSE event.
fn sse_event<T: Serialize>(value: &T) -> Bytes {
    match serde_json::to_string(value) {
        Ok(json) => Bytes::from(format!("data: {}\n\n", json)),
        Err(e) => {
            tracing::error!("Failed to encode stream event: {}", e);
            Bytes::new()
        }
    }
}

// ─────────────────────────────────────────────────────
// Response helpers
// ─────────────────────────────────────────────────────

pub fn preflight_response() -> Response<ApiBody> {
    Response::builder()
        .status(204)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type")
        .body(Full::new(Bytes::new()).boxed_unsync())
        .unwrap()
}

pub fn json_response<T: Serialize>(status: u16, value: &T) -> Response<ApiBody> {
    match serde_json::to_vec(value) {
        Ok(json) => Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .header("Access-Control-Allow-Origin", "*")
            .body(Full::new(Bytes::from(json)).boxed_unsync())
            .unwrap(),
        Err(e) => {
            tracing::error!("Failed to serialize response: {}", e);
            json_error(500, "Serialization failed")
        }
    }
}

pub fn json_error(status: u16, message: &str) -> Response<ApiBody> {
    let body = serde_json::json!({ "error": message }).to_string();
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)).boxed_unsync())
        .unwrap()
}
