//! Confess HTTP API
//!
//! Implements the JSON + SSE protocol used by feed clients:
//!   GET  /api/confessions → snapshot of the 100 most recent records
//!   POST /api/confessions → create a record, broadcast it, return it
//!   GET  /api/stream      → persistent event stream (init batch + pushes)

pub mod handlers;

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use confess_core::{BroadcastHub, RecordStore};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Limited};
use hyper::body::Body;
use hyper::{Method, Request, Response};

/// Response body type shared by the plain JSON and streaming handlers.
pub type ApiBody = UnsyncBoxBody<Bytes, Infallible>;

/// API configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
    /// Enable debug logging
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_body_size: 10 * 1024, // 10 KB
            debug: false,
        }
    }
}

/// API request handler.
///
/// Owns handles to the one record store and one broadcast hub of the
/// process; there is no ambient global state.
pub struct ApiHandler {
    config: Config,
    store: Arc<RecordStore>,
    hub: Arc<BroadcastHub>,
}

impl ApiHandler {
    /// Create a handler with default config.
    pub fn new(store: Arc<RecordStore>, hub: Arc<BroadcastHub>) -> Self {
        Self::with_config(Config::default(), store, hub)
    }

    /// Create a handler with custom config.
    pub fn with_config(config: Config, store: Arc<RecordStore>, hub: Arc<BroadcastHub>) -> Self {
        Self { config, store, hub }
    }

    /// Handle an incoming HTTP request. All failures are mapped to JSON
    /// error responses; nothing here terminates the connection loop.
    ///
    /// Generic over the request body so tests can drive the API with
    /// in-memory bodies.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<ApiBody>
    where
        B: Body + Send,
        B::Data: Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        tracing::debug!("API request: {} {}", method, path);

        // CORS preflight
        if method == Method::OPTIONS {
            return handlers::preflight_response();
        }

        // The stream endpoint never carries a body; everything else is
        // read up-front under the body size cap.
        if method == Method::GET && path == "/api/stream" {
            return self.dispatch(method.as_str(), &path, &[]).await;
        }

        let body = match Limited::new(req.into_body(), self.config.max_body_size)
            .collect()
            .await
        {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                tracing::debug!("Request body rejected: {}", e);
                return handlers::json_error(413, "Request body too large");
            }
        };

        self.dispatch(method.as_str(), &path, &body).await
    }

    /// Route a request to the appropriate handler.
    pub async fn dispatch(&self, method: &str, path: &str, body: &[u8]) -> Response<ApiBody> {
        match (method, path) {
            ("GET", "/api/confessions") => handlers::handle_list(&self.store).await,
            ("POST", "/api/confessions") => {
                handlers::handle_create(&self.store, &self.hub, body).await
            }
            ("GET", "/api/stream") => handlers::handle_stream(&self.store, &self.hub).await,
            (_, "/api/confessions") | (_, "/api/stream") => {
                handlers::json_error(405, "Method not allowed")
            }
            _ => handlers::json_error(404, &format!("Unknown endpoint: {} {}", method, path)),
        }
    }
}
