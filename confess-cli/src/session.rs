//! Reconciling sync session.
//!
//! Owns the local cache and drives the dual-mode state machine:
//!
//! ```text
//! Uninitialized → Probing → {Connected, Offline}
//! Connected → Reconnecting (stream failure) → Connected (next re-probe)
//! ```
//!
//! The UI boundary is message passing only: commands come in through the
//! session methods, render/status output goes out as [`UiEvent`]s. Every
//! inbound record is merged through the cache so duplicate ids (including
//! the echo of a record this client just created) are never rendered twice.

use confess_core::{Confession, ConfessError, LocalCache, MergePosition, Result};
use tokio::sync::mpsc;

use crate::remote::{StreamEvent, Transport};

/// How many records a feed command renders.
const FEED_LIMIT: usize = 10;

/// Connection state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Probing,
    Connected,
    Offline,
    Reconnecting,
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Probing => "probing",
            SessionState::Connected => "connected",
            SessionState::Offline => "offline",
            SessionState::Reconnecting => "reconnecting",
        }
    }
}

/// Output events emitted by the session toward the terminal layer.
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// Render one confession.
    Rendered(Confession),
    /// Connection state changed; `text` is the new status line.
    Status(String),
    /// One-off informational line.
    Notice(String),
}

/// The sync client: reconciles server-pushed records against the local
/// cache and falls back to local-only operation without connectivity.
pub struct Session<T: Transport> {
    transport: T,
    cache: LocalCache,
    author: String,
    state: SessionState,
    events: mpsc::UnboundedSender<UiEvent>,
    pushes: Option<mpsc::UnboundedReceiver<StreamEvent>>,
}

impl<T: Transport> Session<T> {
    pub fn new(
        transport: T,
        cache: LocalCache,
        author: String,
        events: mpsc::UnboundedSender<UiEvent>,
    ) -> Self {
        Self {
            transport,
            cache,
            author,
            state: SessionState::Uninitialized,
            events,
            pushes: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Probe the server and transition to Connected or Offline.
    ///
    /// On success the initial batch is merged at the back of the cache
    /// (historical records, not re-rendered) and the push stream is opened.
    pub async fn connect(&mut self) {
        self.set_state(SessionState::Probing);

        let batch = match self.transport.list().await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::debug!("Probe failed: {}", e);
                self.set_state(SessionState::Offline);
                return;
            }
        };

        for record in batch {
            self.cache.merge(record, MergePosition::Back);
        }

        match self.transport.stream().await {
            Ok(receiver) => {
                self.pushes = Some(receiver);
                self.set_state(SessionState::Connected);
            }
            Err(e) => {
                tracing::debug!("Stream open failed: {}", e);
                self.set_state(SessionState::Offline);
            }
        }
    }

    /// Wait for the next stream event. Pends forever when no stream is
    /// open, so this is safe to use as a `select!` branch.
    pub async fn next_push(&mut self) -> Option<StreamEvent> {
        match self.pushes.as_mut() {
            Some(receiver) => receiver.recv().await,
            None => std::future::pending().await,
        }
    }

    /// Ingest the result of [`next_push`]. `None` means the stream died.
    ///
    /// [`next_push`]: Session::next_push
    pub fn handle_push(&mut self, event: Option<StreamEvent>) {
        match event {
            Some(StreamEvent::Init(batch)) => {
                for record in batch {
                    self.cache.merge(record, MergePosition::Back);
                }
            }
            Some(StreamEvent::Record(record)) => {
                if self.cache.merge(record.clone(), MergePosition::Front) {
                    self.emit(UiEvent::Rendered(record));
                }
            }
            None => {
                self.pushes = None;
                if self.state == SessionState::Connected {
                    self.set_state(SessionState::Reconnecting);
                }
            }
        }
    }

    /// Submit a confession. The user always gets a rendered confirmation:
    /// remotely when connected, locally otherwise or on any failure.
    ///
    /// Returns a validation error for empty messages so the caller can
    /// show usage; no record is created in that case.
    pub async fn submit(&mut self, raw: &str) -> Result<()> {
        // Validates and sanitizes in one step. The sanitized form is only
        // used for the local path; the server sanitizes at creation, so
        // the wire carries the trimmed original.
        let message = confess_core::prepare_message(raw)?;

        self.try_reconnect().await;

        if self.state == SessionState::Connected {
            match self.transport.create(raw.trim()).await {
                Ok(record) => {
                    if self.cache.merge(record.clone(), MergePosition::Front) {
                        self.emit(UiEvent::Rendered(record));
                    }
                    self.emit(UiEvent::Notice("Confession shared".to_string()));
                    return Ok(());
                }
                Err(ConfessError::Validation(msg)) => {
                    return Err(ConfessError::Validation(msg));
                }
                Err(e) => {
                    tracing::debug!("Remote create failed, storing locally: {}", e);
                    self.emit(UiEvent::Status(
                        "Server unreachable, stored locally".to_string(),
                    ));
                }
            }
        }

        self.submit_local(message);
        Ok(())
    }

    /// Render the feed: up to 10 most-recent records. When connected the
    /// snapshot is fetched and merged first; duplicates are absorbed by
    /// the cache, so nothing is double-counted.
    pub async fn feed(&mut self) {
        self.try_reconnect().await;

        if self.state == SessionState::Connected {
            match self.transport.list().await {
                Ok(batch) => {
                    for record in batch {
                        self.cache.merge(record, MergePosition::Back);
                    }
                }
                Err(e) => {
                    tracing::debug!("Feed fetch failed, rendering local cache: {}", e);
                    self.emit(UiEvent::Status(
                        "Server unreachable, showing local feed".to_string(),
                    ));
                }
            }
        }

        let records = self.cache.list(FEED_LIMIT);
        if records.is_empty() {
            self.emit(UiEvent::Notice(
                "No confessions found. Be the first to confess!".to_string(),
            ));
            return;
        }

        self.emit(UiEvent::Notice("=== Recent Confessions ===".to_string()));
        for record in records {
            self.emit(UiEvent::Rendered(record));
        }
    }

    /// Create a record entirely within the local cache and render it.
    fn submit_local(&mut self, message: String) {
        let record = Confession::new_local(message, Some(self.author.clone()));
        if self.cache.merge(record.clone(), MergePosition::Front) {
            self.emit(UiEvent::Rendered(record));
        }
        self.emit(UiEvent::Notice(
            "Confession stored locally (offline mode)".to_string(),
        ));
    }

    /// After a stream failure, re-probe on the next network command rather
    /// than retrying in the background.
    async fn try_reconnect(&mut self) {
        if self.state == SessionState::Reconnecting {
            self.connect().await;
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state == state {
            return;
        }
        self.state = state;
        let status = match state {
            SessionState::Probing => None,
            SessionState::Connected => Some("Connected to confession feed".to_string()),
            SessionState::Offline => {
                Some("Offline: confessions will be stored locally".to_string())
            }
            SessionState::Reconnecting => {
                Some("Connection lost: feed degraded to local mode".to_string())
            }
            SessionState::Uninitialized => None,
        };
        if let Some(text) = status {
            self.emit(UiEvent::Status(text));
        }
    }

    fn emit(&self, event: UiEvent) {
        // The receiver lives for the whole session; a send failure only
        // happens during shutdown and is safe to ignore.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockTransport {
        list_results: Mutex<VecDeque<Result<Vec<Confession>>>>,
        create_results: Mutex<VecDeque<Result<Confession>>>,
        create_calls: AtomicUsize,
        // kept open so stream channels stay alive for the test's duration
        stream_sender: Mutex<Option<mpsc::UnboundedSender<StreamEvent>>>,
    }

    impl MockTransport {
        fn new() -> Self {
            Self {
                list_results: Mutex::new(VecDeque::new()),
                create_results: Mutex::new(VecDeque::new()),
                create_calls: AtomicUsize::new(0),
                stream_sender: Mutex::new(None),
            }
        }

        fn push_list(&self, result: Result<Vec<Confession>>) {
            self.list_results.lock().unwrap().push_back(result);
        }

        fn push_create(&self, result: Result<Confession>) {
            self.create_results.lock().unwrap().push_back(result);
        }
    }

    #[async_trait]
    impl Transport for &'static MockTransport {
        async fn list(&self) -> Result<Vec<Confession>> {
            self.list_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ConfessError::Transport("no scripted response".into())))
        }

        async fn create(&self, _message: &str) -> Result<Confession> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            self.create_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ConfessError::Transport("no scripted response".into())))
        }

        async fn stream(&self) -> Result<mpsc::UnboundedReceiver<StreamEvent>> {
            let (tx, rx) = mpsc::unbounded_channel();
            *self.stream_sender.lock().unwrap() = Some(tx);
            Ok(rx)
        }
    }

    fn record(msg: &str) -> Confession {
        Confession::new(msg.to_string(), None)
    }

    struct Harness {
        transport: &'static MockTransport,
        session: Session<&'static MockTransport>,
        events: mpsc::UnboundedReceiver<UiEvent>,
        _tmp: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let transport: &'static MockTransport = Box::leak(Box::new(MockTransport::new()));
        let tmp = tempfile::tempdir().unwrap();
        let cache = LocalCache::load(&tmp.path().join("cache.json"));
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session::new(transport, cache, "user@testsession00".to_string(), tx);
        Harness {
            transport,
            session,
            events: rx,
            _tmp: tmp,
        }
    }

    fn rendered(events: &mut mpsc::UnboundedReceiver<UiEvent>) -> Vec<Confession> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let UiEvent::Rendered(record) = event {
                out.push(record);
            }
        }
        out
    }

    #[tokio::test]
    async fn test_probe_success_connects_and_merges_batch() {
        let mut h = harness();
        let batch = vec![record("c"), record("b"), record("a")]; // newest-first
        h.transport.push_list(Ok(batch));

        h.session.connect().await;
        assert_eq!(h.session.state(), SessionState::Connected);

        // the initial batch is merged without rendering
        assert!(rendered(&mut h.events).is_empty());

        // a later feed shows exactly those 3, newest-first, no duplicates
        h.transport.push_list(Ok(Vec::new()));
        h.session.feed().await;
        let shown = rendered(&mut h.events);
        assert_eq!(shown.len(), 3);
        assert_eq!(shown[0].message, "c");
        assert_eq!(shown[2].message, "a");
    }

    #[tokio::test]
    async fn test_probe_failure_goes_offline() {
        let mut h = harness();
        h.transport
            .push_list(Err(ConfessError::Transport("connection refused".into())));

        h.session.connect().await;
        assert_eq!(h.session.state(), SessionState::Offline);
    }

    #[tokio::test]
    async fn test_offline_submit_is_local_only() {
        let mut h = harness();
        h.transport
            .push_list(Err(ConfessError::Transport("unreachable".into())));
        h.session.connect().await;

        h.session.submit("hello").await.unwrap();

        let shown = rendered(&mut h.events);
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].message, "hello");
        assert!(shown[0].is_local());
        assert_eq!(shown[0].author.as_deref(), Some("user@testsession00"));
        // no network call served the confirmation
        assert_eq!(h.transport.create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_submit_never_creates_a_record() {
        let mut h = harness();
        h.transport
            .push_list(Err(ConfessError::Transport("unreachable".into())));
        h.session.connect().await;

        assert!(h.session.submit("   ").await.is_err());
        assert!(rendered(&mut h.events).is_empty());
        assert_eq!(h.transport.create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_create_echo_renders_once() {
        let mut h = harness();
        h.transport.push_list(Ok(Vec::new()));
        h.session.connect().await;

        let mut created = record("my confession");
        created.id = "abc123".to_string();
        h.transport.push_create(Ok(created.clone()));

        h.session.submit("my confession").await.unwrap();
        // the same id echoed back through the push stream
        h.session
            .handle_push(Some(StreamEvent::Record(created.clone())));

        let shown = rendered(&mut h.events);
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].id, "abc123");
    }

    #[tokio::test]
    async fn test_pushed_record_renders_and_dedups() {
        let mut h = harness();
        h.transport.push_list(Ok(Vec::new()));
        h.session.connect().await;

        let rec = record("pushed");
        h.session.handle_push(Some(StreamEvent::Record(rec.clone())));
        h.session.handle_push(Some(StreamEvent::Record(rec)));

        assert_eq!(rendered(&mut h.events).len(), 1);
    }

    #[tokio::test]
    async fn test_stream_failure_degrades_to_reconnecting() {
        let mut h = harness();
        h.transport.push_list(Ok(Vec::new()));
        h.session.connect().await;
        assert_eq!(h.session.state(), SessionState::Connected);

        h.session.handle_push(None);
        assert_eq!(h.session.state(), SessionState::Reconnecting);

        // the degraded status was surfaced
        let mut saw_status = false;
        while let Ok(event) = h.events.try_recv() {
            if let UiEvent::Status(text) = event {
                saw_status = text.contains("degraded") || saw_status;
            }
        }
        assert!(saw_status);
    }

    #[tokio::test]
    async fn test_reconnecting_reprobes_on_next_command() {
        let mut h = harness();
        h.transport.push_list(Ok(Vec::new()));
        h.session.connect().await;
        h.session.handle_push(None);
        assert_eq!(h.session.state(), SessionState::Reconnecting);

        // next feed command probes again and recovers
        h.transport.push_list(Ok(Vec::new()));
        h.transport.push_list(Ok(Vec::new()));
        h.session.feed().await;
        assert_eq!(h.session.state(), SessionState::Connected);
    }

    #[tokio::test]
    async fn test_connected_create_failure_falls_back_to_local() {
        let mut h = harness();
        h.transport.push_list(Ok(Vec::new()));
        h.session.connect().await;

        h.transport
            .push_create(Err(ConfessError::Transport("server died".into())));
        h.session.submit("still rendered").await.unwrap();

        let shown = rendered(&mut h.events);
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].message, "still rendered");
        assert!(shown[0].is_local());
    }

    #[tokio::test]
    async fn test_feed_renders_at_most_ten() {
        let mut h = harness();
        h.transport
            .push_list(Err(ConfessError::Transport("unreachable".into())));
        h.session.connect().await;

        for i in 0..15 {
            h.session.submit(&format!("msg {}", i)).await.unwrap();
        }
        let _ = rendered(&mut h.events);

        h.session.feed().await;
        let shown = rendered(&mut h.events);
        assert_eq!(shown.len(), 10);
        assert_eq!(shown[0].message, "msg 14");
    }
}
