//! Server-side confession store.
//!
//! Holds the canonical newest-first list, capped at [`STORE_CAP`] entries,
//! and rewrites the backing JSON document on every accepted append.
//! Durability is best-effort: a failed write is logged and the in-memory
//! record is still returned to the caller.

use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::record::{prepare_message, Confession};

/// Maximum number of records retained by the server store.
pub const STORE_CAP: usize = 500;

/// Canonical ordered record store backed by a single JSON array document.
pub struct RecordStore {
    path: PathBuf,
    /// Newest-first. The mutex serializes the read-modify-persist cycle so
    /// id generation and truncation stay atomic under parallel creates.
    records: Mutex<Vec<Confession>>,
}

impl RecordStore {
    /// Open the store at `path`, loading any existing document.
    /// A missing or unreadable document starts the store empty (logged,
    /// non-fatal).
    pub fn open(path: &Path) -> Self {
        let records = match load_document(path) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Failed to load confessions from {:?}: {}", path, e);
                Vec::new()
            }
        };
        Self {
            path: path.to_path_buf(),
            records: Mutex::new(records),
        }
    }

    /// Return up to `limit` most-recent records, newest-first.
    pub async fn list(&self, limit: usize) -> Vec<Confession> {
        let records = self.records.lock().await;
        records.iter().take(limit).cloned().collect()
    }

    /// Current record count.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Validate `message`, create a record, prepend it, truncate to cap,
    /// and persist the full document before returning.
    ///
    /// Fails only on validation; a persistence failure is logged and the
    /// accepted record is returned anyway.
    pub async fn append(&self, message: &str) -> Result<Confession> {
        let message = prepare_message(message)?;

        let mut records = self.records.lock().await;
        let record = Confession::new(message, None);
        records.insert(0, record.clone());
        records.truncate(STORE_CAP);

        if let Err(e) = save_document(&self.path, &records) {
            tracing::error!("Failed to save confessions to {:?}: {}", self.path, e);
        }

        Ok(record)
    }
}

fn load_document(path: &Path) -> Result<Vec<Confession>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

fn save_document(path: &Path, records: &[Confession]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(path, json)?;
    Ok(())
}
