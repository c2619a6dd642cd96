//! Confession record model and id generation.
//!
//! A confession is immutable once created: the id, timestamp, and the
//! human-readable `displayTime` are all assigned at creation and carried
//! with the record so historical display stays stable.

use chrono::{DateTime, Local, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ConfessError, Result};

/// Alphabet for server-issued record ids and session author ids.
const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of a server-issued record id.
const RECORD_ID_LEN: usize = 12;

/// Length of the random part of a per-session author id.
const AUTHOR_ID_LEN: usize = 16;

/// Prefix that namespaces client-issued (offline) ids away from server ids.
/// Server ids are pure `[0-9a-z]`, so the `-` makes collision impossible.
const LOCAL_ID_PREFIX: &str = "local-";

/// A single anonymous confession.
///
/// Wire format is camelCase JSON: `id`, `message`, `timestamp`,
/// `displayTime`, and an optional `author` that is omitted when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Confession {
    /// Opaque unique identifier, stable for the record's lifetime
    pub id: String,

    /// Sanitized confession text
    pub message: String,

    /// Creation instant (RFC 3339 UTC), origin-assigned
    pub timestamp: DateTime<Utc>,

    /// Human-readable rendering of the creation instant, computed once
    pub display_time: String,

    /// Anonymous per-session author id; absent records render under a
    /// generic anonymous label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl Confession {
    /// Build a new record with a server-issued id and current timestamps.
    /// The message must already be validated and sanitized.
    pub fn new(message: String, author: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: generate_record_id(),
            message,
            timestamp: now,
            display_time: display_time(now),
            author,
        }
    }

    /// Build a new record with a client-issued id in the `local-` namespace,
    /// for confessions created without server connectivity.
    pub fn new_local(message: String, author: Option<String>) -> Self {
        let mut record = Self::new(message, author);
        record.id = format!("{}{}", LOCAL_ID_PREFIX, record.id);
        record
    }

    /// Whether this record was created offline (client-issued id).
    pub fn is_local(&self) -> bool {
        self.id.starts_with(LOCAL_ID_PREFIX)
    }
}

/// Validate and sanitize a raw user message.
///
/// Returns the trimmed, HTML-neutralized text, or a validation error if
/// nothing remains after trimming.
pub fn prepare_message(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfessError::Validation("Message required".to_string()));
    }
    Ok(sanitize_message(trimmed))
}

/// Neutralize HTML-unsafe characters. `&` must be replaced first so the
/// entities introduced for `<` and `>` are not double-escaped.
pub fn sanitize_message(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Generate a server-style record id: 12 chars from `[0-9a-z]`.
pub fn generate_record_id() -> String {
    random_string(RECORD_ID_LEN)
}

/// Generate an anonymous per-session author id, e.g. `user@k3x9q...`.
pub fn generate_author_id() -> String {
    format!("user@{}", random_string(AUTHOR_ID_LEN))
}

/// Render a creation instant the way it should appear in the feed.
/// Computed once at creation time, local to the origin.
pub fn display_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

fn random_string(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}
