//! Error taxonomy for the confession feed.
//!
//! Three failure classes, each with its own containment policy:
//! validation surfaces to the user, transport triggers the local-only
//! fallback, persistence is logged and never blocks the operation.

/// Result type for confession operations
pub type Result<T> = std::result::Result<T, ConfessError>;

/// Errors that can occur while storing, caching, or syncing confessions
#[derive(Debug, thiserror::Error)]
pub enum ConfessError {
    /// User-correctable input error (empty message, etc.)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Network unreachable, non-success status, or malformed payload
    #[error("Transport error: {0}")]
    Transport(String),

    /// Durable storage read/write failure on either side
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ConfessError {
    /// Whether this error should be surfaced to the end user at all.
    /// Persistence failures are contained: logged, never shown.
    pub fn is_user_visible(&self) -> bool {
        matches!(self, ConfessError::Validation(_) | ConfessError::Transport(_))
    }
}
