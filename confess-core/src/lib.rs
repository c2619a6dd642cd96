//! Confess Core Library
//!
//! Core functionality for the confession feed:
//! - Record model (ids, timestamps, sanitization)
//! - Server record store (capped, newest-first, JSON-document persistence)
//! - Broadcast hub for live stream fan-out
//! - Client local cache with dedup merge
//! - Error taxonomy shared across server and client

pub mod cache;
pub mod error;
pub mod hub;
pub mod record;
pub mod store;

pub use cache::{LocalCache, MergePosition, CACHE_CAP};
pub use error::{ConfessError, Result};
pub use hub::{BroadcastHub, Subscription};
pub use record::{
    display_time, generate_author_id, generate_record_id, prepare_message, sanitize_message,
    Confession,
};
pub use store::{RecordStore, STORE_CAP};
