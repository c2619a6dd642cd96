//! Client-side confession cache.
//!
//! A capped, deduplicated, newest-first list persisted as a single JSON
//! document. This cache is the system of record whenever the server is
//! unreachable, so it is loaded permissively (corrupt or missing storage
//! becomes an empty list) and never discards locally authored records due
//! to network state changes.

use std::path::{Path, PathBuf};

use crate::record::Confession;

/// Maximum number of records retained by the client cache.
pub const CACHE_CAP: usize = 50;

/// Where an incoming record is inserted relative to the existing list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePosition {
    /// Newly created or live-pushed records go to the front.
    Front,
    /// Bulk-loaded historical batches go to the back.
    Back,
}

/// Durable client-local record list. Owned by a single session, so no
/// internal locking.
pub struct LocalCache {
    path: PathBuf,
    records: Vec<Confession>,
}

impl LocalCache {
    /// Load the cache from `path`. Parse or read failures reset to an
    /// empty list; they are logged and never propagated.
    pub fn load(path: &Path) -> Self {
        let records = if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(data) => match serde_json::from_str(&data) {
                    Ok(records) => records,
                    Err(e) => {
                        tracing::warn!("Corrupt cache at {:?}, starting empty: {}", path, e);
                        Vec::new()
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read cache at {:?}, starting empty: {}", path, e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        Self {
            path: path.to_path_buf(),
            records,
        }
    }

    /// Admit `record` unless its id is already present. Returns whether the
    /// record was newly admitted, which drives whether the caller renders it.
    pub fn merge(&mut self, record: Confession, position: MergePosition) -> bool {
        if self.records.iter().any(|r| r.id == record.id) {
            return false;
        }

        match position {
            MergePosition::Front => self.records.insert(0, record),
            MergePosition::Back => self.records.push(record),
        }
        self.records.truncate(CACHE_CAP);
        self.persist();
        true
    }

    /// Up to `limit` most-recent records, newest-first.
    pub fn list(&self, limit: usize) -> Vec<Confession> {
        self.records.iter().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn persist(&self) {
        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let json = serde_json::to_string(&self.records)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            std::fs::write(&self.path, json)
        };
        if let Err(e) = write() {
            tracing::warn!("Failed to persist cache to {:?}: {}", self.path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(msg: &str) -> Confession {
        Confession::new(msg.to_string(), None)
    }

    fn cache_in(dir: &tempfile::TempDir) -> LocalCache {
        LocalCache::load(&dir.path().join("cache.json"))
    }

    #[test]
    fn test_merge_front_and_back_positions() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = cache_in(&dir);

        assert!(cache.merge(record("live"), MergePosition::Front));
        assert!(cache.merge(record("historical"), MergePosition::Back));
        assert!(cache.merge(record("newer live"), MergePosition::Front));

        let listed = cache.list(10);
        assert_eq!(listed[0].message, "newer live");
        assert_eq!(listed[1].message, "live");
        assert_eq!(listed[2].message, "historical");
    }

    #[test]
    fn test_merge_deduplicates_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = cache_in(&dir);

        let rec = record("echoed");
        assert!(cache.merge(rec.clone(), MergePosition::Front));
        // same id arriving again, via either path, is a no-op
        assert!(!cache.merge(rec.clone(), MergePosition::Front));
        assert!(!cache.merge(rec, MergePosition::Back));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cap_applied_after_insertion() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = cache_in(&dir);

        for i in 0..(CACHE_CAP + 5) {
            cache.merge(record(&format!("msg {}", i)), MergePosition::Front);
        }
        assert_eq!(cache.len(), CACHE_CAP);
        assert_eq!(cache.list(1)[0].message, format!("msg {}", CACHE_CAP + 4));
    }

    #[test]
    fn test_persists_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let mut cache = LocalCache::load(&path);
        let rec = record("durable");
        cache.merge(rec.clone(), MergePosition::Front);
        drop(cache);

        let reloaded = LocalCache::load(&path);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.list(1)[0].id, rec.id);
    }

    #[test]
    fn test_corrupt_storage_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{{{ not json").unwrap();

        let cache = LocalCache::load(&path);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_missing_storage_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::load(&dir.path().join("nope.json"));
        assert!(cache.is_empty());
    }
}
