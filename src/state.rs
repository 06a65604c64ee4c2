// src/state.rs
//! Durable dedup store: which post ids have already been notified.
//!
//! Load policy on a corrupt file is FAIL OPEN: start from an empty map
//! and log at WARN, accepting duplicate notifications for recent posts.
//! Writes go through a temp file in the same directory and are renamed
//! into place, so a crash mid-write never leaves a torn file as the only
//! copy.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Proof that one post was already processed. Never mutated after insert,
/// only removed by retention pruning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeenRecord {
    pub first_seen_at: DateTime<Utc>,
}

/// On-disk shape. Unknown fields are ignored on load so newer writers can
/// add metadata without breaking older readers.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    seen: BTreeMap<String, SeenRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    seen: BTreeMap<String, SeenRecord>,
}

impl StateStore {
    /// Load the store from `path`. Missing file starts empty; an unreadable
    /// or corrupt file also starts empty (fail open) after a loud warning.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let seen = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<StateFile>(&raw) {
                Ok(f) => f.seen,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "state file corrupt; failing open with empty dedup state, \
                         already-notified posts may notify again"
                    );
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no state file yet, starting empty");
                BTreeMap::new()
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "state file unreadable; failing open with empty dedup state"
                );
                BTreeMap::new()
            }
        };
        Self { path, seen }
    }

    /// In-memory store for tests and dry runs; `flush` still writes `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            seen: BTreeMap::new(),
        }
    }

    pub fn is_seen(&self, id: &str) -> bool {
        self.seen.contains_key(id)
    }

    /// Insert a record if absent. Idempotent: a second call with the same id
    /// leaves the original `first_seen_at` untouched.
    pub fn mark_seen(&mut self, id: &str, now: DateTime<Utc>) {
        self.seen
            .entry(id.to_string())
            .or_insert(SeenRecord { first_seen_at: now });
    }

    /// Drop every record older than `retention`. Returns how many went.
    pub fn prune(&mut self, retention: Duration, now: DateTime<Utc>) -> usize {
        let before = self.seen.len();
        self.seen.retain(|_, rec| now - rec.first_seen_at <= retention);
        before - self.seen.len()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Persist the current mapping atomically: write a temp file next to the
    /// target, fsync, then rename over it.
    pub fn flush(&self) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating state dir {}", dir.display()))?;

        let file = StateFile {
            seen: self.seen.clone(),
            last_updated: Some(Utc::now()),
        };
        let body = serde_json::to_vec_pretty(&file).context("serializing state")?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("creating temp state file in {}", dir.display()))?;
        tmp.write_all(&body).context("writing temp state file")?;
        tmp.flush().context("flushing temp state file")?;
        tmp.as_file_mut()
            .sync_all()
            .context("syncing temp state file")?;
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .with_context(|| format!("replacing state file {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn mark_seen_twice_is_idempotent() {
        let mut store = StateStore::empty("unused.json");
        store.mark_seen("p1", t(100));
        store.mark_seen("p1", t(999));
        assert!(store.is_seen("p1"));
        assert_eq!(store.len(), 1);
        // first_seen_at from the first call survives
        assert_eq!(store.seen["p1"].first_seen_at, t(100));
    }

    #[test]
    fn prune_removes_only_expired_records() {
        let mut store = StateStore::empty("unused.json");
        store.mark_seen("old", t(0));
        store.mark_seen("fresh", t(900));
        let removed = store.prune(Duration::seconds(600), t(1000));
        assert_eq!(removed, 1);
        assert!(!store.is_seen("old"));
        assert!(store.is_seen("fresh"));
    }

    #[test]
    fn prune_boundary_keeps_exactly_at_retention() {
        let mut store = StateStore::empty("unused.json");
        store.mark_seen("edge", t(400));
        // now - first_seen_at == retention is not "older than"
        assert_eq!(store.prune(Duration::seconds(600), t(1000)), 0);
        assert!(store.is_seen("edge"));
    }

    #[test]
    fn unknown_fields_in_state_file_are_ignored() {
        let raw = r#"{
            "seen": { "p1": { "first_seen_at": "2026-01-02T03:04:05Z" } },
            "last_updated": "2026-01-02T03:04:05Z",
            "schema_version": 7,
            "future_field": { "nested": true }
        }"#;
        let parsed: StateFile = serde_json::from_str(raw).unwrap();
        assert!(parsed.seen.contains_key("p1"));
    }
}
