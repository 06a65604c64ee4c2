// tests/state_store.rs
// Persistence behavior of the dedup store across process "restarts"
// (fresh loads of the same file).

use chrono::{Duration, Utc};
use creator_watch::state::StateStore;

#[test]
fn survives_reload_and_stays_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("state").join("seen.json");
    let now = Utc::now();

    let mut store = StateStore::load(&path);
    assert!(store.is_empty());
    store.mark_seen("a", now);
    store.mark_seen("b", now);
    store.mark_seen("a", now); // duplicate
    store.flush().unwrap();

    let reloaded = StateStore::load(&path);
    assert_eq!(reloaded.len(), 2);
    assert!(reloaded.is_seen("a"));
    assert!(reloaded.is_seen("b"));
    assert!(!reloaded.is_seen("c"));
}

#[test]
fn prune_takes_effect_across_restart() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("seen.json");
    let now = Utc::now();

    let mut store = StateStore::load(&path);
    store.mark_seen("old", now - Duration::days(40));
    store.mark_seen("fresh", now - Duration::days(1));
    store.flush().unwrap();

    let mut reloaded = StateStore::load(&path);
    let removed = reloaded.prune(Duration::days(30), now);
    assert_eq!(removed, 1);
    reloaded.flush().unwrap();

    let after = StateStore::load(&path);
    assert!(!after.is_seen("old"));
    assert!(after.is_seen("fresh"));
}

#[test]
fn corrupt_file_fails_open_to_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("seen.json");
    std::fs::write(&path, "{ this is not json").unwrap();

    let store = StateStore::load(&path);
    assert!(store.is_empty());

    // and the store recovers on the next flush
    let mut store = store;
    store.mark_seen("a", Utc::now());
    store.flush().unwrap();
    assert!(StateStore::load(&path).is_seen("a"));
}

#[test]
fn flush_replaces_rather_than_appends() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("seen.json");
    let now = Utc::now();

    let mut store = StateStore::load(&path);
    store.mark_seen("a", now);
    store.flush().unwrap();
    store.mark_seen("b", now);
    store.flush().unwrap();

    // the file is a single valid JSON document with both records
    let raw = std::fs::read_to_string(&path).unwrap();
    let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert!(v["seen"]["a"].is_object());
    assert!(v["seen"]["b"].is_object());
}

#[test]
fn forward_compatible_with_unknown_top_level_fields() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("seen.json");
    std::fs::write(
        &path,
        r#"{
            "seen": { "x": { "first_seen_at": "2026-05-01T00:00:00Z", "origin": "v2" } },
            "last_updated": "2026-05-01T00:00:00Z",
            "schema_version": 3
        }"#,
    )
    .unwrap();

    let store = StateStore::load(&path);
    assert!(store.is_seen("x"));
}
