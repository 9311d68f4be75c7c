//! Unit tests for the local cache adapter

use crate::cache::{CacheStore, JsonFileCache, MemoryCache, UNSAVED_KEY};

#[test]
fn test_get_absent_key() {
    let cache = MemoryCache::new();
    assert_eq!(cache.get(UNSAVED_KEY, None), None);
}

#[test]
fn test_set_then_get() {
    let mut cache = MemoryCache::new();
    cache.set("src-1", "fsm A {}", Some(100));
    assert_eq!(cache.get("src-1", None), Some("fsm A {}".to_string()));
}

#[test]
fn test_server_newer_invalidates_entry() {
    let mut cache = MemoryCache::new();
    cache.set("src-1", "stale draft", Some(100));
    // Server reports a newer update: the cached draft must be ignored.
    assert_eq!(cache.get("src-1", Some(200)), None);
}

#[test]
fn test_entry_newer_than_server_is_valid() {
    let mut cache = MemoryCache::new();
    cache.set("src-1", "fresh draft", Some(200));
    assert_eq!(cache.get("src-1", Some(100)), Some("fresh draft".to_string()));
    // Equal timestamps: nothing newer is known, entry stays valid.
    assert_eq!(cache.get("src-1", Some(200)), Some("fresh draft".to_string()));
}

#[test]
fn test_entry_without_timestamp_loses_to_server() {
    let mut cache = MemoryCache::new();
    cache.set("src-1", "anonymous draft", None);
    assert_eq!(cache.get("src-1", Some(100)), None);
    assert_eq!(
        cache.get("src-1", None),
        Some("anonymous draft".to_string())
    );
}

#[test]
fn test_remove() {
    let mut cache = MemoryCache::new();
    cache.set(UNSAVED_KEY, "draft", None);
    cache.remove(UNSAVED_KEY);
    assert_eq!(cache.get(UNSAVED_KEY, None), None);
}

#[test]
fn test_json_file_cache_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");

    {
        let mut cache = JsonFileCache::open(&path).unwrap();
        cache.set("src-1", "fsm A {}", Some(100));
        cache.set(UNSAVED_KEY, "draft", None);
    }

    let reopened = JsonFileCache::open(&path).unwrap();
    assert_eq!(reopened.get("src-1", None), Some("fsm A {}".to_string()));
    assert_eq!(reopened.get(UNSAVED_KEY, None), Some("draft".to_string()));
    assert_eq!(reopened.get("src-1", Some(200)), None);
}

#[test]
fn test_json_file_cache_missing_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let cache = JsonFileCache::open(dir.path().join("absent.json")).unwrap();
    assert_eq!(cache.get(UNSAVED_KEY, None), None);
}

#[test]
fn test_json_file_cache_corrupt_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    std::fs::write(&path, "not json").unwrap();
    let cache = JsonFileCache::open(&path).unwrap();
    assert_eq!(cache.get(UNSAVED_KEY, None), None);
}
