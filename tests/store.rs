use std::fs;
use std::path::PathBuf;

use courtside::memory::{MEMORY_VERSION, Memory};
use courtside::store::{FileStore, InMemoryStore, MemoryStore, SqliteStore, Store};
use courtside::weights::WeightVector;

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

#[test]
fn file_store_creates_parents_and_tolerates_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("nested/data/memory.json"));
    assert_eq!(store.get("ignored").unwrap(), None);
    store.set("ignored", "{\"a\":1}").unwrap();
    assert_eq!(store.get("ignored").unwrap().as_deref(), Some("{\"a\":1}"));
    store.delete("ignored").unwrap();
    store.delete("ignored").unwrap();
    assert_eq!(store.get("ignored").unwrap(), None);
}

#[test]
fn sqlite_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memory.sqlite");
    {
        let store = SqliteStore::open(&path).unwrap();
        store.set("prediction_memory", "blob-1").unwrap();
    }
    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.get("prediction_memory").unwrap().as_deref(), Some("blob-1"));
    assert_eq!(store.get("other").unwrap(), None);
}

#[test]
fn legacy_blob_is_upgraded_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memory.json");
    fs::copy(fixture_path("memory_v1.json"), &path).unwrap();

    let store = MemoryStore::single(FileStore::new(&path), "prediction_memory");
    let memory = store.load();
    assert_eq!(memory.version, MEMORY_VERSION);
    assert_eq!(memory.predictions.len(), 3);
    assert_eq!(memory.total_predictions, 3);
    assert_eq!(memory.total_correct, 1);
    assert_eq!(memory.accuracy, 50.0);

    let keys: Vec<&str> = memory.learned_weights.keys().collect();
    assert_eq!(keys, vec!["ranking", "round_depth", "surface_context"]);
    assert!((memory.learned_weights.sum() - 1.0).abs() < 1e-9);
    assert_eq!(memory.factor_accuracy["surface_context"].total, 1);
    assert_eq!(memory.factor_accuracy["round_depth"].total, 0);

    let pending = memory.find_pending("m-3").unwrap();
    assert!(pending.factors.contains_key("round_depth"));
    assert_eq!(memory.pending_ids(), vec!["m-3"]);

    assert_eq!(memory.rolling_windows.history, vec![1, 0]);
    assert_eq!(memory.streaks.current, -1);
    assert_eq!(memory.streaks.longest_win, 1);
    assert!(memory.calibration.buckets.is_empty());
    assert!(memory.h2h_results.is_empty());

    assert!(store.save(&memory));
    assert_eq!(store.load(), memory);
}

#[test]
fn save_falls_back_to_file_when_primary_is_down() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memory.json");
    let store = MemoryStore::new(
        Some(Box::new(InMemoryStore::offline())),
        Box::new(FileStore::new(&path)),
        "prediction_memory",
    );
    assert_eq!(store.backends(), vec!["memory", "file"]);

    let mut memory = Memory::default();
    memory.patterns.push("kept".to_string());
    assert!(store.save(&memory));
    assert!(path.exists());
    assert_eq!(store.load().patterns, vec!["kept".to_string()]);
}

#[test]
fn unreachable_backends_yield_fresh_memory() {
    let store = MemoryStore::new(
        Some(Box::new(InMemoryStore::offline())),
        Box::new(InMemoryStore::offline()),
        "prediction_memory",
    )
    .with_defaults(WeightVector::extended_defaults());
    assert!(!store.save(&Memory::default()));
    let memory = store.load();
    assert!(memory.predictions.is_empty());
    assert_eq!(memory.learned_weights, WeightVector::extended_defaults());
}

#[test]
fn reset_replaces_everything() {
    let store = MemoryStore::single(InMemoryStore::new(), "prediction_memory");
    let mut memory = Memory::default();
    memory.total_correct = 9;
    memory.patterns.push("old".to_string());
    assert!(store.save(&memory));
    assert!(store.reset());
    let fresh = store.load();
    assert_eq!(fresh, Memory::default());
}
