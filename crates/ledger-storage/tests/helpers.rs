#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use ledger_core::{Ledger, LedgerConfig};
use ledger_storage::{JsonFileStore, SledStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

pub fn create_temp_dir() -> (TempDir, PathBuf) {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().to_path_buf();
    (temp_dir, path)
}

/// Temp dir plus the path of a (not yet written) chain file inside it.
pub fn create_temp_chain_file() -> (TempDir, PathBuf) {
    let (temp_dir, dir) = create_temp_dir();
    (temp_dir, dir.join("blockchain_transactions.json"))
}

pub fn create_temp_sled_store() -> (TempDir, SledStore) {
    let (temp_dir, path) = create_temp_dir();
    let store = SledStore::open(path.join("db")).expect("Failed to open SledStore");
    (temp_dir, store)
}

pub fn remove_temp_dir(temp_dir: TempDir) {
    let path = temp_dir.path().to_path_buf();
    temp_dir.close().expect("Failed to delete temp dir");
    let _ = fs::remove_dir_all(&path);
    assert!(!path.exists(), "Temp directory should be removed");
}

pub fn config(difficulty: u32) -> LedgerConfig {
    LedgerConfig {
        difficulty,
        ..LedgerConfig::default()
    }
}

pub fn purchase(total: u64, items: &[&str]) -> Value {
    json!({ "total": total, "items": items })
}

/// Ledger on a JSON file with `n` purchases appended.
pub fn json_ledger_with(
    path: &PathBuf,
    n: u64,
    difficulty: u32,
) -> Ledger<JsonFileStore> {
    let store = Arc::new(JsonFileStore::new(path));
    let mut ledger = Ledger::load_or_init(store, config(difficulty)).expect("load ledger");
    for i in 0..n {
        ledger
            .append_transaction(purchase(1000 + i, &["Headphones"]))
            .expect("append");
    }
    ledger
}
