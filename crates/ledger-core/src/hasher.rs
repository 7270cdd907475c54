//! Canonical block encoding and the SHA-256 digest shared by the miner,
//! the ledger and the offline validator.
//!
//! A block hashes as compact JSON of
//! `{"data":..,"index":..,"nonce":..,"previous_hash":..,"timestamp":..}`
//! with object keys sorted at every depth. Only `nonce` changes while
//! mining, so [`HashTemplate`] absorbs the bytes before it once and clones
//! that SHA-256 state for every attempt.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::constants::HASH_HEX_SIZE;

/// Rebuild `value` with the keys of every nested object in lexicographic order.
///
/// The map is rebuilt by inserting keys in sorted order, so the result is the
/// same whether or not serde_json keeps insertion order.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

fn json_string(s: &str) -> String {
    Value::String(s.to_owned()).to_string()
}

/// The canonical encoding split around the nonce.
fn frame(index: u64, timestamp: &str, data: &Value, previous_hash: &str) -> (String, String) {
    let prefix = format!(
        r#"{{"data":{},"index":{},"nonce":"#,
        canonicalize(data),
        index
    );
    let suffix = format!(
        r#","previous_hash":{},"timestamp":{}}}"#,
        json_string(previous_hash),
        json_string(timestamp)
    );
    (prefix, suffix)
}

/// Full canonical byte string that gets hashed for a block.
pub fn canonical_bytes(
    index: u64,
    timestamp: &str,
    data: &Value,
    previous_hash: &str,
    nonce: u64,
) -> Vec<u8> {
    let (prefix, suffix) = frame(index, timestamp, data, previous_hash);
    format!("{prefix}{nonce}{suffix}").into_bytes()
}

/// Pre-hashed block encoding with the nonce left open.
#[derive(Clone)]
pub struct HashTemplate {
    prefix: Sha256,
    suffix: Vec<u8>,
}

impl HashTemplate {
    pub fn new(index: u64, timestamp: &str, data: &Value, previous_hash: &str) -> Self {
        let (prefix, suffix) = frame(index, timestamp, data, previous_hash);
        let mut state = Sha256::new();
        state.update(prefix.as_bytes());
        Self {
            prefix: state,
            suffix: suffix.into_bytes(),
        }
    }

    /// Lowercase hex SHA-256 of the canonical encoding with `nonce` filled in.
    pub fn digest(&self, nonce: u64) -> String {
        let mut hasher = self.prefix.clone();
        hasher.update(nonce.to_string().as_bytes());
        hasher.update(&self.suffix);
        hex::encode(hasher.finalize())
    }
}

pub fn calculate_hash(
    index: u64,
    timestamp: &str,
    data: &Value,
    previous_hash: &str,
    nonce: u64,
) -> String {
    HashTemplate::new(index, timestamp, data, previous_hash).digest(nonce)
}

/// Number of leading `'0'` hex characters.
pub fn leading_zero_hex(hash: &str) -> u32 {
    hash.bytes().take_while(|b| *b == b'0').count() as u32
}

/// True when `hash` is a full-length digest starting with at least `difficulty` zeros.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    hash.len() == HASH_HEX_SIZE && leading_zero_hex(hash) >= difficulty
}
