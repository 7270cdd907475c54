use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod chain;
pub mod constants;
pub mod error;
pub mod hasher;
pub mod mine;
pub mod pow;
pub mod validate;

pub use chain::{ChainOrigin, ChainStore, Ledger, LedgerConfig, LoadOutcome, MemoryStore};
pub use error::{LedgerError, MineError, StoreError};
pub use hasher::{calculate_hash, HashTemplate};
pub use validate::{validate_chain, ValidationReport};

use constants::{GENESIS_DATA, GENESIS_PREVIOUS_HASH};

/// One record of the chain. Field order is the on-disk record order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: String,
    pub data: Value,
    pub previous_hash: String,
    pub hash: String,
    pub nonce: u64,
}

impl Block {
    /// New unmined block stamped with the current UTC time.
    pub fn new(index: u64, previous_hash: impl Into<String>, data: Value) -> Self {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false);
        Self::with_timestamp(index, timestamp, data, previous_hash)
    }

    pub fn with_timestamp(
        index: u64,
        timestamp: impl Into<String>,
        data: Value,
        previous_hash: impl Into<String>,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp: timestamp.into(),
            data,
            previous_hash: previous_hash.into(),
            hash: String::new(),
            nonce: 0,
        };
        block.hash = block.compute_hash();
        block
    }

    /// The origin record: index 0, empty previous hash, never mined.
    pub fn genesis() -> Self {
        Self::new(0, GENESIS_PREVIOUS_HASH, Value::from(GENESIS_DATA))
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash == GENESIS_PREVIOUS_HASH
    }

    pub fn compute_hash(&self) -> String {
        calculate_hash(
            self.index,
            &self.timestamp,
            &self.data,
            &self.previous_hash,
            self.nonce,
        )
    }

    pub fn has_valid_hash(&self) -> bool {
        self.hash == self.compute_hash()
    }

    pub(crate) fn hash_template(&self) -> HashTemplate {
        HashTemplate::new(self.index, &self.timestamp, &self.data, &self.previous_hash)
    }

    pub fn summary(&self) -> BlockSummary {
        BlockSummary {
            index: self.index,
            timestamp: self.timestamp.clone(),
            data: self.data.clone(),
            hash: self.hash.clone(),
        }
    }
}

/// What presentation layers get to see of a block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub index: u64,
    pub timestamp: String,
    pub data: Value,
    pub hash: String,
}
