use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode chain: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MineError {
    #[error("mining cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },
    #[error("mining timed out after {attempts} attempts")]
    TimedOut { attempts: u64 },
    #[error("difficulty {difficulty} exceeds the digest length")]
    Unreachable { difficulty: u32 },
    #[error("nonce space exhausted")]
    Exhausted,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Mining(#[from] MineError),
    /// The block at `index` is part of the in-memory chain but was not written.
    #[error("block {index} appended but not persisted: {source}")]
    Persist {
        index: u64,
        #[source]
        source: StoreError,
    },
    #[error("block index overflow after tip {tip}")]
    IndexOverflow { tip: u64 },
    #[error("failed to load chain: {0}")]
    Load(#[source] StoreError),
}
