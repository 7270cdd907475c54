//! Offline integrity check over a persisted chain.
//!
//! Runs in three phases and stops at the first failure: every block's
//! stored hash is recomputed, then every link to the predecessor is
//! compared, then the tip is checked against a difficulty target.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hasher::meets_difficulty;
use crate::Block;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationReport {
    Empty,
    InvalidHash {
        index: u64,
    },
    InvalidLink {
        index: u64,
    },
    Valid {
        tip_index: u64,
        tip_hash: String,
        mined: bool,
    },
}

impl ValidationReport {
    /// Hashes and links all check out; says nothing about mining.
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationReport::Valid { .. })
    }

    pub fn is_mined(&self) -> bool {
        matches!(self, ValidationReport::Valid { mined: true, .. })
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationReport::Empty => write!(f, "Blockchain is empty."),
            ValidationReport::InvalidHash { index } => {
                write!(f, "Block {index} has invalid hash.")
            }
            ValidationReport::InvalidLink { index } => {
                write!(f, "Block {index} has invalid previous hash.")
            }
            ValidationReport::Valid {
                tip_index,
                tip_hash,
                mined,
            } => {
                writeln!(f, "Blockchain is valid.")?;
                if *mined {
                    write!(f, "Latest block (Index {tip_index}) is mined. Hash: {tip_hash}")
                } else {
                    write!(
                        f,
                        "Latest block (Index {tip_index}) is NOT mined properly. Hash: {tip_hash}"
                    )
                }
            }
        }
    }
}

/// Recompute and compare, never repair. Reported indices are the blocks'
/// own `index` fields.
pub fn validate_chain(blocks: &[Block], difficulty: u32) -> ValidationReport {
    let Some(tip) = blocks.last() else {
        return ValidationReport::Empty;
    };

    if let Some(bad) = blocks.iter().find(|b| !b.has_valid_hash()) {
        return ValidationReport::InvalidHash { index: bad.index };
    }

    if let Some(pair) = blocks
        .windows(2)
        .find(|pair| pair[1].previous_hash != pair[0].hash)
    {
        return ValidationReport::InvalidLink {
            index: pair[1].index,
        };
    }

    ValidationReport::Valid {
        tip_index: tip.index,
        tip_hash: tip.hash.clone(),
        mined: meets_difficulty(&tip.hash, difficulty),
    }
}
