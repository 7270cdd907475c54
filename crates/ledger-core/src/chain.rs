use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::constants::DEFAULT_DIFFICULTY;
use crate::error::{LedgerError, StoreError};
use crate::mine::mine_block_parallel;
use crate::pow::{mine_block_with, CancelToken, MineControl};
use crate::validate::{validate_chain, ValidationReport};
use crate::{Block, BlockSummary};

/// What a backend found when asked for the persisted chain.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded(Vec<Block>),
    NotFound,
    /// Content exists but is not a chain. `quarantined` is where the
    /// backend moved it, if it did.
    Corrupt {
        reason: String,
        quarantined: Option<PathBuf>,
    },
}

/// Trait the storage backends implement for the ledger to persist itself.
/// This lives in `ledger-core` to avoid a circular dependency.
pub trait ChainStore: Send + Sync {
    fn load(&self) -> Result<LoadOutcome, StoreError>;
    /// Replace whatever is stored with `blocks`, in chain order.
    fn save(&self, blocks: &[Block]) -> Result<(), StoreError>;
}

/// Process-local store, handy for tests and for embedding without a disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blocks: Mutex<Option<Vec<Block>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blocks(blocks: Vec<Block>) -> Self {
        Self {
            blocks: Mutex::new(Some(blocks)),
        }
    }

    pub fn snapshot(&self) -> Option<Vec<Block>> {
        self.blocks.lock().ok().and_then(|guard| guard.clone())
    }
}

impl ChainStore for MemoryStore {
    fn load(&self) -> Result<LoadOutcome, StoreError> {
        let guard = self
            .blocks
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))?;
        Ok(match guard.as_ref() {
            None => LoadOutcome::NotFound,
            Some(blocks) if blocks.is_empty() => LoadOutcome::Corrupt {
                reason: "stored chain is empty".into(),
                quarantined: None,
            },
            Some(blocks) => LoadOutcome::Loaded(blocks.clone()),
        })
    }

    fn save(&self, blocks: &[Block]) -> Result<(), StoreError> {
        let mut guard = self
            .blocks
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))?;
        *guard = Some(blocks.to_vec());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    /// Leading zero hex digits required of every appended block.
    pub difficulty: u32,
    /// Upper bound on a single proof-of-work search.
    pub mining_timeout: Option<Duration>,
    /// Search nonces on the rayon pool instead of the calling thread.
    pub parallel: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            mining_timeout: None,
            parallel: false,
        }
    }
}

/// How the in-memory chain came to be.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainOrigin {
    Loaded,
    Fresh,
    /// Storage held something unusable and a new genesis replaced it.
    Recovered {
        reason: String,
        quarantined: Option<PathBuf>,
    },
}

/// Append-only chain of blocks backed by a [`ChainStore`].
///
/// The mutation path takes `&mut self`; share a ledger behind one mutex that
/// covers read-tip, mine, append and persist together.
pub struct Ledger<S: ChainStore + ?Sized> {
    blocks: Vec<Block>,
    store: Arc<S>,
    config: LedgerConfig,
    origin: ChainOrigin,
}

impl<S: ChainStore + ?Sized> Ledger<S> {
    /// Load the stored chain, or start over from a fresh genesis block when
    /// nothing usable is stored. Loaded blocks are trusted as they are.
    pub fn load_or_init(store: Arc<S>, config: LedgerConfig) -> Result<Self, LedgerError> {
        let (blocks, origin) = match store.load().map_err(LedgerError::Load)? {
            LoadOutcome::Loaded(blocks) if !blocks.is_empty() => {
                info!("loaded chain with {} blocks", blocks.len());
                (blocks, ChainOrigin::Loaded)
            }
            LoadOutcome::Loaded(_) => {
                warn!("stored chain is empty, starting from genesis");
                (
                    vec![Block::genesis()],
                    ChainOrigin::Recovered {
                        reason: "stored chain is empty".into(),
                        quarantined: None,
                    },
                )
            }
            LoadOutcome::NotFound => {
                info!("no stored chain, starting from genesis");
                (vec![Block::genesis()], ChainOrigin::Fresh)
            }
            LoadOutcome::Corrupt {
                reason,
                quarantined,
            } => {
                warn!(
                    "stored chain unusable ({reason}), starting from genesis; old content at {:?}",
                    quarantined
                );
                (
                    vec![Block::genesis()],
                    ChainOrigin::Recovered {
                        reason,
                        quarantined,
                    },
                )
            }
        };
        Ok(Self {
            blocks,
            store,
            config,
            origin,
        })
    }

    /// Mine `payload` into a new block on top of the tip, append it and save
    /// the whole chain.
    ///
    /// A failed save leaves the block appended in memory and returns
    /// [`LedgerError::Persist`]; [`Ledger::persist`] retries the write.
    pub fn append_transaction(&mut self, payload: Value) -> Result<&Block, LedgerError> {
        self.append_transaction_with(payload, &CancelToken::new())
    }

    pub fn append_transaction_with(
        &mut self,
        payload: Value,
        cancel: &CancelToken,
    ) -> Result<&Block, LedgerError> {
        let tip = self.tip();
        let index = tip
            .index
            .checked_add(1)
            .ok_or(LedgerError::IndexOverflow { tip: tip.index })?;
        let candidate = Block::new(index, tip.hash.clone(), payload);

        let mut control = MineControl::unbounded().with_cancel(cancel.clone());
        if let Some(timeout) = self.config.mining_timeout {
            control = control.with_timeout(timeout);
        }
        let mined = if self.config.parallel {
            mine_block_parallel(candidate, self.config.difficulty, &control)?
        } else {
            mine_block_with(candidate, self.config.difficulty, &control)?
        };

        self.blocks.push(mined);
        if let Err(source) = self.store.save(&self.blocks) {
            error!("failed to persist chain after block {index}: {source}");
            return Err(LedgerError::Persist { index, source });
        }
        Ok(self.tip())
    }

    /// Write the current chain to the store.
    pub fn persist(&self) -> Result<(), LedgerError> {
        self.store.save(&self.blocks).map_err(|source| {
            error!("failed to persist chain: {source}");
            LedgerError::Persist {
                index: self.tip().index,
                source,
            }
        })
    }

    /// Every block after genesis, in chain order.
    pub fn history(&self) -> &[Block] {
        &self.blocks[1..]
    }

    pub fn summaries(&self) -> Vec<BlockSummary> {
        self.history().iter().map(Block::summary).collect()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn tip(&self) -> &Block {
        // never empty: construction always leaves at least genesis
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn origin(&self) -> &ChainOrigin {
        &self.origin
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn validate(&self, difficulty: u32) -> ValidationReport {
        validate_chain(&self.blocks, difficulty)
    }
}
