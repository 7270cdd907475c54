use anyhow::Result;
use ledger_core::{Block, ChainStore, LoadOutcome, StoreError};
use sled::{Batch, Db};
use std::path::Path;
use tracing::{info, warn};

const TREE_BLOCKS: &str = "blocks";

fn backend(e: sled::Error) -> StoreError {
  StoreError::Backend(e.to_string())
}

/// One JSON record per block in the `blocks` tree, keyed by big-endian position.
#[derive(Clone)]
pub struct SledStore {
  db: Db,
}

impl SledStore {
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
    let db = sled::open(path)?;
    info!("sled store opened");
    Ok(Self { db })
  }

  fn blocks(&self) -> Result<sled::Tree, StoreError> {
    self.db.open_tree(TREE_BLOCKS).map_err(backend)
  }

  /// Drop every stored block.
  pub fn clear(&self) -> Result<(), StoreError> {
    self.blocks()?.clear().map_err(backend)?;
    self.db.flush().map_err(backend)?;
    Ok(())
  }

  pub fn flush(&self) -> Result<(), StoreError> {
    self.db.flush().map_err(backend)?;
    Ok(())
  }
}

impl ChainStore for SledStore {
  fn load(&self) -> Result<LoadOutcome, StoreError> {
    let tree = self.blocks()?;
    if tree.is_empty() {
      return Ok(LoadOutcome::NotFound);
    }
    let mut blocks = Vec::with_capacity(tree.len());
    for item in tree.iter() {
      let (key, value) = item.map_err(backend)?;
      match serde_json::from_slice::<Block>(&value) {
        Ok(block) => blocks.push(block),
        Err(e) => {
          let reason = format!("record {key:?} is not a block: {e}");
          warn!("sled chain unusable: {reason}");
          return Ok(LoadOutcome::Corrupt {
            reason,
            quarantined: None,
          });
        }
      }
    }
    Ok(LoadOutcome::Loaded(blocks))
  }

  fn save(&self, blocks: &[Block]) -> Result<(), StoreError> {
    let tree = self.blocks()?;
    let mut batch = Batch::default();
    for (position, block) in blocks.iter().enumerate() {
      batch.insert((position as u64).to_be_bytes().to_vec(), serde_json::to_vec(block)?);
    }
    let len = blocks.len() as u64;
    for key in tree.range(len.to_be_bytes()..).keys() {
      batch.remove(key.map_err(backend)?);
    }
    tree.apply_batch(batch).map_err(backend)?;
    self.db.flush().map_err(backend)?;
    Ok(())
  }
}
