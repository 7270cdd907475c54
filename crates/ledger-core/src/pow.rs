use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use crate::constants::{CANCEL_CHECK_INTERVAL, MAX_DIFFICULTY};
use crate::error::MineError;
use crate::hasher::meets_difficulty;
use crate::Block;

/// Shared flag a caller flips to stop an in-flight search.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Bounds on a proof-of-work search. The default is unbounded.
#[derive(Clone, Debug, Default)]
pub struct MineControl {
    cancel: Option<CancelToken>,
    deadline: Option<Instant>,
}

impl MineControl {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline `timeout` from now. A timeout too large to represent means no deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    pub(crate) fn check(&self, attempts: u64) -> Result<(), MineError> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(MineError::Cancelled { attempts });
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(MineError::TimedOut { attempts });
        }
        Ok(())
    }
}

pub(crate) fn check_difficulty(difficulty: u32) -> Result<(), MineError> {
    if difficulty > MAX_DIFFICULTY {
        return Err(MineError::Unreachable { difficulty });
    }
    Ok(())
}

/// Mine the block by incrementing its nonce until the hash starts with at
/// least `difficulty` zero hex digits. Never gives up on its own.
pub fn mine_block(block: Block, difficulty: u32) -> Result<Block, MineError> {
    mine_block_with(block, difficulty, &MineControl::unbounded())
}

/// [`mine_block`] with a cancel flag and/or deadline, polled every
/// `CANCEL_CHECK_INTERVAL` attempts.
pub fn mine_block_with(
    mut block: Block,
    difficulty: u32,
    control: &MineControl,
) -> Result<Block, MineError> {
    check_difficulty(difficulty)?;
    let template = block.hash_template();
    let mut nonce = block.nonce;
    let mut attempts = 0u64;
    loop {
        if attempts % CANCEL_CHECK_INTERVAL == 0 {
            control.check(attempts)?;
        }
        let hash = template.digest(nonce);
        attempts += 1;
        if meets_difficulty(&hash, difficulty) {
            info!(
                "Mined block {} with nonce {} after {} attempts, hash {}",
                block.index, nonce, attempts, hash
            );
            block.nonce = nonce;
            block.hash = hash;
            return Ok(block);
        }
        nonce = nonce.checked_add(1).ok_or(MineError::Exhausted)?;
    }
}
