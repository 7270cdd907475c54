use crate::{
    constants::CANCEL_CHECK_INTERVAL,
    error::MineError,
    hasher::meets_difficulty,
    pow::{check_difficulty, MineControl},
    Block,
};
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

enum Probe {
    Found(u64, String),
    Stopped(MineError),
}

/// Mines a block by searching nonces in parallel until its hash has at least
/// `difficulty` leading zero hex digits. Any satisfying nonce wins, not
/// necessarily the smallest. Each worker polls `control` every
/// `CANCEL_CHECK_INTERVAL` nonces.
pub fn mine_block_parallel(
    mut block: Block,
    difficulty: u32,
    control: &MineControl,
) -> Result<Block, MineError> {
    check_difficulty(difficulty)?;

    // Everything but the nonce is fixed, so the hashing prefix is shared by all workers.
    let template = block.hash_template();
    let attempts = AtomicU64::new(0);

    let probe = (block.nonce..u64::MAX).into_par_iter().find_map_any(|nonce| {
        if nonce % CANCEL_CHECK_INTERVAL == 0 {
            let seen = attempts.fetch_add(CANCEL_CHECK_INTERVAL, Ordering::Relaxed);
            if let Err(e) = control.check(seen) {
                return Some(Probe::Stopped(e));
            }
        }
        let hash = template.digest(nonce);
        meets_difficulty(&hash, difficulty).then_some(Probe::Found(nonce, hash))
    });

    match probe {
        Some(Probe::Found(nonce, hash)) => {
            info!(
                "Mined block {} with nonce {} (parallel), hash {}",
                block.index, nonce, hash
            );
            block.nonce = nonce;
            block.hash = hash;
            Ok(block)
        }
        Some(Probe::Stopped(e)) => Err(e),
        None => Err(MineError::Exhausted),
    }
}
