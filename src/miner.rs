//! Proof-of-work nonce search.

use crate::blockchain::{meets_difficulty, Block, BlockTemplate, MAX_DIFFICULTY};
use crate::error::{ChainError, Result};
use sha2::Digest;
use std::time::{Duration, Instant};

/// How often the wall clock is consulted during the search.
const CLOCK_CHECK_INTERVAL: u64 = 1024;

/// Budget for a single nonce search. `None` means no bound on that axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiningLimits {
    pub max_attempts: Option<u64>,
    pub timeout: Option<Duration>,
}

impl MiningLimits {
    pub fn new(max_attempts: u64, timeout: Duration) -> Self {
        MiningLimits {
            max_attempts: Some(max_attempts),
            timeout: Some(timeout),
        }
    }

    pub fn unbounded() -> Self {
        MiningLimits {
            max_attempts: None,
            timeout: None,
        }
    }

    pub fn with_max_attempts(max_attempts: u64) -> Self {
        MiningLimits {
            max_attempts: Some(max_attempts),
            timeout: None,
        }
    }
}

impl Default for MiningLimits {
    fn default() -> Self {
        MiningLimits::new(50_000_000, Duration::from_secs(30))
    }
}

/// Searches nonces from 0 upward until the hash has `difficulty` leading zero
/// hex digits, then seals the template.
///
/// Fails with `MiningTimeout` once either limit is exhausted. Nothing is
/// written anywhere; a failed search has no side effects.
pub fn mine_block(template: BlockTemplate, difficulty: u32, limits: &MiningLimits) -> Result<Block> {
    if difficulty > MAX_DIFFICULTY {
        return Err(ChainError::ConfigError(format!(
            "difficulty {} exceeds maximum of {}",
            difficulty, MAX_DIFFICULTY
        )));
    }

    let start = Instant::now();
    let prefix = template.prefix_hasher();
    let mut nonce: u64 = 0;

    loop {
        if limits.max_attempts.is_some_and(|max| nonce >= max) {
            return Err(timeout(nonce, start));
        }
        if nonce % CLOCK_CHECK_INTERVAL == 0 {
            if let Some(limit) = limits.timeout {
                if start.elapsed() >= limit {
                    return Err(timeout(nonce, start));
                }
            }
        }

        let mut hasher = prefix.clone();
        hasher.update(nonce.to_string().as_bytes());
        let hash = hex::encode(hasher.finalize());

        if meets_difficulty(&hash, difficulty) {
            tracing::debug!(
                index = template.index,
                nonce,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "miner.sealed"
            );
            return Ok(template.seal(nonce, hash));
        }

        nonce = nonce.checked_add(1).ok_or_else(|| timeout(u64::MAX, start))?;
    }
}

fn timeout(attempts: u64, start: Instant) -> ChainError {
    ChainError::MiningTimeout {
        attempts,
        elapsed_ms: start.elapsed().as_millis(),
    }
}
