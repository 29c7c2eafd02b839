use serde::Serialize;

use super::chain::{Block, GENESIS_PREVIOUS_HASH};

/// Which check a block failed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IntegrityFailure {
    /// First block is not index 0 with the sentinel previous hash.
    BadGenesis,
    IndexGap,
    BrokenLink,
    HashMismatch,
    InsufficientWork,
}

/// Outcome of walking a chain. A compromised chain is reported here, not
/// raised as an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub valid: bool,
    pub first_invalid_index: Option<u64>,
    pub failure: Option<IntegrityFailure>,
    pub blocks_checked: usize,
}

impl IntegrityReport {
    fn valid(blocks_checked: usize) -> Self {
        IntegrityReport {
            valid: true,
            first_invalid_index: None,
            failure: None,
            blocks_checked,
        }
    }

    fn invalid(index: u64, failure: IntegrityFailure, blocks_checked: usize) -> Self {
        IntegrityReport {
            valid: false,
            first_invalid_index: Some(index),
            failure: Some(failure),
            blocks_checked,
        }
    }
}

/// Checks one block's own seal: stored hash reproducible, work satisfied.
fn check_seal(block: &Block, difficulty: u32) -> Option<IntegrityFailure> {
    if block.calculate_hash() != block.hash {
        return Some(IntegrityFailure::HashMismatch);
    }
    if !block.meets_difficulty(difficulty) {
        return Some(IntegrityFailure::InsufficientWork);
    }
    None
}

/// Walks `blocks` (ordered by index, oldest first) and returns the lowest
/// position at which any invariant breaks.
///
/// Per block the order is: index contiguity, link to predecessor, recomputed
/// hash, difficulty. The reported index is the one the block should occupy,
/// so a gap is attributed to the position where it appears.
pub fn verify_blocks(blocks: &[Block], difficulty: u32) -> IntegrityReport {
    let Some(genesis) = blocks.first() else {
        return IntegrityReport::valid(0);
    };

    if genesis.index != 0 || genesis.previous_hash != GENESIS_PREVIOUS_HASH {
        return IntegrityReport::invalid(0, IntegrityFailure::BadGenesis, 1);
    }
    if let Some(failure) = check_seal(genesis, difficulty) {
        return IntegrityReport::invalid(0, failure, 1);
    }

    for (position, pair) in blocks.windows(2).enumerate() {
        let (previous, current) = (&pair[0], &pair[1]);
        let expected_index = previous.index + 1;
        let checked = position + 2;

        if current.index != expected_index {
            return IntegrityReport::invalid(expected_index, IntegrityFailure::IndexGap, checked);
        }
        if current.previous_hash != previous.hash {
            return IntegrityReport::invalid(current.index, IntegrityFailure::BrokenLink, checked);
        }
        if let Some(failure) = check_seal(current, difficulty) {
            return IntegrityReport::invalid(current.index, failure, checked);
        }
    }

    IntegrityReport::valid(blocks.len())
}
