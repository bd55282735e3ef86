//! Work package type representing one unit of mining work

use crate::core::Hash256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Blocks per epoch; an epoch shares one mining dataset
pub const BLOCKS_PER_EPOCH: i64 = 30_000;

/// One unit of mining work handed from a pool to the mining engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkPackage {
    /// Block header hash to mine on
    pub header: Hash256,
    /// Seed hash identifying the epoch dataset
    pub seed: Hash256,
    /// Difficulty target; a valid solution hashes at or below it
    pub boundary: Hash256,
    /// Pool-assigned job identifier
    pub job: String,
    /// Block height, -1 when the pool did not report it
    pub block: i64,
    /// Epoch number derived from block height or seed
    pub epoch: u32,
    /// Extranonce size in bytes, zero for getWork pools
    pub ex_size_bytes: u32,
}

impl WorkPackage {
    /// A package is present iff its header is non-zero
    pub fn is_present(&self) -> bool {
        !self.header.is_zero()
    }

    /// Epoch implied by the block height, when the height is known
    pub fn epoch_from_block(&self) -> Option<u32> {
        (self.block > 0).then(|| (self.block / BLOCKS_PER_EPOCH) as u32)
    }
}

impl Default for WorkPackage {
    fn default() -> Self {
        Self {
            header: Hash256::zero(),
            seed: Hash256::zero(),
            boundary: Hash256::zero(),
            job: String::new(),
            block: -1,
            epoch: 0,
            ex_size_bytes: 0,
        }
    }
}

impl fmt::Display for WorkPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.header.abridged())
    }
}
