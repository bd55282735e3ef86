//! Found solution ready for submission to a pool

use crate::core::{Hash256, WorkPackage};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A nonce and mix hash proving work for a given package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    /// Winning nonce
    pub nonce: u64,
    /// Mix hash accompanying the nonce
    pub mix_hash: Hash256,
    /// The package the solution was found against
    pub work: WorkPackage,
    /// Index of the miner instance that found it
    pub miner_index: u32,
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.nonce)
    }
}
