//! Seams to the external mining engine and epoch oracle
//!
//! The engine and oracle are collaborators owned by the embedding miner;
//! the manager drives them through these traits and receives solutions
//! and restart requests back over a channel.

use crate::core::{Hash256, Solution, WorkPackage};
use serde::{Deserialize, Serialize};

/// Which miner backends the engine should spin up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MinerType {
    /// OpenCL miners only
    Cl,
    /// CUDA miners only
    Cuda,
    /// CUDA first, then OpenCL
    Mixed,
}

/// When the engine should reshuffle its nonce-space partitioning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ergodicity {
    /// Never reshuffle
    Default,
    /// Reshuffle once per pool session, on connect
    PerSession,
    /// Reshuffle on every incoming job
    PerJob,
}

/// Aggregate progress snapshot reported by the engine
#[derive(Debug, Clone, Copy, Default)]
pub struct MiningProgress {
    /// Current hash rate over all miners, hashes per second
    pub hash_rate: f64,
}

/// The mining engine the manager feeds work to
///
/// All mutating calls come from the manager's dispatch strand; the
/// engine reports back asynchronously through [`EngineEvent`].
pub trait MiningEngine: Send + Sync {
    /// Spin up miner workers for the given backend selection
    fn start(&self, miner_type: MinerType);

    /// Stop all miner workers
    fn stop(&self);

    /// Pause mining while keeping workers alive
    fn pause(&self);

    /// Resume paused mining
    fn resume(&self);

    /// True while workers are running (paused or not)
    fn is_mining(&self) -> bool;

    /// True while workers are paused
    fn is_paused(&self) -> bool;

    /// Reseed the nonce-space partitioning
    fn shuffle(&self);

    /// Hand the engine a new work package
    fn set_work(&self, work: &WorkPackage);

    /// Current progress snapshot
    fn progress(&self) -> MiningProgress;

    /// Account an accepted solution to the given miner
    fn solution_accepted(&self, stale: bool, miner_index: u32);

    /// Account a rejected solution to the given miner
    fn solution_rejected(&self, miner_index: u32);
}

/// Maps a seed hash to its epoch number
pub trait EpochOracle: Send + Sync {
    /// Epoch number for the dataset identified by `seed`
    fn epoch_from_seed(&self, seed: &Hash256) -> u32;
}

/// Events flowing from the engine back to the manager
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A miner found a solution for the current package
    SolutionFound(Solution),
    /// The engine wants its miners torn down and spun up again
    RestartMiners,
}
