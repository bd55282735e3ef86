//! # ethash-pool-client
//!
//! Pool connection subsystem for an ethash proof-of-work miner.
//!
//! The crate maintains a live session to one of several configured
//! upstream pools, obtains work packages, feeds them to an external
//! mining engine, returns found solutions, reports hash rate, and
//! rotates through backup pools when the active one fails or stalls.
//!
//! ## Architecture
//!
//! - [`pool::PoolManager`] owns the ordered pool list and the failover
//!   state machine, and wires pool events to the [`engine::MiningEngine`].
//! - [`pool::GetworkClient`] is a [`pool::PoolClient`] speaking HTTP
//!   JSON-RPC polling (`eth_getWork`), including the windowed ZIL mode.
//! - The mining engine and the epoch oracle are collaborators injected
//!   by the embedding miner.
//!
//! All state transitions are serialized on per-component dispatch tasks;
//! the public APIs are safe to call from any thread inside a Tokio
//! runtime.

#![warn(
    missing_docs,
    rust_2018_idioms,
    unused_lifetimes,
    unused_qualifications,
    clippy::all
)]
#![forbid(unsafe_code)]

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod pool;
pub mod utils;

pub use crate::error::{Error, Result};
pub use config::{GetworkConfig, ManagerConfig};
pub use core::{Endpoint, Hash256, Solution, WorkPackage};
pub use pool::{ClientEvent, GetworkClient, PoolClient, PoolManager};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        config::{GetworkConfig, ManagerConfig},
        core::{Endpoint, Hash256, Solution, WorkPackage},
        engine::{EngineEvent, EpochOracle, Ergodicity, MinerType, MiningEngine, MiningProgress},
        error::{Error, Result},
        pool::{ClientEvent, GetworkClient, PoolClient, PoolManager, Session},
    };
}
