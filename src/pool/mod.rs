//! Pool connections: the client contract, the getWork client and the manager

pub mod getwork;
pub mod manager;

use crate::core::{Endpoint, Solution, WorkPackage};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub use getwork::GetworkClient;
pub use manager::PoolManager;

/// Events a pool client emits towards its owner
///
/// Clients hand these to the single subscriber over an unbounded channel;
/// delivery order matches the order the client observed them in.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A session to the pool was established
    Connected,
    /// The session ended, orderly or not
    Disconnected,
    /// The pool issued a work package
    WorkReceived(WorkPackage),
    /// The pool accepted a submitted solution
    SolutionAccepted {
        /// Solution was for a job the pool had already moved past
        stale: bool,
        /// Round trip between submission and the pool's verdict
        elapsed: Duration,
        /// Miner instance the solution came from
        miner_index: u32,
    },
    /// The pool rejected a submitted solution
    SolutionRejected {
        /// Solution was for a job the pool had already moved past
        stale: bool,
        /// Round trip between submission and the pool's verdict
        elapsed: Duration,
        /// Miner instance the solution came from
        miner_index: u32,
    },
    /// A windowed-mining PoW window opened
    PowStart,
    /// A windowed-mining PoW window closed
    PowEnd,
}

/// A polymorphic connection to one pool
///
/// All methods are non-blocking; implementations run their own I/O tasks
/// and report through [`ClientEvent`]. A client may mark the endpoint it
/// was given unrecoverable, but only for failures that will not heal on
/// retry (bad credentials, protocol refusal) - never for transient
/// network errors.
pub trait PoolClient: Send + Sync {
    /// Select the endpoint subsequent connects will target
    fn set_connection(&self, endpoint: Arc<Endpoint>);

    /// Forget the selected endpoint
    fn unset_connection(&self);

    /// Begin connecting to the selected endpoint
    fn connect(&self);

    /// Tear the session down, emitting `Disconnected` when done
    fn disconnect(&self);

    /// True while a session is established
    fn is_connected(&self) -> bool;

    /// Label of the resolved remote address, for log lines
    fn active_endpoint(&self) -> String;

    /// True when the selected endpoint uses windowed (ZIL) mining
    fn is_zil_mode(&self) -> bool;

    /// Submit a found solution
    fn submit_solution(&self, solution: Solution);

    /// Report the current hash rate
    fn submit_hashrate(&self, rate_hex: &str, miner_id: &str);
}

/// Live session state inside a connected pool client
///
/// Lifetime equals the live association with the pool; on disconnect the
/// elapsed duration is folded into the endpoint's accumulated total.
#[derive(Debug, Clone, Copy)]
pub struct Session {
    /// Whether the pool acknowledged the subscription handshake
    pub subscribed: bool,
    /// Whether the pool authorized the supplied credentials
    pub authorized: bool,
    started: Instant,
}

impl Session {
    /// Start a session clock; getWork needs no handshake so both flags
    /// are set immediately
    pub fn new(subscribed: bool, authorized: bool) -> Self {
        Self {
            subscribed,
            authorized,
            started: Instant::now(),
        }
    }

    /// Time since the session was established
    pub fn duration(&self) -> Duration {
        self.started.elapsed()
    }
}
