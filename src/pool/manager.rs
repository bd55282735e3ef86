//! Pool manager: endpoint list, failover state machine, engine wiring
//!
//! Owns the ordered pool list and the one live [`PoolClient`]. A single
//! dispatch task serializes every client event, engine event and timer;
//! the public API only touches cross-thread-safe state (the list lock and
//! the relaxed counters) and never blocks on I/O while holding a lock.

use crate::config::ManagerConfig;
use crate::core::{boundary_to_difficulty, Endpoint, Hash256, WorkPackage};
use crate::engine::{EngineEvent, EpochOracle, Ergodicity, MiningEngine};
use crate::error::{Error, Result};
use crate::pool::{ClientEvent, PoolClient};
use crate::utils::hashrate_hex;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How often `stop()` re-checks whether the async path has wound down
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Messages consumed by the dispatch task
#[derive(Debug, Clone, Copy)]
enum ManagerMsg {
    Rotate,
    FailoverElapsed,
    HashrateElapsed,
    Shutdown,
}

/// The ordered pool list and its rotation bookkeeping
struct PoolList {
    entries: Vec<Arc<Endpoint>>,
    active: usize,
    attempts: u32,
    selected_host: String,
}

impl PoolList {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            active: 0,
            attempts: 0,
            selected_host: String::new(),
        }
    }

    fn add(&mut self, endpoint: Arc<Endpoint>) {
        self.entries.push(endpoint);
    }

    fn remove(&mut self, index: usize) -> Result<()> {
        if index >= self.entries.len() {
            return Err(Error::IndexOutOfRange { index });
        }
        if index == self.active {
            return Err(Error::ActiveConnection { index });
        }
        self.entries.remove(index);
        if self.active > index {
            self.active -= 1;
        }
        Ok(())
    }

    /// Returns whether the active index actually changed
    fn set_active(&mut self, index: usize) -> Result<bool> {
        if index >= self.entries.len() {
            return Err(Error::IndexOutOfRange { index });
        }
        if index == self.active {
            return Ok(false);
        }
        self.active = index;
        self.attempts = 0;
        Ok(true)
    }

    fn active_entry(&self) -> Option<Arc<Endpoint>> {
        self.entries.get(self.active).cloned()
    }
}

/// Timer tasks owned by the dispatch strand
#[derive(Default)]
struct Timers {
    failover: Option<JoinHandle<()>>,
    hashrate: Option<JoinHandle<()>>,
}

impl Timers {
    fn cancel_failover(&mut self) {
        if let Some(handle) = self.failover.take() {
            handle.abort();
        }
    }

    fn cancel_hashrate(&mut self) {
        if let Some(handle) = self.hashrate.take() {
            handle.abort();
        }
    }

    fn cancel_all(&mut self) {
        self.cancel_failover();
        self.cancel_hashrate();
    }
}

fn schedule(
    tx: &mpsc::UnboundedSender<ManagerMsg>,
    delay: Duration,
    msg: ManagerMsg,
) -> JoinHandle<()> {
    let tx = tx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = tx.send(msg);
    })
}

struct Receivers {
    msgs: mpsc::UnboundedReceiver<ManagerMsg>,
    client_events: mpsc::UnboundedReceiver<ClientEvent>,
    engine_events: mpsc::UnboundedReceiver<EngineEvent>,
}

/// Maintains a live session to one of several configured pools
pub struct PoolManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    cfg: ManagerConfig,
    client: Arc<dyn PoolClient>,
    engine: Arc<dyn MiningEngine>,
    oracle: Arc<dyn EpochOracle>,
    shutdown: CancellationToken,
    msg_tx: mpsc::UnboundedSender<ManagerMsg>,
    receivers: Mutex<Option<Receivers>>,
    pool: Mutex<PoolList>,
    current_wp: Mutex<WorkPackage>,
    connection_switches: AtomicU32,
    epoch_changes: AtomicU32,
    running: AtomicBool,
    stopping: AtomicBool,
}

impl PoolManager {
    /// Wire a manager to its client, engine and oracle
    ///
    /// `client_events` must be the receiving end of the channel the client
    /// was constructed with; `engine_events` carries solutions and restart
    /// requests from the engine. `shutdown` is cancelled when rotation
    /// exhausts the pool list, and the embedder is expected to wind the
    /// process down in response.
    pub fn new(
        client: Arc<dyn PoolClient>,
        client_events: mpsc::UnboundedReceiver<ClientEvent>,
        engine: Arc<dyn MiningEngine>,
        engine_events: mpsc::UnboundedReceiver<EngineEvent>,
        oracle: Arc<dyn EpochOracle>,
        cfg: ManagerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let (msg_tx, msgs) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(ManagerInner {
                cfg,
                client,
                engine,
                oracle,
                shutdown,
                msg_tx,
                receivers: Mutex::new(Some(Receivers {
                    msgs,
                    client_events,
                    engine_events,
                })),
                pool: Mutex::new(PoolList::new()),
                current_wp: Mutex::new(WorkPackage::default()),
                connection_switches: AtomicU32::new(0),
                epoch_changes: AtomicU32::new(0),
                running: AtomicBool::new(false),
                stopping: AtomicBool::new(false),
            }),
        }
    }

    /// Append a pool to the end of the rotation list
    pub fn add_connection(&self, endpoint: Arc<Endpoint>) {
        self.inner.pool.lock().add(endpoint);
    }

    /// Remove the pool at `index`; the active pool cannot be removed
    pub fn remove_connection(&self, index: usize) -> Result<()> {
        self.inner.pool.lock().remove(index)
    }

    /// Empty the pool list, disconnecting first if connected
    pub fn clear_connections(&self) {
        {
            self.inner.pool.lock().entries.clear();
        }
        if self.inner.client.is_connected() {
            self.inner.client.disconnect();
        }
    }

    /// Make the pool at `index` the active one, disconnecting the current
    /// session so rotation reconnects to it
    pub fn set_active_connection(&self, index: usize) -> Result<()> {
        let changed = self.inner.pool.lock().set_active(index)?;
        if changed {
            self.inner.connection_switches.fetch_add(1, Ordering::Relaxed);
            self.inner.client.disconnect();
            info!("No connection. Suspend mining ...");
            self.inner.engine.pause();
        }
        Ok(())
    }

    /// Snapshot of the currently selected endpoint
    pub fn active_connection_copy(&self) -> Option<Arc<Endpoint>> {
        self.inner.pool.lock().active_entry()
    }

    /// The configured pools as `{index, active, uri}` records, in order
    pub fn connections_json(&self) -> Value {
        let pool = self.inner.pool.lock();
        Value::Array(
            pool.entries
                .iter()
                .enumerate()
                .map(|(index, endpoint)| {
                    json!({
                        "index": index,
                        "active": index == pool.active,
                        "uri": endpoint.to_string(),
                    })
                })
                .collect(),
        )
    }

    /// Arm the scheduler and post the first rotation
    pub fn start(&self) {
        let Some(receivers) = self.inner.receivers.lock().take() else {
            return;
        };
        self.inner.running.store(true, Ordering::Relaxed);
        self.inner
            .connection_switches
            .fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.clone();
        tokio::spawn(async move {
            dispatch(inner, receivers).await;
        });
        let _ = self.inner.msg_tx.send(ManagerMsg::Rotate);
    }

    /// Request an orderly shutdown and wait until the subsystem quiesced
    pub async fn stop(&self) {
        if !self.inner.running.load(Ordering::Relaxed) {
            return;
        }
        self.inner.stopping.store(true, Ordering::Relaxed);
        if self.inner.client.is_connected() {
            self.inner.client.disconnect();
        } else {
            let _ = self.inner.msg_tx.send(ManagerMsg::Shutdown);
        }
        while self.inner.running.load(Ordering::Relaxed) {
            tokio::time::sleep(STOP_POLL_INTERVAL).await;
        }
    }

    /// True between `start()` and shutdown completion
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Relaxed)
    }

    /// Number of active-pool changes since construction
    pub fn connection_switches(&self) -> u32 {
        self.inner.connection_switches.load(Ordering::Relaxed)
    }

    /// Number of epoch changes observed in incoming work
    pub fn epoch_changes(&self) -> u32 {
        self.inner.epoch_changes.load(Ordering::Relaxed)
    }

    /// Epoch of the current work package, zero when idle
    pub fn current_epoch(&self) -> u32 {
        let wp = self.inner.current_wp.lock();
        if wp.is_present() {
            wp.epoch
        } else {
            0
        }
    }

    /// Difficulty of the current work package, zero when idle
    pub fn current_difficulty(&self) -> f64 {
        let wp = self.inner.current_wp.lock();
        if wp.is_present() {
            boundary_to_difficulty(&wp.boundary)
        } else {
            0.0
        }
    }
}

/// The dispatch strand: the only place rotation state and the engine are
/// mutated once the manager is running
async fn dispatch(inner: Arc<ManagerInner>, mut rx: Receivers) {
    let mut timers = Timers::default();
    loop {
        tokio::select! {
            Some(msg) = rx.msgs.recv() => match msg {
                ManagerMsg::Rotate => inner.rotate_connect(),
                ManagerMsg::FailoverElapsed => inner.failover_elapsed(),
                ManagerMsg::HashrateElapsed => inner.hashrate_elapsed(&mut timers),
                ManagerMsg::Shutdown => inner.shutdown_idle(&mut timers),
            },
            Some(event) = rx.client_events.recv() => inner.on_client_event(event, &mut timers),
            Some(event) = rx.engine_events.recv() => inner.on_engine_event(event),
            else => break,
        }
        if !inner.running.load(Ordering::Relaxed) {
            break;
        }
    }
    timers.cancel_all();
}

impl ManagerInner {
    fn selected_host(&self) -> String {
        self.pool.lock().selected_host.clone()
    }

    /// Pick the next endpoint to try, honoring unrecoverable flags, the
    /// per-endpoint attempt cap and the `exit` sentinel
    fn rotate_connect(self: &Arc<Self>) {
        if self.client.is_connected() {
            return;
        }
        let mut pool = self.pool.lock();

        if pool.active >= pool.entries.len() {
            pool.active = 0;
        }

        if !pool.entries.is_empty() {
            if pool.entries[pool.active].is_unrecoverable() {
                let active = pool.active;
                pool.entries.remove(active);
                pool.attempts = 0;
                if pool.active >= pool.entries.len() {
                    pool.active = 0;
                }
                self.connection_switches.fetch_add(1, Ordering::Relaxed);
            } else if pool.attempts >= self.cfg.max_tries {
                if pool.entries.len() == 1 {
                    // A sole endpoint cannot rotate forever; erase it so
                    // the exhaustion path below terminates the process
                    let active = pool.active;
                    pool.entries.remove(active);
                } else {
                    pool.attempts = 0;
                    pool.active += 1;
                    if pool.active >= pool.entries.len() {
                        pool.active = 0;
                    }
                    self.connection_switches.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        let selected = pool.active_entry().filter(|endpoint| !endpoint.is_exit());
        match selected {
            Some(endpoint) => {
                pool.attempts += 1;
                pool.selected_host = format!("{}:{}", endpoint.host(), endpoint.port());
                info!(pool = %pool.selected_host, "Selected pool");
                drop(pool);
                self.client.set_connection(endpoint);
                self.client.connect();
            }
            None => {
                let exhausted = pool.entries.is_empty();
                drop(pool);
                if exhausted {
                    info!("No more connections to try. Exiting...");
                } else {
                    info!("'exit' failover just got hit. Exiting...");
                }
                if self.engine.is_mining() {
                    info!("Shutting down miners...");
                    self.engine.stop();
                }
                self.running.store(false, Ordering::Relaxed);
                self.shutdown.cancel();
            }
        }
    }

    fn on_client_event(self: &Arc<Self>, event: ClientEvent, timers: &mut Timers) {
        match event {
            ClientEvent::Connected => self.on_connected(timers),
            ClientEvent::Disconnected => self.on_disconnected(timers),
            ClientEvent::WorkReceived(wp) => self.on_work_received(wp),
            ClientEvent::SolutionAccepted {
                stale,
                elapsed,
                miner_index,
            } => {
                info!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    host = %self.selected_host(),
                    stale,
                    "**Accepted"
                );
                self.engine.solution_accepted(stale, miner_index);
            }
            ClientEvent::SolutionRejected {
                stale,
                elapsed,
                miner_index,
            } => {
                warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    host = %self.selected_host(),
                    stale,
                    "**Rejected"
                );
                self.engine.solution_rejected(miner_index);
            }
            ClientEvent::PowStart => {
                debug!("PoW window opened");
            }
            ClientEvent::PowEnd => {
                info!("PoW window closed, pausing miners");
                self.engine.pause();
            }
        }
    }

    fn on_connected(self: &Arc<Self>, timers: &mut Timers) {
        let non_primary = {
            let mut pool = self.pool.lock();
            let resolved = self.client.active_endpoint();
            pool.selected_host.push_str(&resolved);
            info!(host = %pool.selected_host, "Established connection");
            pool.active != 0
        };

        // New session, new job namespace
        self.current_wp.lock().job.clear();

        if self.cfg.ergodicity == Ergodicity::PerSession {
            self.engine.shuffle();
        }

        timers.cancel_failover();
        if non_primary && !self.cfg.failover_timeout.is_zero() {
            timers.failover = Some(schedule(
                &self.msg_tx,
                self.cfg.failover_timeout,
                ManagerMsg::FailoverElapsed,
            ));
        }

        if !self.engine.is_mining() {
            info!("Spinning up miners...");
            self.engine.start(self.cfg.miner_type);
        } else if self.engine.is_paused() {
            info!("Resume mining ...");
            self.engine.resume();
        }

        timers.cancel_hashrate();
        timers.hashrate = Some(schedule(
            &self.msg_tx,
            self.cfg.hashrate_interval,
            ManagerMsg::HashrateElapsed,
        ));
    }

    fn on_disconnected(self: &Arc<Self>, timers: &mut Timers) {
        info!(host = %self.selected_host(), "Disconnected");

        self.client.unset_connection();
        self.current_wp.lock().header = Hash256::zero();
        timers.cancel_all();

        if self.stopping.load(Ordering::Relaxed) {
            if self.engine.is_mining() {
                info!("Shutting down miners...");
                self.engine.stop();
            }
            self.running.store(false, Ordering::Relaxed);
        } else {
            info!("No connection. Suspend mining ...");
            self.engine.pause();
            let _ = self.msg_tx.send(ManagerMsg::Rotate);
        }
    }

    fn on_work_received(self: &Arc<Self>, wp: WorkPackage) {
        if !wp.is_present() {
            return;
        }
        let host = self.selected_host();
        let snapshot = {
            let mut current = self.current_wp.lock();
            let new_epoch = wp.seed != current.seed;
            let new_diff = wp.boundary != current.boundary;
            let previous_epoch = current.epoch;
            *current = wp;

            if new_epoch {
                self.epoch_changes.fetch_add(1, Ordering::Relaxed);
                current.epoch = match current.epoch_from_block() {
                    Some(epoch) => epoch,
                    None => self.oracle.epoch_from_seed(&current.seed),
                };
                info!(epoch = current.epoch, "Epoch");
            } else {
                current.epoch = previous_epoch;
            }
            if new_diff {
                info!(
                    difficulty = boundary_to_difficulty(&current.boundary),
                    "Difficulty"
                );
            }

            info!(
                job = %current.header.abridged(),
                block = current.block,
                host = %host,
                "Job"
            );
            current.clone()
        };

        if self.cfg.ergodicity == Ergodicity::PerJob && snapshot.ex_size_bytes == 0 {
            self.engine.shuffle();
        }
        self.engine.set_work(&snapshot);
    }

    fn on_engine_event(self: &Arc<Self>, event: EngineEvent) {
        match event {
            EngineEvent::SolutionFound(solution) => {
                // Deliberately not queued: a solution found against one
                // session must not reach an unrelated later session
                if self.client.is_connected() {
                    self.client.submit_solution(solution);
                } else {
                    warn!(
                        nonce = %solution,
                        "Solution wasted. Waiting for connection..."
                    );
                }
            }
            EngineEvent::RestartMiners => {
                info!("Restart miners...");
                if self.engine.is_mining() {
                    info!("Shutting down miners...");
                    self.engine.stop();
                }
                info!("Spinning up miners...");
                self.engine.start(self.cfg.miner_type);
            }
        }
    }

    fn failover_elapsed(self: &Arc<Self>) {
        if !self.running.load(Ordering::Relaxed) {
            return;
        }
        let fall_back = {
            let mut pool = self.pool.lock();
            if pool.active != 0 {
                pool.active = 0;
                pool.attempts = 0;
                self.connection_switches.fetch_add(1, Ordering::Relaxed);
                true
            } else {
                false
            }
        };
        if fall_back {
            info!("Failover timeout reached, retrying connection to primary pool");
            self.client.disconnect();
        }
    }

    fn hashrate_elapsed(self: &Arc<Self>, timers: &mut Timers) {
        if self.running.load(Ordering::Relaxed) && self.client.is_connected() {
            let rate = self.engine.progress().hash_rate as u64;
            self.client
                .submit_hashrate(&hashrate_hex(rate), &self.cfg.worker_id);

            timers.cancel_hashrate();
            timers.hashrate = Some(schedule(
                &self.msg_tx,
                self.cfg.hashrate_interval,
                ManagerMsg::HashrateElapsed,
            ));
        }
    }

    /// `stop()` while already disconnected: wind down without a rotation
    fn shutdown_idle(self: &Arc<Self>, timers: &mut Timers) {
        timers.cancel_all();
        if self.engine.is_mining() {
            info!("Shutting down miners...");
            self.engine.stop();
        }
        self.running.store(false, Ordering::Relaxed);
    }
}
