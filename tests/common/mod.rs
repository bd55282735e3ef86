//! Shared test doubles: a scriptable pool client, an in-process HTTP pool
//! server, and fake engine/oracle collaborators

#![allow(dead_code)]

use ethash_pool_client::core::{Endpoint, Hash256, Solution, WorkPackage};
use ethash_pool_client::engine::{EpochOracle, MinerType, MiningEngine, MiningProgress};
use ethash_pool_client::pool::{ClientEvent, PoolClient};
use serde_json::Value;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Poll `cond` until it holds or `timeout` passes
pub async fn wait_until<F: Fn() -> bool>(cond: F, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

/// Receive the next client event, panicking after `timeout`
pub async fn next_event(
    rx: &mut mpsc::UnboundedReceiver<ClientEvent>,
    timeout: Duration,
) -> ClientEvent {
    tokio::time::timeout(timeout, rx.recv())
        .await
        .expect("timed out waiting for a client event")
        .expect("event channel closed")
}

// ---------------------------------------------------------------------------
// Engine and oracle doubles

#[derive(Default)]
pub struct FakeEngine {
    mining: AtomicBool,
    paused: AtomicBool,
    pub starts: AtomicU32,
    pub stops: AtomicU32,
    pub shuffles: AtomicU32,
    pub accepted: AtomicU32,
    pub rejected: AtomicU32,
    pub hash_rate: Mutex<f64>,
    pub works: Mutex<Vec<WorkPackage>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_hash_rate(&self, rate: f64) {
        *self.hash_rate.lock().unwrap() = rate;
    }

    pub fn work_count(&self) -> usize {
        self.works.lock().unwrap().len()
    }

    pub fn last_work(&self) -> Option<WorkPackage> {
        self.works.lock().unwrap().last().cloned()
    }
}

impl MiningEngine for FakeEngine {
    fn start(&self, _miner_type: MinerType) {
        self.starts.fetch_add(1, Ordering::Relaxed);
        self.mining.store(true, Ordering::Relaxed);
        self.paused.store(false, Ordering::Relaxed);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::Relaxed);
        self.mining.store(false, Ordering::Relaxed);
        self.paused.store(false, Ordering::Relaxed);
    }

    fn pause(&self) {
        if self.mining.load(Ordering::Relaxed) {
            self.paused.store(true, Ordering::Relaxed);
        }
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
    }

    fn is_mining(&self) -> bool {
        self.mining.load(Ordering::Relaxed)
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    fn shuffle(&self) {
        self.shuffles.fetch_add(1, Ordering::Relaxed);
    }

    fn set_work(&self, work: &WorkPackage) {
        self.works.lock().unwrap().push(work.clone());
    }

    fn progress(&self) -> MiningProgress {
        MiningProgress {
            hash_rate: *self.hash_rate.lock().unwrap(),
        }
    }

    fn solution_accepted(&self, _stale: bool, _miner_index: u32) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    fn solution_rejected(&self, _miner_index: u32) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }
}

pub struct FakeOracle {
    epoch: u32,
    pub calls: AtomicU32,
}

impl FakeOracle {
    pub fn new(epoch: u32) -> Self {
        Self {
            epoch,
            calls: AtomicU32::new(0),
        }
    }
}

impl EpochOracle for FakeOracle {
    fn epoch_from_seed(&self, _seed: &Hash256) -> u32 {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.epoch
    }
}

// ---------------------------------------------------------------------------
// Scriptable pool client for driving the manager

#[derive(Debug, Clone, Copy)]
pub enum ConnectOutcome {
    /// The connection succeeds and a session is established
    Succeed,
    /// The connection fails outright, reported as a disconnect
    Fail,
    /// The connect attempt never completes
    Hang,
}

pub struct FakeClient {
    events: mpsc::UnboundedSender<ClientEvent>,
    connected: AtomicBool,
    script: Mutex<VecDeque<ConnectOutcome>>,
    conn: Mutex<Option<Arc<Endpoint>>>,
    pub connect_attempts: AtomicU32,
    pub solutions: Mutex<Vec<Solution>>,
    pub hashrates: Mutex<Vec<(String, String)>>,
}

impl FakeClient {
    pub fn new(events: mpsc::UnboundedSender<ClientEvent>, script: Vec<ConnectOutcome>) -> Self {
        Self {
            events,
            connected: AtomicBool::new(false),
            script: Mutex::new(script.into()),
            conn: Mutex::new(None),
            connect_attempts: AtomicU32::new(0),
            solutions: Mutex::new(Vec::new()),
            hashrates: Mutex::new(Vec::new()),
        }
    }

    pub fn solution_count(&self) -> usize {
        self.solutions.lock().unwrap().len()
    }

    pub fn hashrate_count(&self) -> usize {
        self.hashrates.lock().unwrap().len()
    }
}

impl PoolClient for FakeClient {
    fn set_connection(&self, endpoint: Arc<Endpoint>) {
        *self.conn.lock().unwrap() = Some(endpoint);
    }

    fn unset_connection(&self) {
        *self.conn.lock().unwrap() = None;
    }

    fn connect(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ConnectOutcome::Hang);
        match outcome {
            ConnectOutcome::Succeed => {
                self.connected.store(true, Ordering::Relaxed);
                let _ = self.events.send(ClientEvent::Connected);
            }
            ConnectOutcome::Fail => {
                let _ = self.events.send(ClientEvent::Disconnected);
            }
            ConnectOutcome::Hang => {}
        }
    }

    fn disconnect(&self) {
        self.connected.store(false, Ordering::Relaxed);
        let _ = self.events.send(ClientEvent::Disconnected);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn active_endpoint(&self) -> String {
        String::new()
    }

    fn is_zil_mode(&self) -> bool {
        false
    }

    fn submit_solution(&self, solution: Solution) {
        self.solutions.lock().unwrap().push(solution);
    }

    fn submit_hashrate(&self, rate_hex: &str, miner_id: &str) {
        self.hashrates
            .lock()
            .unwrap()
            .push((rate_hex.to_string(), miner_id.to_string()));
    }
}

// ---------------------------------------------------------------------------
// In-process HTTP pool server

pub struct FakePool {
    pub addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<Value>>>,
    handle: JoinHandle<()>,
}

impl FakePool {
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests_with_method(&self, method: &str) -> Vec<Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.get("method").and_then(Value::as_str) == Some(method))
            .cloned()
            .collect()
    }
}

impl Drop for FakePool {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Wrap a JSON body in a minimal HTTP/1.0 success envelope
pub fn http_ok(body: &str) -> String {
    format!(
        "HTTP/1.0 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}

/// Serve canned responses on a loopback listener; `respond` sees the parsed
/// request and the zero-based request index and returns the raw response
pub async fn spawn_pool<F>(mut respond: F) -> FakePool
where
    F: FnMut(&Value, usize) -> String + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = requests.clone();

    let handle = tokio::spawn(async move {
        let mut count = 0usize;
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let body = read_request(&mut stream).await;
            let Ok(json) = serde_json::from_str::<Value>(&body) else {
                continue;
            };
            seen.lock().unwrap().push(json.clone());
            let response = respond(&json, count);
            count += 1;
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    FakePool {
        addr,
        requests,
        handle,
    }
}

/// Read one HTTP request off the stream: headers, then Content-Length bytes
async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let Ok(n) = stream.read(&mut chunk).await else {
            return String::new();
        };
        if n == 0 {
            return String::new();
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(split) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..split]).to_string();
        let content_length = head
            .lines()
            .find_map(|line| {
                let (key, value) = line.split_once(':')?;
                key.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);

        let body_start = split + 4;
        while buf.len() < body_start + content_length {
            let Ok(n) = stream.read(&mut chunk).await else {
                break;
            };
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        return String::from_utf8_lossy(&buf[body_start..]).to_string();
    }
}
