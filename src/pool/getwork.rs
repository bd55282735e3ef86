//! HTTP getWork pool client
//!
//! Polls the pool with JSON-RPC 2.0 over short-lived HTTP/1.0 connections
//! (`Connection: close`, one request per connection). The pool cannot push,
//! so a poll timer drives the cadence; endpoints resolved from the pool's
//! hostname are tried in order and dropped one by one on failure.

use crate::config::GetworkConfig;
use crate::core::{Endpoint, Hash256, HostKind, Solution, WorkPackage};
use crate::error::{Error, Result};
use crate::pool::{ClientEvent, PoolClient, Session};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{self, TcpStream};
use tokio::task::JoinHandle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// TCP connect attempts give up after this long
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Backoff applied when the pool answers `eth_getWork` with an error
/// (typically a node still syncing)
const POOL_ERROR_BACKOFF: Duration = Duration::from_secs(30);

/// ZIL mode polls again this soon after a solution submission
const ZIL_SUBMIT_RECHECK: Duration = Duration::from_millis(100);

/// Request id of `eth_getWork`
const GETWORK_ID: u64 = 1;

/// Request id of `eth_submitHashrate`
const HASHRATE_ID: u64 = 9;

/// `eth_submitWork` ids start here; `id - SUBMIT_BASE_ID` recovers the miner index
const SUBMIT_BASE_ID: u64 = 40;

/// Header value of the synthetic package used to force DAG initialization
const DUMMY_HEADER: u64 = 0xDEAD_BEEF;

/// One serialized JSON-RPC request waiting in the transmit queue
struct TxRequest {
    id: u64,
    body: String,
}

/// What went wrong during one request/response exchange
enum WireError {
    Connect(std::io::Error),
    Write(std::io::Error),
    Read(std::io::Error),
}

/// A [`PoolClient`] speaking HTTP JSON-RPC polling
pub struct GetworkClient {
    inner: Arc<Inner>,
}

struct Inner {
    cfg: GetworkConfig,
    events: mpsc::UnboundedSender<ClientEvent>,
    conn: RwLock<Option<Arc<Endpoint>>>,
    connected: AtomicBool,
    connecting: AtomicBool,
    tx_pending: AtomicBool,
    zil_pow_running: AtomicBool,
    pow_window_timeout: AtomicBool,
    max_submit_id: AtomicU64,
    // Bumped on every connect and disconnect; in-flight tasks that observe
    // a stale value stand down without touching state.
    generation: AtomicU64,
    endpoints: Mutex<VecDeque<SocketAddr>>,
    current_endpoint: Mutex<Option<SocketAddr>>,
    tx_queue: Mutex<VecDeque<TxRequest>>,
    session: Mutex<Option<Session>>,
    current: Mutex<WorkPackage>,
    current_tstamp: Mutex<Instant>,
    poll_timer: Mutex<Option<JoinHandle<()>>>,
}

impl GetworkClient {
    /// Create a client that reports through `events`
    pub fn new(cfg: GetworkConfig, events: mpsc::UnboundedSender<ClientEvent>) -> Self {
        Self {
            inner: Arc::new(Inner {
                cfg,
                events,
                conn: RwLock::new(None),
                connected: AtomicBool::new(false),
                connecting: AtomicBool::new(false),
                tx_pending: AtomicBool::new(false),
                zil_pow_running: AtomicBool::new(false),
                pow_window_timeout: AtomicBool::new(false),
                max_submit_id: AtomicU64::new(0),
                generation: AtomicU64::new(0),
                endpoints: Mutex::new(VecDeque::new()),
                current_endpoint: Mutex::new(None),
                tx_queue: Mutex::new(VecDeque::new()),
                session: Mutex::new(None),
                current: Mutex::new(WorkPackage::default()),
                current_tstamp: Mutex::new(Instant::now()),
                poll_timer: Mutex::new(None),
            }),
        }
    }
}

impl PoolClient for GetworkClient {
    fn set_connection(&self, endpoint: Arc<Endpoint>) {
        *self.inner.conn.write() = Some(endpoint);
    }

    fn unset_connection(&self) {
        *self.inner.conn.write() = None;
    }

    fn connect(&self) {
        self.inner.clone().connect();
    }

    fn disconnect(&self) {
        self.inner.disconnect();
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Relaxed)
    }

    fn active_endpoint(&self) -> String {
        match *self.inner.current_endpoint.lock() {
            Some(addr) => format!(" [{}]", addr),
            None => String::new(),
        }
    }

    fn is_zil_mode(&self) -> bool {
        self.inner.is_zil()
    }

    fn submit_solution(&self, solution: Solution) {
        let inner = &self.inner;
        if inner.is_zil() && !inner.zil_pow_running.load(Ordering::Relaxed) {
            // Off-window finds cannot be credited; drop and idle the miners
            inner.stop_work();
            return;
        }
        if solution.work.header == Hash256::from_low_u64_be(DUMMY_HEADER) {
            inner.stop_work();
            return;
        }
        if inner.session.lock().is_none() {
            return;
        }

        let id = SUBMIT_BASE_ID + u64::from(solution.miner_index);
        inner.max_submit_id.fetch_max(id, Ordering::Relaxed);
        let mut params = vec![
            json!(format!("0x{:016x}", solution.nonce)),
            json!(format!("0x{}", solution.work.header.to_hex())),
            json!(format!("0x{}", solution.mix_hash.to_hex())),
        ];
        if inner.is_zil() {
            if let Some(ep) = inner.conn.read().clone() {
                params.push(json!(format!("0x{}", solution.work.boundary.to_hex())));
                params.push(json!(ep.user()));
                params.push(json!(ep.workername()));
            }
        }
        let body = json!({
            "id": id,
            "jsonrpc": "2.0",
            "method": "eth_submitWork",
            "params": params,
        })
        .to_string();
        inner.send(TxRequest { id, body });
    }

    fn submit_hashrate(&self, rate_hex: &str, miner_id: &str) {
        let inner = &self.inner;
        if inner.is_zil() && !inner.zil_pow_running.load(Ordering::Relaxed) {
            return;
        }
        if inner.session.lock().is_none() {
            return;
        }

        let mut params = vec![json!(rate_hex)];
        if inner.is_zil() {
            if let Some(ep) = inner.conn.read().clone() {
                params.push(json!(ep.user()));
                params.push(json!(ep.workername()));
            }
        } else {
            params.push(json!(miner_id));
        }
        let body = json!({
            "id": HASHRATE_ID,
            "jsonrpc": "2.0",
            "method": "eth_submitHashrate",
            "params": params,
        })
        .to_string();
        inner.send(TxRequest {
            id: HASHRATE_ID,
            body,
        });
    }
}

impl Inner {
    fn is_zil(&self) -> bool {
        self.conn
            .read()
            .as_ref()
            .map(|ep| ep.scheme().is_zil())
            .unwrap_or(false)
    }

    fn host_label(&self) -> String {
        self.conn
            .read()
            .as_ref()
            .map(|ep| format!("{}:{}", ep.host(), ep.port()))
            .unwrap_or_default()
    }

    fn getwork_request() -> TxRequest {
        let body = json!({
            "id": GETWORK_ID,
            "jsonrpc": "2.0",
            "method": "eth_getWork",
            "params": [],
        })
        .to_string();
        TxRequest {
            id: GETWORK_ID,
            body,
        }
    }

    /// Begin a connection round: resolve the endpoint list, then issue the
    /// first getWork. Guarded by a CAS so overlapping calls are no-ops.
    fn connect(self: Arc<Self>) {
        if self
            .connecting
            .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        self.cancel_poll();
        self.endpoints.lock().clear();
        *self.current_endpoint.lock() = None;

        let Some(endpoint) = self.conn.read().clone() else {
            self.connecting.store(false, Ordering::Relaxed);
            return;
        };

        tokio::spawn(async move {
            match endpoint.host_kind() {
                HostKind::Ip => {
                    if let Ok(ip) = endpoint.host().parse::<IpAddr>() {
                        self.endpoints
                            .lock()
                            .push_back(SocketAddr::new(ip, endpoint.port()));
                    }
                }
                // Resolving anew on every round matters: load balancers
                // hand out their address lists in rotating order
                HostKind::Dns | HostKind::Basic => {
                    match net::lookup_host((endpoint.host(), endpoint.port())).await {
                        Ok(addrs) => {
                            let mut queue = self.endpoints.lock();
                            for addr in addrs {
                                queue.push_back(addr);
                            }
                        }
                        Err(e) => {
                            warn!(host = %endpoint.host(), error = %e, "Could not resolve host");
                            self.disconnect();
                            return;
                        }
                    }
                }
            }
            if self.generation.load(Ordering::Relaxed) != generation {
                return;
            }
            self.send(Self::getwork_request());
        });
    }

    /// Tear down the session and every in-flight helper task
    fn disconnect(self: &Arc<Self>) {
        self.generation.fetch_add(1, Ordering::Relaxed);
        self.connected.store(false, Ordering::Relaxed);
        if let Some(session) = self.session.lock().take() {
            if let Some(endpoint) = self.conn.read().clone() {
                endpoint.add_duration(session.duration());
            }
        }
        self.connecting.store(false, Ordering::Relaxed);
        self.tx_pending.store(false, Ordering::Relaxed);
        self.cancel_poll();
        self.tx_queue.lock().clear();
        self.endpoints.lock().clear();
        let _ = self.events.send(ClientEvent::Disconnected);
    }

    /// Queue a request and make sure a drain task is running
    fn send(self: &Arc<Self>, request: TxRequest) {
        self.tx_queue.lock().push_back(request);
        if self
            .tx_pending
            .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            let inner = self.clone();
            let generation = self.generation.load(Ordering::Relaxed);
            tokio::spawn(async move {
                inner.drive_queue(generation).await;
            });
        }
    }

    /// Drain the transmit queue one request per connection, in order.
    /// This task is the client's strand: at most one instance runs, and
    /// all parsing and state mutation happens here.
    async fn drive_queue(self: Arc<Self>, generation: u64) {
        loop {
            if self.generation.load(Ordering::Relaxed) != generation {
                return;
            }
            let Some(request) = self.tx_queue.lock().pop_front() else {
                self.tx_pending.store(false, Ordering::Relaxed);
                return;
            };

            let (raw, sent_at) = loop {
                if self.generation.load(Ordering::Relaxed) != generation {
                    return;
                }
                let Some(addr) = self.endpoints.lock().front().copied() else {
                    warn!(host = %self.host_label(), "No more IP addresses to try");
                    self.disconnect();
                    return;
                };
                match self.exchange(addr, &request, generation).await {
                    Ok(done) => break done,
                    Err(WireError::Connect(e)) => {
                        warn!(host = %self.host_label(), error = %e, "Error connecting to pool");
                        self.endpoints.lock().pop_front();
                    }
                    Err(WireError::Write(e)) => {
                        warn!(host = %self.host_label(), error = %e, "Error writing to pool");
                        self.endpoints.lock().pop_front();
                    }
                    Err(WireError::Read(e)) => {
                        warn!(host = %self.host_label(), error = %e, "Error reading from pool");
                        self.disconnect();
                        return;
                    }
                }
            };

            if self.generation.load(Ordering::Relaxed) != generation {
                return;
            }
            match parse_http_response(&raw) {
                Ok(body) => {
                    if self.cfg.log_json {
                        debug!(payload = %body, "<<");
                    }
                    match serde_json::from_str::<Value>(&body) {
                        Ok(response) => self.process_response(response, request.id, sent_at),
                        Err(e) => warn!(error = %e, "Got invalid JSON message"),
                    }
                }
                Err(e) => {
                    warn!(host = %self.host_label(), error = %e, "Invalid response from pool");
                    self.disconnect();
                    return;
                }
            }
        }
    }

    /// One full HTTP round trip: connect, write the request, read to EOF
    async fn exchange(
        self: &Arc<Self>,
        addr: SocketAddr,
        request: &TxRequest,
        generation: u64,
    ) -> std::result::Result<(String, Instant), WireError> {
        let mut stream = match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(WireError::Connect(e)),
            Err(_) => {
                return Err(WireError::Connect(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "connect timed out",
                )))
            }
        };

        // First successful connect of a round establishes the session.
        // getWork has no login, so the session is born fully authorized.
        if self
            .connecting
            .compare_exchange(true, false, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            if self.generation.load(Ordering::Relaxed) != generation {
                return Err(WireError::Connect(std::io::Error::new(
                    std::io::ErrorKind::Interrupted,
                    "connection round aborted",
                )));
            }
            self.connected.store(true, Ordering::Relaxed);
            *self.session.lock() = Some(Session::new(true, true));
            *self.current_endpoint.lock() = Some(addr);
            *self.current_tstamp.lock() = Instant::now();
            let _ = self.events.send(ClientEvent::Connected);
        }

        let (host, path) = {
            let conn = self.conn.read();
            match conn.as_ref() {
                Some(ep) => (
                    ep.host().to_string(),
                    if ep.path().is_empty() {
                        "/".to_string()
                    } else {
                        ep.path().to_string()
                    },
                ),
                None => (addr.ip().to_string(), "/".to_string()),
            }
        };
        let payload = format!(
            "POST {} HTTP/1.0\r\nHost: {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            path,
            host,
            request.body.len(),
            request.body
        );
        if self.cfg.log_json {
            debug!(payload = %request.body, ">>");
        }

        let sent_at = Instant::now();
        stream
            .write_all(payload.as_bytes())
            .await
            .map_err(WireError::Write)?;

        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.map_err(WireError::Read)?;
        Ok((String::from_utf8_lossy(&buf).into_owned(), sent_at))
    }

    /// Dispatch one parsed JSON-RPC response.
    ///
    /// The id used for demultiplexing is the id of the request the
    /// response answers, not the echoed one: some pools echo `id:0`
    /// no matter what they were asked.
    fn process_response(self: &Arc<Self>, response: Value, pending_id: u64, sent_at: Instant) {
        if response.get("id").is_none() {
            warn!(host = %self.host_label(), "Missing id member in response");
            return;
        }
        let is_success = response.get("error").map_or(true, Value::is_null);

        match pending_id {
            0 | 1 => {
                if !is_success {
                    // Pool is alive but cannot serve work yet (e.g. the
                    // node is still syncing); slow the poll loop down
                    warn!(
                        host = %self.host_label(),
                        error = %render_error(&response),
                        "Pool error on eth_getWork"
                    );
                    self.schedule_poll(POOL_ERROR_BACKOFF);
                } else if let Some(result) = response.get("result") {
                    self.handle_getwork(result);
                } else {
                    warn!(host = %self.host_label(), "Missing data for eth_getWork request");
                    self.schedule_poll(self.cfg.farm_recheck);
                }
            }
            HASHRATE_ID => {
                // Hashrate acknowledgements carry nothing actionable
            }
            id if id >= SUBMIT_BASE_ID && id <= self.max_submit_id.load(Ordering::Relaxed) => {
                let mut accepted = is_success;
                if accepted {
                    if let Some(flag) = response.get("result").and_then(Value::as_bool) {
                        accepted = flag;
                    }
                }
                let elapsed = sent_at.elapsed();
                let miner_index = (id - SUBMIT_BASE_ID) as u32;
                let event = if accepted {
                    ClientEvent::SolutionAccepted {
                        stale: false,
                        elapsed,
                        miner_index,
                    }
                } else {
                    ClientEvent::SolutionRejected {
                        stale: false,
                        elapsed,
                        miner_index,
                    }
                };
                let _ = self.events.send(event);

                if self.is_zil() {
                    // The window is short; fetch the next job promptly
                    self.schedule_poll(ZIL_SUBMIT_RECHECK);
                }
            }
            _ => {}
        }
    }

    /// Handle a successful `eth_getWork` result array
    fn handle_getwork(self: &Arc<Self>, result: &Value) {
        let zil = self.is_zil();
        let field = |i: usize| result.get(i).and_then(Value::as_str).unwrap_or("");

        let mut new_wp = WorkPackage {
            header: Hash256::from_hex(field(0)).unwrap_or_default(),
            seed: Hash256::from_hex(field(1)).unwrap_or_default(),
            boundary: Hash256::from_hex(field(2)).unwrap_or_default(),
            ..Default::default()
        };
        let seed_present = !field(1).is_empty();

        let mut pow_running = false;
        let mut secs_to_next = 0u64;
        if zil {
            pow_running = result.get(3).and_then(Value::as_bool).unwrap_or(false);
            secs_to_next = result.get(4).and_then(Value::as_u64).unwrap_or(0);

            if new_wp.is_present() {
                *self.current_tstamp.lock() = Instant::now();
                self.pow_window_timeout.store(false, Ordering::Relaxed);
            }

            let window_open = pow_running
                || Duration::from_secs(secs_to_next) <= self.cfg.pow_start_window;
            if window_open
                && !self.pow_window_timeout.load(Ordering::Relaxed)
                && !self.zil_pow_running.load(Ordering::Relaxed)
            {
                self.zil_pow_running.store(true, Ordering::Relaxed);
                info!("PoW window start");
                let _ = self.events.send(ClientEvent::PowStart);

                if !new_wp.is_present() {
                    // No real job yet: synthesize an easy package so the
                    // engine builds its DAG before the window fills
                    info!("Sending dummy work to initialize the DAG");
                    let mut boundary = Hash256::zero();
                    boundary.as_bytes_mut()[3] = 0x04;
                    let dummy = WorkPackage {
                        header: Hash256::from_low_u64_be(DUMMY_HEADER),
                        seed: if seed_present {
                            new_wp.seed
                        } else {
                            self.current.lock().seed
                        },
                        boundary,
                        ..Default::default()
                    };
                    let _ = self.events.send(ClientEvent::WorkReceived(dummy));
                }
                *self.current_tstamp.lock() = Instant::now();
            }
        }

        new_wp.job = new_wp.header.to_hex();

        let mut fresh = None;
        {
            let mut current = self.current.lock();
            let new_job =
                current.header != new_wp.header || current.boundary != new_wp.boundary;
            if new_job && (!zil || self.zil_pow_running.load(Ordering::Relaxed)) {
                *current = new_wp.clone();
                fresh = Some(new_wp);
            }
        }
        if let Some(wp) = fresh {
            *self.current_tstamp.lock() = Instant::now();
            let _ = self.events.send(ClientEvent::WorkReceived(wp));
        }

        let mut sleep_for = self.cfg.farm_recheck;
        if zil {
            let mut pow_end =
                !pow_running && Duration::from_secs(secs_to_next) > self.cfg.pow_start_window;
            if pow_end {
                self.pow_window_timeout.store(false, Ordering::Relaxed);
            } else {
                let stale_for = self.current_tstamp.lock().elapsed();
                let timed_out = stale_for > self.cfg.pow_end_timeout;
                self.pow_window_timeout.store(timed_out, Ordering::Relaxed);
                pow_end = timed_out;
            }

            if pow_end {
                if secs_to_next > 0 {
                    sleep_for = sleep_for.min(Duration::from_secs(secs_to_next));
                }
                if self
                    .zil_pow_running
                    .compare_exchange(true, false, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
                {
                    self.stop_work();
                    info!("PoW window end");
                    let _ = self.events.send(ClientEvent::PowEnd);
                }
            }
        }
        self.schedule_poll(sleep_for);
    }

    /// Deliver an empty package so the engine pauses its miners
    fn stop_work(self: &Arc<Self>) {
        let package = {
            let mut current = self.current.lock();
            current.header = Hash256::zero();
            current.clone()
        };
        let _ = self.events.send(ClientEvent::WorkReceived(package));
    }

    /// Arm the poll timer, replacing any previous one
    fn schedule_poll(self: &Arc<Self>, delay: Duration) {
        let inner = self.clone();
        let generation = self.generation.load(Ordering::Relaxed);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if inner.generation.load(Ordering::Relaxed) != generation {
                return;
            }
            inner.poll_elapsed();
        });
        if let Some(previous) = self.poll_timer.lock().replace(handle) {
            previous.abort();
        }
    }

    fn cancel_poll(&self) {
        if let Some(handle) = self.poll_timer.lock().take() {
            handle.abort();
        }
    }

    /// Poll timer fired: either the pool stalled, or it is time to ask again
    fn poll_elapsed(self: &Arc<Self>) {
        let age = self.current_tstamp.lock().elapsed();
        if age > self.cfg.work_timeout {
            warn!(
                host = %self.host_label(),
                timeout_secs = self.cfg.work_timeout.as_secs(),
                "No new work received within the work timeout"
            );
            self.endpoints.lock().pop_front();
            self.disconnect();
        } else {
            self.send(Self::getwork_request());
        }
    }
}

/// Split an HTTP/1.0 response into validated framing and its JSON body
///
/// The status token must begin with `200`; headers are skipped up to the
/// blank line; the remainder, stripped of line breaks, is the body.
fn parse_http_response(raw: &str) -> Result<String> {
    if raw.is_empty() {
        return Err(Error::http("empty response"));
    }
    let (status_line, mut rest) = raw
        .split_once("\r\n")
        .ok_or_else(|| Error::http("missing status line"))?;
    if !status_line.starts_with("HTTP/1.") {
        return Err(Error::http(format!(
            "unexpected status line '{}'",
            status_line
        )));
    }
    let status = status_line
        .split_once(' ')
        .map(|(_, status)| status)
        .ok_or_else(|| Error::http("status line carries no status code"))?;
    if !status.starts_with("200") {
        return Err(Error::http(format!("pool reported status {}", status)));
    }
    loop {
        let (line, tail) = rest
            .split_once("\r\n")
            .ok_or_else(|| Error::http("truncated headers"))?;
        rest = tail;
        if line.is_empty() {
            break;
        }
    }
    Ok(rest.replace(['\r', '\n'], ""))
}

/// Render a JSON-RPC `error` member, which pools ship as a string, an
/// array of strings, or an object
fn render_error(response: &Value) -> String {
    match response.get("error") {
        Some(Value::String(message)) => message.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item.as_str() {
                Some(s) => s.to_string(),
                None => item.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" "),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(key, value)| match value.as_str() {
                Some(s) => format!("{}:{}", key, s),
                None => format!("{}:{}", key, value),
            })
            .collect::<Vec<_>>()
            .join(" "),
        _ => "Unknown error".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_getwork_request_is_canonical() {
        let request = Inner::getwork_request();
        assert_eq!(request.id, 1);
        assert_eq!(
            request.body,
            r#"{"id":1,"jsonrpc":"2.0","method":"eth_getWork","params":[]}"#
        );
    }

    #[test]
    fn test_parse_http_response_ok() {
        let raw = "HTTP/1.0 200 OK\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n{\"id\":1}\n";
        assert_eq!(parse_http_response(raw).unwrap(), "{\"id\":1}");
    }

    #[test]
    fn test_parse_http_response_rejects_non_200() {
        let raw = "HTTP/1.1 502 Bad Gateway\r\n\r\n";
        let err = parse_http_response(raw).unwrap_err();
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn test_parse_http_response_rejects_garbage() {
        assert!(parse_http_response("").is_err());
        assert!(parse_http_response("ICY 200 OK\r\n\r\nbody").is_err());
        assert!(parse_http_response("HTTP/1.0-no-space\r\n\r\n").is_err());
        assert!(parse_http_response("HTTP/1.0 200 OK\r\nheaders-never-end").is_err());
    }

    #[test]
    fn test_parse_http_response_strips_line_breaks_from_body() {
        let raw = "HTTP/1.0 200 OK\r\n\r\n{\"id\":1,\n\"result\":[]}\r\n";
        assert_eq!(parse_http_response(raw).unwrap(), "{\"id\":1,\"result\":[]}");
    }

    #[test]
    fn test_render_error_shapes() {
        let as_string = serde_json::json!({"error": "node is syncing"});
        assert_eq!(render_error(&as_string), "node is syncing");

        let as_array = serde_json::json!({"error": ["node", "syncing"]});
        assert_eq!(render_error(&as_array), "node syncing");

        let as_object = serde_json::json!({"error": {"code": -32000, "message": "syncing"}});
        let rendered = render_error(&as_object);
        assert!(rendered.contains("code:-32000"));
        assert!(rendered.contains("message:syncing"));

        let absent = serde_json::json!({"result": []});
        assert_eq!(render_error(&absent), "Unknown error");
    }
}
