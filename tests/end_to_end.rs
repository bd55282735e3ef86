//! Full-stack test: a real PoolManager driving a real GetworkClient
//! against an in-process HTTP pool

mod common;

use common::{http_ok, spawn_pool, wait_until, FakeEngine, FakeOracle};
use ethash_pool_client::prelude::*;
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(2);

#[tokio::test]
async fn manager_and_getwork_client_mine_end_to_end() {
    let pool = spawn_pool(|req, _n| match req.get("method").and_then(Value::as_str) {
        Some("eth_getWork") => http_ok(
            &json!({
                "id": 0,
                "result": [
                    format!("0x{}", "aa".repeat(32)),
                    format!("0x{}", "bb".repeat(32)),
                    format!("0x00000000{}", "ff".repeat(28)),
                ],
            })
            .to_string(),
        ),
        Some("eth_submitWork") => http_ok(r#"{"id":0,"result":true}"#),
        _ => http_ok(r#"{"id":9,"result":true}"#),
    })
    .await;

    let (client_tx, client_rx) = mpsc::unbounded_channel();
    let (engine_tx, engine_rx) = mpsc::unbounded_channel();
    let client = Arc::new(GetworkClient::new(
        GetworkConfig {
            farm_recheck: Duration::from_millis(30),
            ..Default::default()
        },
        client_tx,
    ));
    let engine = Arc::new(FakeEngine::new());
    engine.set_hash_rate(1_000_000_000.0);
    let oracle = Arc::new(FakeOracle::new(3));
    let shutdown = CancellationToken::new();

    let manager = PoolManager::new(
        client.clone() as Arc<dyn PoolClient>,
        client_rx,
        engine.clone() as Arc<dyn MiningEngine>,
        engine_rx,
        oracle.clone() as Arc<dyn EpochOracle>,
        ManagerConfig {
            hashrate_interval: Duration::from_millis(50),
            ..Default::default()
        },
        shutdown.clone(),
    );
    manager.add_connection(Arc::new(
        Endpoint::parse(&format!("http://wallet.rig@{}", pool.addr)).unwrap(),
    ));
    manager.start();

    // Work flows from the pool through the manager into the engine; the
    // pool reports no block height, so the oracle resolves the epoch
    assert!(wait_until(|| engine.work_count() >= 1, WAIT).await);
    assert!(engine.is_mining());
    assert_eq!(manager.current_epoch(), 3);
    assert_eq!(oracle.calls.load(Ordering::Relaxed), 1);
    assert!(manager.current_difficulty() > 4.0e9);
    let work = engine.last_work().unwrap();
    assert_eq!(work.header, Hash256::from_hex(&"aa".repeat(32)).unwrap());

    // A found solution travels back and the acceptance is accounted
    engine_tx
        .send(EngineEvent::SolutionFound(Solution {
            nonce: 9,
            mix_hash: Hash256::from_low_u64_be(2),
            work,
            miner_index: 1,
        }))
        .unwrap();
    assert!(
        wait_until(
            || pool.requests_with_method("eth_submitWork").len() == 1,
            WAIT
        )
        .await
    );
    assert_eq!(pool.requests_with_method("eth_submitWork")[0]["id"], 41);
    assert!(wait_until(|| engine.accepted.load(Ordering::Relaxed) == 1, WAIT).await);

    // The hashrate timer reports through the same client
    assert!(
        wait_until(
            || !pool.requests_with_method("eth_submitHashrate").is_empty(),
            WAIT
        )
        .await
    );

    manager.stop().await;
    assert!(!manager.is_running());
    assert!(!engine.is_mining());
}
