//! Integration tests for the complete mining flow

use mockito::{Matcher, Server};
use scrypt_mining_client::{
    client::{BackoffConfig, GetworkClient},
    coordinator::{CoordinatorConfig, CycleOutcome, MiningCoordinator},
    crypto::ScryptHasher,
    worker::CpuWorker,
    BlockHeader, HeaderBuilder, NonceSearcher, SearchOutcome, WorkTemplate,
};
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// Litecoin genesis header in getwork word order, nonce word lowered by two
const GENESIS_START: &str = "000000010000000000000000000000000000000000000000000000000000000000000000edd4ced9b7f73011e29badfaafff2353a13232a36cdf3e7ce6be97fd97ddfbba4e8eaab91e0ffff07a3f51cd";
const GENESIS_SOLVED: &str = "000000010000000000000000000000000000000000000000000000000000000000000000edd4ced9b7f73011e29badfaafff2353a13232a36cdf3e7ce6be97fd97ddfbba4e8eaab91e0ffff07c3f51cd";
const GENESIS_TARGET: &str = "000000000000000000000000000000000000000000000000000000f0ff0f0000";

fn searcher() -> NonceSearcher {
    NonceSearcher::new(ScryptHasher::new().unwrap()).with_progress_interval(0)
}

#[test]
fn test_parse_search_serialize() {
    let template = WorkTemplate::new(GENESIS_START, GENESIS_TARGET);
    let mut header = HeaderBuilder::parse(&template).unwrap();
    let target = HeaderBuilder::parse_target(&template).unwrap();

    let outcome = searcher().search(&mut header, &target, &|| false).unwrap();

    let (nonce, digest) = match outcome {
        SearchOutcome::Found { nonce, digest, .. } => (nonce, digest),
        other => panic!("expected a solution, got {:?}", other),
    };
    assert_eq!(
        digest.to_hex(),
        "0000050c34a64b415b6b15b37f2216634b5b1669cb9a2e38d76f7213b0671e00"
    );
    assert_eq!(
        HeaderBuilder::serialize_solution(&template.data, &nonce).unwrap(),
        GENESIS_SOLVED
    );

    // The solved header parses back to the winning nonce
    let solved = HeaderBuilder::parse(&WorkTemplate::new(GENESIS_SOLVED, GENESIS_TARGET)).unwrap();
    assert_eq!(solved, header);
    assert_eq!(solved.to_hex().len(), BlockHeader::HEX_LEN);
}

#[tokio::test]
async fn test_mine_genesis_against_rpc_server() {
    let mut server = Server::new_async().await;
    let fetch = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "getwork", "params": []})))
        .with_status(200)
        .with_body(
            json!({
                "result": {
                    "midstate": "00".repeat(32),
                    "data": GENESIS_START,
                    "hash1": "00".repeat(64),
                    "target": GENESIS_TARGET
                },
                "error": null,
                "id": 1
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let submit = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "getwork", "params": [GENESIS_SOLVED]})))
        .with_status(200)
        .with_body(json!({"result": true, "error": null, "id": 2}).to_string())
        .expect(1)
        .create_async()
        .await;

    let client = GetworkClient::new(server.url(), None, Duration::from_secs(5))
        .unwrap()
        .with_backoff_config(BackoffConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
            max_retries: 2,
        });
    let coordinator = MiningCoordinator::new(
        client,
        CpuWorker::new(searcher()),
        CoordinatorConfig {
            work_timeout: Some(Duration::from_secs(60)),
            retry_delay: Duration::from_millis(1),
            once: true,
        },
    );

    let stats = coordinator.run(CancellationToken::new()).await.unwrap();

    assert_eq!(stats.cycles, 1);
    assert_eq!(stats.accepted, 1);
    assert_eq!(coordinator.worker_stats().total_hashes, 3);
    fetch.assert_async().await;
    submit.assert_async().await;
}

#[tokio::test]
async fn test_server_error_aborts_cycle() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_body(
            json!({"result": null, "error": {"code": -9, "message": "not connected"}, "id": 1})
                .to_string(),
        )
        .create_async()
        .await;

    let client = GetworkClient::new(server.url(), None, Duration::from_secs(5)).unwrap();
    let coordinator = MiningCoordinator::new(
        client,
        CpuWorker::new(searcher()),
        CoordinatorConfig::default(),
    );

    let result = coordinator.run_cycle(&CancellationToken::new()).await;
    assert!(result.is_err());

    let cancellation = CancellationToken::new();
    cancellation.cancel();
    assert_eq!(
        coordinator.run_cycle(&cancellation).await.unwrap(),
        CycleOutcome::Cancelled { iterations: 0 }
    );
}
