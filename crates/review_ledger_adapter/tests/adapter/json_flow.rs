#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use review_ledger_adapter::{
    AdapterRuntime, CreateReviewAdapterRequest, VerifyNonceAdapterRequest, VoteAdapterRequest,
};
use review_ledger_engines::ledger_client::LedgerClientRuntime;
use review_ledger_os::config::ReviewLedgerConfig;
use review_ledger_os::runtime::ReviewLedgerRuntime;
use review_ledger_storage::review_store::ReviewLedgerStore;
use tokio::runtime::Handle;

fn adapter() -> AdapterRuntime {
    let config = ReviewLedgerConfig {
        upload_delay_ms: 60_000,
        ..ReviewLedgerConfig::mvp_v1()
    };
    let runtime = ReviewLedgerRuntime::new(
        &Handle::current(),
        config,
        Arc::new(ReviewLedgerStore::new_in_memory()),
        Arc::new(LedgerClientRuntime::in_memory()),
    );
    AdapterRuntime::new(runtime, "in_memory")
}

fn create_request() -> CreateReviewAdapterRequest {
    serde_json::from_value(serde_json::json!({
        "product_id": 42,
        "author_address": "0xreviewer",
        "rating": 5,
        "content": "ok",
        "images": null,
        "ipfs_cid": "bafy",
        "author_reputation": 75
    }))
    .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn at_adapter_json_01_create_sweep_status_list() {
    let adapter = adapter();
    let created = adapter.run_create_review(create_request(), Some(1)).unwrap();
    assert_eq!(created.status, "ok");

    let pending = adapter.run_ledger_status(created.review_id).unwrap();
    assert_eq!(
        serde_json::to_value(&pending).unwrap(),
        serde_json::json!({ "state": "not_submitted" })
    );

    let sweep = adapter.run_sweep_unsynced();
    assert_eq!((sweep.code, sweep.success_count, sweep.fail_count), (0, 1, 0));
    assert_eq!(sweep.details[0].status, "success");
    assert_eq!(sweep.details[0].result.correlation_id, Some(1));

    let again = adapter.run_submit_one(created.review_id);
    assert_eq!(again.code, 1);
    assert_eq!(again.tx_hash, sweep.details[0].result.tx_hash);

    let status = serde_json::to_value(adapter.run_ledger_status(created.review_id).unwrap()).unwrap();
    assert_eq!(status["state"], "confirmed");
    assert_eq!(status["correlation_id"], 1);

    let page = adapter.run_list_synced(1, 20).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].nft_id.as_str(), "NFT_1");

    let repair = adapter.run_repair_half_synced();
    assert_eq!((repair.code, repair.fixed_count), (0, 0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn at_adapter_json_02_nonce_and_vote_round() {
    let adapter = adapter();
    let issued = adapter.run_issue_nonce("0xvoter".to_string(), Some(10)).unwrap();
    let verify = |nonce: &str| {
        adapter
            .run_verify_nonce(
                VerifyNonceAdapterRequest {
                    address: "0xvoter".to_string(),
                    nonce: nonce.to_string(),
                },
                Some(11),
            )
            .unwrap()
            .valid
    };
    assert!(verify(&issued.nonce));
    assert!(!verify(&issued.nonce));

    let created = adapter.run_create_review(create_request(), Some(12)).unwrap();
    let vote = VoteAdapterRequest {
        review_id: created.review_id,
        address: "0xvoter".to_string(),
        is_helpful: false,
    };
    let tally = adapter.run_register_vote(vote.clone(), Some(13)).unwrap();
    assert_eq!((tally.helpful_votes, tally.unhelpful_votes), (0, 1));
    let dup = adapter.run_register_vote(vote, Some(14)).unwrap_err();
    assert!(dup.contains("already has a vote"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn at_adapter_json_03_sweep_worker_picks_up_intake() {
    let adapter = adapter();
    let created = adapter.run_create_review(create_request(), Some(1)).unwrap();
    assert!(created.upload_enqueued);

    let worker = adapter.spawn_sweep_worker(&Handle::current(), Duration::from_millis(20));
    let deadline = Instant::now() + Duration::from_secs(5);
    let status = loop {
        let status = serde_json::to_value(adapter.run_ledger_status(created.review_id).unwrap()).unwrap();
        if status["state"] == "confirmed" || Instant::now() > deadline {
            break status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    };
    worker.abort();

    assert_eq!(status["state"], "confirmed");
    assert_eq!(status["record"]["product_id"], "42");
    let counters = adapter.sweep_worker_counters();
    assert!(counters.pass_count >= 1);
    assert_eq!(counters.success_total, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn at_adapter_json_04_command_lines_share_one_store() {
    let adapter = adapter();
    let created: serde_json::Value = serde_json::from_str(&adapter.run_command_line(
        r#"{"op":"create_review","product_id":42,"author_address":"0xreviewer","rating":5,"content":"ok","images":null,"ipfs_cid":null,"author_reputation":75}"#,
    ))
    .unwrap();
    assert_eq!(created["status"], "ok");

    let sweep: serde_json::Value =
        serde_json::from_str(&adapter.run_command_line(r#"{"op":"sweep_unsynced"}"#)).unwrap();
    assert_eq!(sweep["result"]["success_count"], 1);

    let page: serde_json::Value = serde_json::from_str(
        &adapter.run_command_line(r#"{"op":"list_synced","page":1,"page_size":20}"#),
    )
    .unwrap();
    assert_eq!(page["result"]["total"], 1);
}
