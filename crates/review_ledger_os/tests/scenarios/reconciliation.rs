#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use review_ledger_contracts::review::{
    Address, CorrelationId, CorrelationSource, ProductId, ReviewDraft, ReviewId, ReviewRowInput,
    ReviewSyncState, TxHash,
};
use review_ledger_contracts::{MonotonicTimeNs, ReviewLedgerError};
use review_ledger_engines::ledger_client::{InMemoryLedger, LedgerClientRuntime};
use review_ledger_engines::reconcile::{RECONCILE_CODE_ALREADY_SYNCED, RECONCILE_CODE_SYNCED};
use review_ledger_os::config::ReviewLedgerConfig;
use review_ledger_os::repair::REPAIR_CODE_COMPLETED;
use review_ledger_os::runtime::ReviewLedgerRuntime;
use review_ledger_os::sweeper::{SweepItemStatus, SWEEP_CODE_COMPLETED, SWEEP_CODE_NOTHING_TO_SWEEP};
use review_ledger_storage::review_store::{ReviewLedgerStore, ReviewRowFilter};
use tokio::runtime::Handle;

struct Harness {
    store: Arc<ReviewLedgerStore>,
    ledger: Arc<InMemoryLedger>,
    runtime: ReviewLedgerRuntime,
}

fn harness(upload_delay_ms: u64) -> Harness {
    let store = Arc::new(ReviewLedgerStore::new_in_memory());
    let ledger = Arc::new(InMemoryLedger::default());
    let config = ReviewLedgerConfig {
        upload_delay_ms,
        ..ReviewLedgerConfig::mvp_v1()
    };
    let runtime = ReviewLedgerRuntime::new(
        &Handle::current(),
        config,
        store.clone(),
        Arc::new(LedgerClientRuntime::InMemory(ledger.clone())),
    );
    Harness {
        store,
        ledger,
        runtime,
    }
}

fn draft(product: u64, content: &str) -> ReviewDraft {
    ReviewDraft::v1(
        ProductId(product),
        Address::new("0xreviewer").unwrap(),
        5,
        content.to_string(),
        60,
    )
    .unwrap()
}

fn insert_unsynced(store: &ReviewLedgerStore, product: u64) -> ReviewId {
    store
        .insert_review(
            ReviewRowInput::from_draft(draft(product, "backlog"), MonotonicTimeNs(product), 50)
                .unwrap(),
        )
        .unwrap()
        .id
}

fn insert_half_synced(store: &ReviewLedgerStore, product: u64, tx: &str) -> ReviewId {
    let id = insert_unsynced(store, product);
    let mut row = store.review_row(id).unwrap();
    row.tx_hash = Some(TxHash::new(tx).unwrap());
    store.update_review(&row).unwrap();
    id
}

async fn wait_for_state(store: &ReviewLedgerStore, id: ReviewId, want: ReviewSyncState) -> bool {
    for _ in 0..100 {
        if store.review_row(id).map(|r| r.sync_state()) == Some(want) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn at_scenarios_01_created_review_syncs_after_upload_delay() {
    let h = harness(100);
    let created = h.runtime.create_review(MonotonicTimeNs(1), draft(42, "ok")).unwrap();

    let row = h.store.review_row(created.review_id).unwrap();
    assert_eq!(row.sync_state(), ReviewSyncState::Unsynced);
    assert!(row.verified);

    assert!(wait_for_state(&h.store, created.review_id, ReviewSyncState::Synced).await);
    let row = h.store.review_row(created.review_id).unwrap();
    assert!(row.tx_hash.is_some());
    assert_eq!(row.correlation_id, Some(CorrelationId(h.ledger.len() as u64)));
    assert_eq!(row.nft_id.as_str(), "NFT_1");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn at_scenarios_02_sweep_syncs_two_backlogged_reviews() {
    let h = harness(0);
    let a = insert_unsynced(&h.store, 1);
    let b = insert_unsynced(&h.store, 2);

    let report = h.runtime.sweep_unsynced();
    assert_eq!(report.code, SWEEP_CODE_COMPLETED);
    assert_eq!((report.success_count, report.fail_count), (2, 0));
    for id in [a, b] {
        assert!(h.store.review_row(id).unwrap().is_synced());
    }
    assert_eq!(h.ledger.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn at_scenarios_03_repair_assigns_first_position() {
    let h = harness(0);
    for product in 1..=5 {
        insert_unsynced(&h.store, 100 + product);
    }
    assert_eq!(h.runtime.sweep_unsynced().success_count, 5);
    let id = insert_half_synced(&h.store, 7, "0xabc");

    let report = h.runtime.repair_half_synced();
    assert_eq!(report.code, REPAIR_CODE_COMPLETED);
    assert_eq!(report.fixed_count, 1);

    let row = h.store.review_row(id).unwrap();
    assert_eq!(row.correlation_id, Some(CorrelationId(0)));
    assert_eq!(row.correlation_source, Some(CorrelationSource::RepairHeuristic));
    assert_eq!(row.tx_hash, Some(TxHash::new("0xabc").unwrap()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn at_scenarios_04_repair_order_is_clamped_and_deterministic() {
    let h = harness(0);
    for product in 1..=2 {
        insert_unsynced(&h.store, product);
    }
    h.runtime.sweep_unsynced();
    let ids: Vec<_> = (0..4)
        .map(|i| insert_half_synced(&h.store, 10 + i, &format!("0xhalf{i}")))
        .collect();

    let report = h.runtime.repair_half_synced();
    assert_eq!(report.fixed_count, 4);
    let assigned: Vec<_> = ids
        .iter()
        .map(|id| h.store.review_row(*id).unwrap().correlation_id.unwrap().0)
        .collect();
    assert_eq!(assigned, vec![0, 1, 1, 1]);
    assert!(h.store.review_rows_where(ReviewRowFilter::HalfSynced).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn at_scenarios_05_repair_skips_rows_when_ledger_is_empty() {
    let h = harness(0);
    let id = insert_half_synced(&h.store, 1, "0xorphan");
    let report = h.runtime.repair_half_synced();
    assert_eq!(report.fixed_count, 0);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].error, ReviewLedgerError::LedgerEmpty);
    assert_eq!(
        h.store.review_row(id).unwrap().sync_state(),
        ReviewSyncState::HalfSynced
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn at_scenarios_06_repeat_sweep_is_a_no_op() {
    let h = harness(0);
    insert_unsynced(&h.store, 1);
    assert_eq!(h.runtime.sweep_unsynced().success_count, 1);

    let again = h.runtime.sweep_unsynced();
    assert_eq!(again.code, SWEEP_CODE_NOTHING_TO_SWEEP);
    assert_eq!(again.attempted(), 0);
    assert_eq!(h.ledger.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn at_scenarios_07_submit_one_twice_hits_ledger_once() {
    let h = harness(0);
    let id = insert_unsynced(&h.store, 9);
    let first = h.runtime.submit_one(id);
    let second = h.runtime.submit_one(id);
    assert_eq!(first.code(), RECONCILE_CODE_SYNCED);
    assert_eq!(second.code(), RECONCILE_CODE_ALREADY_SYNCED);
    assert_eq!(first.tx_hash, second.tx_hash);
    assert_eq!(h.ledger.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn at_scenarios_08_sweep_continues_past_failed_items() {
    // Every item fails on the ledger; the pass still visits each row in id order.
    let store = Arc::new(ReviewLedgerStore::new_in_memory());
    let runtime = ReviewLedgerRuntime::new(
        &Handle::current(),
        ReviewLedgerConfig::mvp_v1(),
        store.clone(),
        Arc::new(LedgerClientRuntime::always_fail("rpc timeout")),
    );
    let ids: Vec<_> = (1..=3).map(|p| insert_unsynced(&store, p)).collect();

    let report = runtime.sweep_unsynced();
    assert_eq!(report.attempted(), 3);
    assert_eq!(report.fail_count, 3);
    assert_eq!(
        report.details.iter().map(|d| d.review_id).collect::<Vec<_>>(),
        ids
    );
    assert!(report
        .details
        .iter()
        .all(|d| d.status == SweepItemStatus::Failed));
    assert_eq!(store.review_rows_where(ReviewRowFilter::TxHashMissing).len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn at_scenarios_09_status_and_listing_follow_sync() {
    let h = harness(0);
    let id = insert_unsynced(&h.store, 4);
    h.runtime.submit_one(id);
    assert!(matches!(
        h.runtime.ledger_status(id).unwrap(),
        review_ledger_os::status::LedgerStatusView::Confirmed { .. }
    ));
    let page = h.runtime.list_synced(1, 10).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, id);
}
