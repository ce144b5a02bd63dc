#![forbid(unsafe_code)]

use std::sync::Arc;
use std::thread;

use review_ledger_contracts::review::{
    Address, CorrelationId, ProductId, ReviewDraft, ReviewId, ReviewRowInput, ReviewSyncState,
    TxHash,
};
use review_ledger_contracts::MonotonicTimeNs;
use review_ledger_storage::repo::ReviewRepo;
use review_ledger_storage::review_store::{ReviewLedgerStore, ReviewRowFilter};

fn row(product: u64, at: u64) -> ReviewRowInput {
    let draft = ReviewDraft::v1(
        ProductId(product),
        Address::new("dbw_author_1").unwrap(),
        3,
        "fine".to_string(),
        80,
    )
    .unwrap();
    ReviewRowInput::from_draft(draft, MonotonicTimeNs(at), 50).unwrap()
}

#[test]
fn at_review_db_01_repo_round_trip_through_trait_object() {
    let repo: Arc<dyn ReviewRepo> = Arc::new(ReviewLedgerStore::new_in_memory());
    let inserted = repo.insert_review_row(row(42, 10)).unwrap();
    let fetched = repo.get_review_row(inserted.id).unwrap().unwrap();
    assert_eq!(fetched, inserted);
    assert_eq!(fetched.sync_state(), ReviewSyncState::Unsynced);
    assert!(repo.get_review_row(ReviewId(404)).unwrap().is_none());
}

#[test]
fn at_review_db_02_sync_fields_persist_in_one_update() {
    let repo = ReviewLedgerStore::new_in_memory();
    let mut r = repo.insert_review_row(row(1, 1)).unwrap();
    r.mark_synced(TxHash::new("0xfeed").unwrap(), CorrelationId(3));
    repo.update_review_row(&r).unwrap();

    let stored = repo.get_review_row(r.id).unwrap().unwrap();
    assert_eq!(stored.sync_state(), ReviewSyncState::Synced);
    assert_eq!(stored.nft_id.as_str(), "NFT_3");
    assert!(repo
        .query_review_rows(ReviewRowFilter::TxHashMissing)
        .unwrap()
        .is_empty());
}

#[test]
fn at_review_db_03_concurrent_inserts_get_unique_ids() {
    let repo = Arc::new(ReviewLedgerStore::new_in_memory());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let repo = repo.clone();
            thread::spawn(move || repo.insert_review_row(row(i, i)).unwrap().id)
        })
        .collect();
    let mut ids: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap().0).collect();
    ids.sort_unstable();
    assert_eq!(ids, (1..=8).collect::<Vec<_>>());
}
