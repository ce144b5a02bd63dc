#![forbid(unsafe_code)]

use std::sync::Arc;
use std::thread;

use review_ledger_contracts::MonotonicTimeNs;
use review_ledger_storage::ttl_cache::TtlCache;

#[test]
fn at_ttl_cache_conc_01_parallel_writers_and_readers() {
    let cache: Arc<TtlCache<String, u32>> = Arc::new(TtlCache::new());
    let writers: Vec<_> = (0..8u32)
        .map(|t| {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..100u32 {
                    cache.set(MonotonicTimeNs(0), format!("k:{t}:{i}"), i, 60);
                    assert_eq!(cache.get(MonotonicTimeNs(0), &format!("k:{t}:{i}")), Some(i));
                }
            })
        })
        .collect();
    for w in writers {
        w.join().unwrap();
    }
    assert_eq!(cache.len(), 800);
    // One access past every deadline clears the whole table.
    assert!(!cache.exists(MonotonicTimeNs::default().saturating_add_secs(61), "k:0:0"));
    assert!(cache.is_empty());
}
