//! Concurrent batches against one cursor must never issue the same code twice.

use std::sync::Arc;

use ean_generator::cursor_store::{cursor_key, CursorStore, InMemoryCursorStore};
use ean_generator::metrics::Metrics;
use ean_generator::{BaseCode, PrefixRule, SequenceGenerator, SequenceGeneratorError};

fn shared_generator(store: Arc<InMemoryCursorStore>, max_attempts: u32) -> Arc<SequenceGenerator> {
    Arc::new(SequenceGenerator::new(store, Metrics::new().unwrap(), max_attempts))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_rule_batches_issue_disjoint_contiguous_ranges() {
    let store = Arc::new(InMemoryCursorStore::new());
    let generator = shared_generator(store.clone(), 10_000);
    let rule = Arc::new(PrefixRule::new("main", "789", "12345", 0).unwrap());
    let tasks = 16;
    let per_batch = 25u32;

    let handles: Vec<_> = (0..tasks)
        .map(|_| {
            let generator = Arc::clone(&generator);
            let rule = Arc::clone(&rule);
            tokio::spawn(async move { generator.generate_for_rule("alice", &rule, per_batch).await })
        })
        .collect();

    let mut issued: Vec<u64> = Vec::new();
    for handle in handles {
        let report = handle.await.unwrap().expect("batch should eventually commit");
        assert!(report.cursor_saved);
        issued.extend(report.codes.iter().map(|c| c.base_code.value()));
    }

    issued.sort_unstable();
    let before = issued.len();
    issued.dedup();
    assert_eq!(issued.len(), before, "Found codes issued twice");
    assert_eq!(issued.len(), tasks * per_batch as usize);

    let first = BaseCode::parse("789123450000").unwrap().value();
    assert_eq!(issued.first().copied(), Some(first));
    assert!(issued.windows(2).all(|w| w[1] == w[0] + 1), "Ranges left a gap");

    let cursor = store.get(&cursor_key("alice", "main")).await.unwrap().unwrap();
    assert_eq!(cursor.value(), first + issued.len() as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn exhausted_retries_fail_instead_of_overlapping() {
    let store = Arc::new(InMemoryCursorStore::new());
    let generator = shared_generator(store.clone(), 1);
    let seed = BaseCode::parse("000000001000").unwrap();
    generator.generate_free_form("bob", Some(seed), 1).await.unwrap();

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let generator = Arc::clone(&generator);
            tokio::spawn(async move { generator.generate_free_form("bob", None, 10).await })
        })
        .collect();

    let mut issued: Vec<u64> = vec![seed.value()];
    for handle in handles {
        match handle.await.unwrap() {
            Ok(report) => issued.extend(report.codes.iter().map(|c| c.base_code.value())),
            Err(SequenceGeneratorError::ConcurrentModification { attempts, .. }) => assert_eq!(attempts, 1),
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    issued.sort_unstable();
    let before = issued.len();
    issued.dedup();
    assert_eq!(issued.len(), before, "Found codes issued twice");
    assert!(issued.windows(2).all(|w| w[1] == w[0] + 1));
}
