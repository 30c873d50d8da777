use orderflow::{
    adapter::{IdempotencyGuard, MemoryStore},
    domain::{DedupKey, DedupRecord, EventKind, MessageId, OrderId},
    port::OrderStore,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn message_id(n: u32) -> MessageId {
    MessageId::new(format!("test-msg-{}", n))
}

#[tokio::test]
async fn action_runs_once_and_duplicates_are_skipped() {
    let store = Arc::new(MemoryStore::new());
    let guard = IdempotencyGuard::new(store.clone() as Arc<dyn OrderStore>);
    let key = DedupKey::new(&OrderId::generate(), EventKind::Paid);

    let calls = AtomicU32::new(0);

    let first = guard
        .process_once(key.clone(), message_id(1), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap();
    assert!(first);

    // Redelivery with a different transport message id, same logical key
    let second = guard
        .process_once(key.clone(), message_id(2), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap();
    assert!(!second);

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.dedup_count().await, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_calls_with_same_key_execute_exactly_once() {
    let store = Arc::new(MemoryStore::new());
    let guard = Arc::new(IdempotencyGuard::new(store.clone() as Arc<dyn OrderStore>));
    let key = DedupKey::new(&OrderId::generate(), EventKind::Paid);
    let calls = Arc::new(AtomicU32::new(0));

    let handles: Vec<_> = (0..16)
        .map(|n| {
            let guard = guard.clone();
            let key = key.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                guard
                    .process_once(key, message_id(n), move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut performed = 0;
    for handle in handles {
        if handle.await.unwrap() {
            performed += 1;
        }
    }

    assert_eq!(performed, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.dedup_count().await, 1);
}

#[tokio::test]
async fn preexisting_record_skips_without_invoking_action() {
    let store = Arc::new(MemoryStore::new());
    let key = DedupKey::new(&OrderId::generate(), EventKind::Shipped);
    store
        .insert_dedup(DedupRecord::success(key.clone(), message_id(1)))
        .await
        .unwrap();

    let guard = IdempotencyGuard::new(store.clone() as Arc<dyn OrderStore>);
    let calls = AtomicU32::new(0);

    let performed = guard
        .process_once(key, message_id(2), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap();

    assert!(!performed);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn distinct_keys_do_not_interfere() {
    let store = Arc::new(MemoryStore::new());
    let guard = IdempotencyGuard::new(store.clone() as Arc<dyn OrderStore>);
    let order_id = OrderId::generate();
    let calls = AtomicU32::new(0);

    for kind in [EventKind::Paid, EventKind::Shipped, EventKind::Close] {
        let performed = guard
            .process_once(DedupKey::new(&order_id, kind), message_id(0), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();
        assert!(performed);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(store.dedup_count().await, 3);
}

#[tokio::test]
async fn failed_action_leaves_no_record_so_redelivery_retries() {
    let store = Arc::new(MemoryStore::new());
    let guard = IdempotencyGuard::new(store.clone() as Arc<dyn OrderStore>);
    let key = DedupKey::new(&OrderId::generate(), EventKind::Paid);

    let result = guard
        .process_once(key.clone(), message_id(1), || async {
            Err(orderflow::domain::OrderError::MalformedEvent(
                "boom".to_string(),
            ))
        })
        .await;
    assert!(result.is_err());
    assert_eq!(store.dedup_count().await, 0);

    // The retry succeeds and records the key
    let performed = guard
        .process_once(key, message_id(2), || async { Ok(()) })
        .await
        .unwrap();
    assert!(performed);
    assert_eq!(store.dedup_count().await, 1);
}
