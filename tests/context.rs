/// Shared test utilities and helpers
use orderflow::{
    adapter::{
        CoordinatorConfig, ExpirationScheduler, IdempotencyGuard, MemoryStore, MemoryTransport,
        OrderDispatcher, OrderExistenceChecker, OrderLifecycle, OutboxCoordinator, TransportConfig,
    },
    domain::{EventKind, OrderError, OrderId, OrderStatus},
    port::{Delivery, EventConsumer, OrderStore},
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Consumer wrapper that records every delivery before forwarding it to
/// the dispatcher, so tests can assert on what actually reached the
/// consumer side (including redeliveries).
pub struct RecordingConsumer {
    inner: Arc<dyn EventConsumer>,
    seen: Mutex<Vec<(EventKind, String)>>,
}

impl RecordingConsumer {
    pub fn new(inner: Arc<dyn EventConsumer>) -> Self {
        Self {
            inner,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    pub fn count_for(&self, kind: EventKind, order_id: &OrderId) -> usize {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, key)| *k == kind && key == order_id.as_str())
            .count()
    }
}

#[async_trait]
impl EventConsumer for RecordingConsumer {
    async fn consume(&self, delivery: Delivery) -> Result<(), OrderError> {
        self.seen
            .lock()
            .unwrap()
            .push((delivery.envelope.kind, delivery.envelope.ordering_key.clone()));
        self.inner.consume(delivery).await
    }
}

/// Test context wiring the full stack by hand, with fast timings, a zero
/// recovery grace (sweeps resolve immediately when driven manually) and a
/// unique transport namespace per context for actor-name isolation.
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub transport: Arc<MemoryTransport>,
    pub coordinator: Arc<OutboxCoordinator>,
    pub guard: Arc<IdempotencyGuard>,
    pub lifecycle: Arc<OrderLifecycle>,
    pub recorder: Arc<RecordingConsumer>,
}

impl TestContext {
    pub fn close_delay() -> Duration {
        Duration::from_millis(300)
    }

    pub async fn new() -> Self {
        Self::with_store_and_delay(Arc::new(MemoryStore::new()), Self::close_delay()).await
    }

    pub async fn with_close_delay(close_delay: Duration) -> Self {
        Self::with_store_and_delay(Arc::new(MemoryStore::new()), close_delay).await
    }

    pub async fn with_store_and_delay(store: Arc<MemoryStore>, close_delay: Duration) -> Self {
        let raw = uuid::Uuid::new_v4().simple().to_string();
        let transport = Arc::new(MemoryTransport::with_namespace(
            TransportConfig {
                max_delivery_attempts: 4,
                redelivery_delay: Duration::from_millis(25),
                recovery_grace: Duration::ZERO,
            },
            format!("test-{}", &raw[..8]),
        ));

        let lifecycle = Arc::new(OrderLifecycle::new(store.clone() as Arc<dyn OrderStore>));
        let guard = Arc::new(IdempotencyGuard::new(store.clone() as Arc<dyn OrderStore>));
        let dispatcher = Arc::new(OrderDispatcher::new(lifecycle.clone(), guard.clone()));
        let recorder = Arc::new(RecordingConsumer::new(dispatcher));
        transport.subscribe(recorder.clone());
        transport.set_resolution_checker(Arc::new(OrderExistenceChecker::new(
            store.clone() as Arc<dyn OrderStore>
        )));

        let config = CoordinatorConfig {
            op_timeout: Duration::from_secs(1),
            max_id_retries: 3,
            publish_retries: 3,
            retry_backoff: Duration::from_millis(10),
        };
        let scheduler = Arc::new(ExpirationScheduler::new(
            transport.clone(),
            close_delay,
            config.publish_retries,
            config.retry_backoff,
        ));
        let coordinator = Arc::new(OutboxCoordinator::new(
            store.clone() as Arc<dyn OrderStore>,
            transport.clone(),
            scheduler,
            config,
        ));

        Self {
            store,
            transport,
            coordinator,
            guard,
            lifecycle,
            recorder,
        }
    }

    pub async fn create(&self, amount: Decimal) -> OrderId {
        self.coordinator.create_order(amount).await.unwrap()
    }

    pub async fn status(&self, order_id: &OrderId) -> Option<OrderStatus> {
        self.store
            .find_order(order_id)
            .await
            .unwrap()
            .map(|o| o.status)
    }

    /// Poll until the order reaches `expected` or two seconds pass.
    pub async fn wait_for_status(&self, order_id: &OrderId, expected: OrderStatus) -> bool {
        for _ in 0..200 {
            if self.status(order_id).await == Some(expected) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    /// Poll until `probe` returns true or two seconds pass.
    pub async fn wait_until<F>(&self, mut probe: F) -> bool
    where
        F: FnMut() -> bool,
    {
        for _ in 0..200 {
            if probe() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}
