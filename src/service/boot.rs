use crate::adapter::{
    CoordinatorConfig, ExpirationScheduler, IdempotencyGuard, MemoryStore, MemoryTransport,
    OrderDispatcher, OrderExistenceChecker, OrderLifecycle, OutboxCoordinator, TransportConfig,
};
use std::sync::Arc;
use std::time::Duration;

/// All tunables of a running system, owned by the composition root and
/// threaded into constructors explicitly.
#[derive(Debug, Clone)]
pub struct SystemConfig {
    /// Delay before an unpaid order is closed by the scheduled Close event.
    pub close_delay: Duration,
    pub coordinator: CoordinatorConfig,
    pub transport: TransportConfig,
    /// Cadence of the recovery sweep over unresolved prepared
    /// publications; None disables the background sweeper (tests drive
    /// `resolve_pending` by hand).
    pub recovery_interval: Option<Duration>,
    /// Namespace for delivery actor names; None picks a random one.
    pub namespace: Option<String>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            close_delay: Duration::from_secs(30),
            coordinator: CoordinatorConfig::default(),
            transport: TransportConfig::default(),
            recovery_interval: Some(Duration::from_secs(2)),
            namespace: None,
        }
    }
}

/// The wired system. The concrete adapters stay reachable so callers (demo,
/// tests) can inspect the store and drive the transport directly.
pub struct OrderSystem {
    pub coordinator: Arc<OutboxCoordinator>,
    pub store: Arc<MemoryStore>,
    pub transport: Arc<MemoryTransport>,
}

impl OrderSystem {
    /// Stop delivery actors. Outstanding deliveries already cast are
    /// processed first; this only prevents new spawns from lingering.
    pub fn shutdown(&self) {
        self.transport.shutdown();
    }
}

/// Explicit composition root: construct every component with its
/// collaborators and wire the consumer and the resolution checker before
/// any event can flow.
pub async fn boot(config: SystemConfig) -> OrderSystem {
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(match config.namespace {
        Some(namespace) => MemoryTransport::with_namespace(config.transport, namespace),
        None => MemoryTransport::new(config.transport),
    });

    let lifecycle = Arc::new(OrderLifecycle::new(store.clone()));
    let guard = Arc::new(IdempotencyGuard::new(store.clone()));
    let dispatcher = Arc::new(OrderDispatcher::new(lifecycle, guard));
    transport.subscribe(dispatcher);

    transport.set_resolution_checker(Arc::new(OrderExistenceChecker::new(store.clone())));
    if let Some(interval) = config.recovery_interval {
        transport.spawn_recovery_sweeper(interval);
    }

    let scheduler = Arc::new(ExpirationScheduler::new(
        transport.clone(),
        config.close_delay,
        config.coordinator.publish_retries,
        config.coordinator.retry_backoff,
    ));
    let coordinator = Arc::new(OutboxCoordinator::new(
        store.clone(),
        transport.clone(),
        scheduler,
        config.coordinator,
    ));

    tracing::info!("order system initialized");

    OrderSystem {
        coordinator,
        store,
        transport,
    }
}
