use crate::{
    domain::{DedupKey, DedupRecord, MessageId, OrderError, StoreError},
    port::OrderStore,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// At-most-once execution of a side effect per logical message.
///
/// A per-key async gate couples the guarded action with its dedup-record
/// insert, standing in for the single local transaction a relational
/// backend would wrap around both. The store's unique insert remains the
/// cross-process backstop: losing that race is the normal
/// "already processed" outcome, not an error.
pub struct IdempotencyGuard {
    store: Arc<dyn OrderStore>,
    // One gate per dedup key; like the dedup log itself, entries are never
    // removed
    gates: std::sync::Mutex<HashMap<DedupKey, Arc<AsyncMutex<()>>>>,
}

impl IdempotencyGuard {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self {
            store,
            gates: std::sync::Mutex::new(HashMap::new()),
        }
    }

    fn gate_for(&self, key: &DedupKey) -> Arc<AsyncMutex<()>> {
        let mut gates = self.gates.lock().unwrap();
        gates.entry(key.clone()).or_default().clone()
    }

    /// Run `action` iff no dedup record exists for `key`, then insert the
    /// record. Returns true iff this call performed the action.
    pub async fn process_once<F, Fut>(
        &self,
        key: DedupKey,
        message_id: MessageId,
        action: F,
    ) -> Result<bool, OrderError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), OrderError>> + Send,
    {
        let gate = self.gate_for(&key);
        let _held = gate.lock().await;

        if self.store.find_dedup(&key).await?.is_some() {
            tracing::debug!("skipping {}: already processed", key);
            return Ok(false);
        }

        action().await?;

        match self
            .store
            .insert_dedup(DedupRecord::success(key.clone(), message_id))
            .await
        {
            Ok(()) => Ok(true),
            Err(StoreError::Conflict(_)) => {
                // Another writer recorded the key first (different process,
                // same logical message); treat our invocation as skipped
                tracing::debug!("lost dedup insert race for {}", key);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}
