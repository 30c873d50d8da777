use crate::domain::{DedupKey, DedupRecord, NewOrder, Order, OrderId, OrderStatus, StoreError};
use async_trait::async_trait;

/// Outcome of a conditional status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    /// The row matched the expected status and was advanced.
    Applied,
    /// The row exists but is not in the expected status; the transition is
    /// a silent no-op, never an error.
    Stale,
    /// No row for this order id (yet).
    NotFound,
}

/// OrderStore is the ACID-capable row store for orders and the dedup log.
///
/// Its unique constraints (order id, dedup key) are the only mutual
/// exclusion primitive this design requires. Implementations back it with
/// a relational database in production; the in-memory adapter serves tests
/// and the demo.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a new order with status Created, stamping timestamps.
    /// Fails with `StoreError::Conflict` if the order id already exists.
    async fn insert_order(&self, order: NewOrder) -> Result<(), StoreError>;

    async fn find_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError>;

    /// Existence check used by the resolution checker during recovery.
    /// Must be a plain query over durable state, nothing else.
    async fn exists_order(&self, order_id: &OrderId) -> Result<bool, StoreError>;

    /// Compare-and-set status transition: advance to `next` only when the
    /// current status is exactly `expected`. Bumps `updated_at` on success.
    async fn update_status(
        &self,
        order_id: &OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<StatusUpdate, StoreError>;

    /// Insert a dedup record. Fails with `StoreError::Conflict` if a record
    /// for the key already exists; the conflict is the signal that the
    /// action has already run.
    async fn insert_dedup(&self, record: DedupRecord) -> Result<(), StoreError>;

    async fn find_dedup(&self, key: &DedupKey) -> Result<Option<DedupRecord>, StoreError>;
}
