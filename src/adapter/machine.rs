use crate::{
    domain::{OrderError, OrderId, OrderStatus},
    port::{OrderStore, StatusUpdate},
};
use std::sync::Arc;

/// Pure state-transition logic over the order row.
///
/// Valid transitions: Created -> Paid -> Shipped, or Created -> Closed.
/// Anything else is a silent no-op, so replays and stale close
/// instructions are neutralized here rather than at the transport.
pub struct OrderLifecycle {
    store: Arc<dyn OrderStore>,
}

impl OrderLifecycle {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    async fn advance(
        &self,
        order_id: &OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<(), OrderError> {
        match self.store.update_status(order_id, expected, next).await? {
            StatusUpdate::Applied => {
                tracing::info!("order {} advanced {} -> {}", order_id, expected, next);
                Ok(())
            }
            StatusUpdate::Stale => {
                tracing::debug!(
                    "order {} ignored transition to {} (not in {})",
                    order_id,
                    next,
                    expected
                );
                Ok(())
            }
            // The event can outrun the local mutation that creates the row.
            // Reported as retryable so at-least-once redelivery tries again
            // once the order exists.
            StatusUpdate::NotFound => Err(OrderError::NotYetVisible(order_id.clone())),
        }
    }

    /// Created -> Paid; no-op from any other status.
    pub async fn apply_paid(&self, order_id: &OrderId) -> Result<(), OrderError> {
        self.advance(order_id, OrderStatus::Created, OrderStatus::Paid)
            .await
    }

    /// Paid -> Shipped; no-op from any other status. In particular a
    /// Shipped event arriving before Paid is rejected, not queued.
    pub async fn apply_shipped(&self, order_id: &OrderId) -> Result<(), OrderError> {
        self.advance(order_id, OrderStatus::Paid, OrderStatus::Shipped)
            .await
    }

    /// Created -> Closed; a paid or shipped order silently ignores the
    /// stale expiration.
    pub async fn apply_closed(&self, order_id: &OrderId) -> Result<(), OrderError> {
        self.advance(order_id, OrderStatus::Created, OrderStatus::Closed)
            .await
    }
}
