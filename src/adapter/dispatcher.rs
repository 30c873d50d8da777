use crate::{
    adapter::{IdempotencyGuard, OrderLifecycle},
    domain::{DedupKey, OrderError, OrderEvent},
    port::{Delivery, EventConsumer},
};
use async_trait::async_trait;
use std::sync::Arc;

/// Routes delivered events into the lifecycle machine, wrapping every
/// dispatch in the idempotency guard.
///
/// Ordering within one order is a latency optimization supplied by the
/// transport; correctness is carried entirely by the monotonic transition
/// guards plus the dedup guard, so duplicates and out-of-order stragglers
/// land harmlessly here.
pub struct OrderDispatcher {
    lifecycle: Arc<OrderLifecycle>,
    guard: Arc<IdempotencyGuard>,
}

impl OrderDispatcher {
    pub fn new(lifecycle: Arc<OrderLifecycle>, guard: Arc<IdempotencyGuard>) -> Self {
        Self { lifecycle, guard }
    }
}

#[async_trait]
impl EventConsumer for OrderDispatcher {
    async fn consume(&self, delivery: Delivery) -> Result<(), OrderError> {
        // Malformed bodies and tag/body mismatches are acknowledged as
        // failed (Err), not silently dropped; the transport redelivers and
        // eventually dead-letters
        let event = delivery.envelope.decode()?;

        let key = DedupKey::new(event.order_id(), event.kind());
        let message_id = delivery.message_id.clone();

        match &event {
            OrderEvent::Created(created) => {
                let order_id = created.order_id.clone();
                self.guard
                    .process_once(key, message_id, || async move {
                        tracing::info!("order {} creation event observed", order_id);
                        Ok(())
                    })
                    .await?;
            }
            OrderEvent::Paid(paid) => {
                let lifecycle = self.lifecycle.clone();
                let order_id = paid.order_id.clone();
                self.guard
                    .process_once(key, message_id, || async move {
                        lifecycle.apply_paid(&order_id).await
                    })
                    .await?;
            }
            OrderEvent::Shipped(shipped) => {
                let lifecycle = self.lifecycle.clone();
                let order_id = shipped.order_id.clone();
                self.guard
                    .process_once(key, message_id, || async move {
                        lifecycle.apply_shipped(&order_id).await
                    })
                    .await?;
            }
            OrderEvent::Close(close) => {
                let lifecycle = self.lifecycle.clone();
                let order_id = close.order_id.clone();
                self.guard
                    .process_once(key, message_id, || async move {
                        lifecycle.apply_closed(&order_id).await
                    })
                    .await?;
            }
        }

        Ok(())
    }
}
