use crate::{
    domain::{Close, EventEnvelope, OrderError, OrderEvent, OrderId},
    port::Transport,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Schedules the timeout-driven compensating transition.
///
/// The transport's delayed-visibility primitive is the timer: a Close
/// event under the order's own ordering key becomes visible after the
/// configured delay. There is no cancellation when the order gets paid;
/// the lifecycle machine renders the stale close harmless on arrival.
pub struct ExpirationScheduler {
    transport: Arc<dyn Transport>,
    close_delay: Duration,
    publish_retries: u32,
    retry_backoff: Duration,
}

impl ExpirationScheduler {
    pub fn new(
        transport: Arc<dyn Transport>,
        close_delay: Duration,
        publish_retries: u32,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            transport,
            close_delay,
            publish_retries,
            retry_backoff,
        }
    }

    /// Schedule a Close instruction for `order_id`, visible after the close
    /// delay. Runs as a follow-up step outside the outbox protocol.
    pub async fn schedule_close(&self, order_id: &OrderId) -> Result<(), OrderError> {
        let event = OrderEvent::Close(Close {
            order_id: order_id.clone(),
        });
        let visible_at = Utc::now() + self.close_delay;
        let envelope = EventEnvelope::delayed(&event, visible_at)?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.transport.publish_delayed(envelope.clone()).await {
                Ok(message_id) => {
                    tracing::debug!(
                        "scheduled close for order {} at {} ({})",
                        order_id,
                        visible_at,
                        message_id
                    );
                    return Ok(());
                }
                Err(e) if attempt < self.publish_retries => {
                    tracing::warn!(
                        "close scheduling for {} failed on attempt {}: {}",
                        order_id,
                        attempt,
                        e
                    );
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
