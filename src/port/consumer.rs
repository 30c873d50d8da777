use crate::domain::{EventEnvelope, MessageId, OrderError};
use async_trait::async_trait;

/// One delivery attempt of an event to the consumer.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message_id: MessageId,
    pub envelope: EventEnvelope,
    /// 1-based attempt counter, bumped on each redelivery.
    pub attempt: u32,
}

/// Consumer callback invoked by the transport with at-least-once semantics
/// and FIFO ordering per ordering key.
///
/// Returning Err acknowledges the delivery as failed and triggers
/// redelivery; after the transport's attempt bound the delivery is
/// dead-lettered instead of looping forever.
#[async_trait]
pub trait EventConsumer: Send + Sync {
    async fn consume(&self, delivery: Delivery) -> Result<(), OrderError>;
}
