use crate::domain::{
    EventKind, OrderError, OrderEvent, FIFO_TOPIC, PROP_ORDER_ID, TXN_TOPIC,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Wire-level event envelope, transport agnostic.
///
/// The kind tag rides next to the serialized body instead of being spliced
/// into a delimited string, so producer and consumer cannot disagree on a
/// separator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub topic: String,
    /// Events sharing this key are delivered FIFO to a single logical
    /// consumer; different keys may be delivered in parallel.
    pub ordering_key: String,
    pub kind: EventKind,
    pub body: Vec<u8>,
    pub properties: HashMap<String, String>,
    /// When set, the event becomes visible to consumers only after this
    /// instant (delayed delivery).
    pub visible_at: Option<DateTime<Utc>>,
}

impl EventEnvelope {
    fn encode(topic: &str, event: &OrderEvent) -> Result<Self, OrderError> {
        let body = serde_json::to_vec(event)
            .map_err(|e| OrderError::MalformedEvent(format!("encode failed: {}", e)))?;
        Ok(Self {
            topic: topic.to_string(),
            ordering_key: event.order_id().to_string(),
            kind: event.kind(),
            body,
            properties: HashMap::new(),
            visible_at: None,
        })
    }

    /// Envelope for an ordinary FIFO lifecycle event.
    pub fn fifo(event: &OrderEvent) -> Result<Self, OrderError> {
        Self::encode(FIFO_TOPIC, event)
    }

    /// Envelope for the prepared "created" publication. Carries the order id
    /// as a property so the resolution checker can answer commit-or-rollback
    /// without parsing the body.
    pub fn transactional(event: &OrderEvent) -> Result<Self, OrderError> {
        let mut envelope = Self::encode(TXN_TOPIC, event)?;
        envelope
            .properties
            .insert(PROP_ORDER_ID.to_string(), event.order_id().to_string());
        Ok(envelope)
    }

    /// Envelope for a delayed FIFO event, visible from `visible_at`.
    pub fn delayed(event: &OrderEvent, visible_at: DateTime<Utc>) -> Result<Self, OrderError> {
        let mut envelope = Self::encode(FIFO_TOPIC, event)?;
        envelope.visible_at = Some(visible_at);
        Ok(envelope)
    }

    /// Decode the body back into a domain event, verifying that the wire tag
    /// and the body agree.
    pub fn decode(&self) -> Result<OrderEvent, OrderError> {
        let event: OrderEvent = serde_json::from_slice(&self.body)
            .map_err(|e| OrderError::MalformedEvent(format!("unparseable body: {}", e)))?;
        if event.kind() != self.kind {
            return Err(OrderError::MalformedEvent(format!(
                "envelope tagged {} but body decodes to {}",
                self.kind,
                event.kind()
            )));
        }
        Ok(event)
    }
}
