use crate::domain::{EventKind, OrderId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Logical identity of a message, derived by the consumer, not assigned by
/// the transport. Two deliveries of the same logical message share the key
/// even when their transport message ids differ.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct DedupKey(String);

impl DedupKey {
    pub fn new(order_id: &OrderId, kind: EventKind) -> Self {
        Self(format!("{}:{}", order_id, kind))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DedupKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transport-assigned message identifier. Informational only; correctness
/// rests on the DedupKey, never on this.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(identifier: String) -> Self {
        Self(identifier)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of the dedup log. Its existence means the guarded action for the
/// key has run; rows are inserted once and never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupRecord {
    pub dedup_key: DedupKey,
    pub message_id: MessageId,
    pub status: DedupStatus,
    pub processed_at: DateTime<Utc>,
}

impl DedupRecord {
    pub fn success(dedup_key: DedupKey, message_id: MessageId) -> Self {
        Self {
            dedup_key,
            message_id,
            status: DedupStatus::Success,
            processed_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DedupStatus {
    Success,
}
