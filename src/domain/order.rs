use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Business key of an order. Opaque, globally unique, assigned once at
/// creation and never reused.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(identifier: String) -> Self {
        Self(identifier)
    }

    /// Allocate a fresh order id. Collisions are possible in principle;
    /// the store's unique constraint is the authority and the coordinator
    /// retries with a fresh id on conflict.
    pub fn generate() -> Self {
        let raw = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("order-{}", &raw[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Created,
    Paid,
    Shipped,
    Closed,
}

impl OrderStatus {
    /// Shipped and Closed admit no further transition; Paid only admits
    /// Shipped. Only Created has two successors (Paid or Closed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Shipped | OrderStatus::Closed)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::Paid => "PAID",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Closed => "CLOSED",
        };
        f.write_str(s)
    }
}

/// A persisted order row. Timestamps are assigned by the store, never by
/// callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub amount: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert form of an order. Status is always Created on insert; the store
/// stamps the timestamps.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub amount: Decimal,
}
