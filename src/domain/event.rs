use crate::domain::OrderId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Topic carrying prepared ("half message") publications for order creation.
pub const TXN_TOPIC: &str = "orders-txn";
/// Topic carrying FIFO lifecycle events (paid, shipped, close).
pub const FIFO_TOPIC: &str = "orders-fifo";
/// Envelope property holding the order id, read back by the resolution
/// checker when a prepared publication is left unresolved.
pub const PROP_ORDER_ID: &str = "OrderId";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
/// Everything that can happen to an order, as it travels on the wire.
///
/// Created is produced by the outbox coordinator under the prepared-publish
/// protocol; Paid and Shipped are requested by callers; Close is scheduled
/// at creation time with delayed visibility and compensates orders that
/// never got paid.
pub enum OrderEvent {
    Created(Created),
    Paid(Paid),
    Shipped(Shipped),
    Close(Close),
}

impl OrderEvent {
    pub fn order_id(&self) -> &OrderId {
        match self {
            OrderEvent::Created(e) => &e.order_id,
            OrderEvent::Paid(e) => &e.order_id,
            OrderEvent::Shipped(e) => &e.order_id,
            OrderEvent::Close(e) => &e.order_id,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            OrderEvent::Created(_) => EventKind::Created,
            OrderEvent::Paid(_) => EventKind::Paid,
            OrderEvent::Shipped(_) => EventKind::Shipped,
            OrderEvent::Close(_) => EventKind::Close,
        }
    }
}

/// Wire-level tag of an event. Carried on the envelope next to the body so
/// consumers can route without parsing the payload first.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Created,
    Paid,
    Shipped,
    Close,
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventKind::Created => "CREATED",
            EventKind::Paid => "PAID",
            EventKind::Shipped => "SHIPPED",
            EventKind::Close => "CLOSE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Created {
    pub order_id: OrderId,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paid {
    pub order_id: OrderId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipped {
    pub order_id: OrderId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Close {
    pub order_id: OrderId,
}
