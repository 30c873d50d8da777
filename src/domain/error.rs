use crate::domain::OrderId;
use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;

/// Failures of the durable store. Constraint violations are distinguished
/// from transient unavailability: a unique-key Conflict during id allocation
/// is retried with a fresh key, a dedup Conflict is a normal
/// already-processed outcome.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error("row not found: {0}")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the message transport. Retried with bounded backoff by the
/// caller; surfaced to the requester if retries exhaust.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("prepare failed: {0}")]
    Prepare(String),
    #[error("commit failed: {0}")]
    Commit(String),
    #[error("rollback failed: {0}")]
    Rollback(String),
    #[error("publish failed: {0}")]
    Publish(String),
    #[error("transport call timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Error, Debug)]
pub enum OrderError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Unparseable body or a wire tag disagreeing with the body. The
    /// delivery is acknowledged as failed, triggering redelivery and
    /// eventually dead-lettering.
    #[error("malformed event: {0}")]
    MalformedEvent(String),
    /// The event arrived before the local mutation that creates the order
    /// became visible. Retryable: at-least-once redelivery tries again
    /// until the row exists.
    #[error("order {0} not visible yet")]
    NotYetVisible(OrderId),
    #[error("invalid amount: {0} (must be non-negative)")]
    InvalidAmount(Decimal),
}
