use crate::domain::{EventEnvelope, MessageId, StoreError, TransportError};
use async_trait::async_trait;
use std::collections::HashMap;

/// Handle to a prepared ("half message") publication.
///
/// Owned exclusively by the single create operation that issued the prepare
/// step, and threaded explicitly through that operation's call chain.
/// Commit and rollback consume it by value, so a handle can never be
/// resolved twice, and concurrent creations cannot clobber each other's
/// handle the way a pooled thread-local slot would.
#[derive(Debug)]
pub struct PreparedPublication {
    pub token: u64,
    pub ordering_key: String,
}

/// Answer of the resolution checker for an unresolved prepared publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Commit,
    Rollback,
}

/// Invoked by the transport when a prepared publication is still unresolved
/// after the grace period (the commit or rollback instruction was lost).
///
/// Must be a pure, idempotent function of durable local state: it is the
/// sole source of truth for the lost instruction and may be invoked
/// arbitrarily many times, concurrently, with the same answer. A store
/// error defers the decision to the next sweep; it never surfaces as an
/// ambiguous resolution.
#[async_trait]
pub trait ResolutionChecker: Send + Sync {
    async fn check(&self, properties: &HashMap<String, String>)
        -> Result<Resolution, StoreError>;
}

/// Transport is the asynchronous pub/sub collaborator.
///
/// The design requires three properties of it: at-least-once delivery,
/// strict FIFO within an ordering key, and the two-phase prepared publish
/// with an asynchronous resolution callback, plus delayed visibility.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Durably stage an envelope without making it visible to consumers.
    async fn prepare_publish(
        &self,
        envelope: EventEnvelope,
    ) -> Result<PreparedPublication, TransportError>;

    /// Make a prepared publication visible to consumers.
    async fn commit(&self, prepared: PreparedPublication) -> Result<(), TransportError>;

    /// Discard a prepared publication; no consumer ever observes it.
    async fn rollback(&self, prepared: PreparedPublication) -> Result<(), TransportError>;

    /// Publish an envelope for immediate delivery.
    async fn publish(&self, envelope: EventEnvelope) -> Result<MessageId, TransportError>;

    /// Publish an envelope that becomes visible at `envelope.visible_at`.
    /// Fails if the envelope carries no visibility instant.
    async fn publish_delayed(&self, envelope: EventEnvelope) -> Result<MessageId, TransportError>;
}
