use crate::{
    adapter::ExpirationScheduler,
    domain::{
        Created, EventEnvelope, NewOrder, OrderError, OrderEvent, OrderId, Paid, Shipped,
        StoreError, TransportError, PROP_ORDER_ID,
    },
    port::{OrderStore, PreparedPublication, Resolution, ResolutionChecker, Transport},
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Timeouts and retry bounds for the creation protocol.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Bound on each blocking call to an external collaborator (prepare,
    /// local insert, commit).
    pub op_timeout: Duration,
    /// How many fresh order ids to try when the insert hits a unique-key
    /// conflict.
    pub max_id_retries: u32,
    /// Publish attempts for pay/ship events before surfacing the failure.
    pub publish_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            op_timeout: Duration::from_secs(2),
            max_id_retries: 3,
            publish_retries: 3,
            retry_backoff: Duration::from_millis(50),
        }
    }
}

/// Couples the local order insert with the transport's prepared publish,
/// so the row and the externally visible "created" event are never
/// permanently inconsistent.
///
/// Protocol per creation: stage the half message, run the local mutation,
/// then commit (or roll back) the publication. The prepared handle is
/// returned by the prepare step and threaded through the rest of the
/// operation explicitly; nothing is parked in ambient storage, so
/// concurrent creations cannot interfere.
pub struct OutboxCoordinator {
    store: Arc<dyn OrderStore>,
    transport: Arc<dyn Transport>,
    scheduler: Arc<ExpirationScheduler>,
    config: CoordinatorConfig,
}

impl OutboxCoordinator {
    pub fn new(
        store: Arc<dyn OrderStore>,
        transport: Arc<dyn Transport>,
        scheduler: Arc<ExpirationScheduler>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            store,
            transport,
            scheduler,
            config,
        }
    }

    /// Create an order and make exactly one "created" event visible to
    /// consumers.
    ///
    /// Fails with `TransportError` if the prepare step cannot be issued and
    /// with `StoreError` if the local mutation cannot be committed. A failed
    /// or lost commit instruction is non-fatal: the resolution checker heals
    /// it from durable state.
    pub async fn create_order(&self, amount: Decimal) -> Result<OrderId, OrderError> {
        if amount < Decimal::ZERO {
            return Err(OrderError::InvalidAmount(amount));
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let order_id = OrderId::generate();
            let event = OrderEvent::Created(Created {
                order_id: order_id.clone(),
                amount,
            });
            let envelope = EventEnvelope::transactional(&event)?;

            // 1) Stage the half message. Timeout here aborts the operation
            //    before any local mutation.
            let prepared = match tokio::time::timeout(
                self.config.op_timeout,
                self.transport.prepare_publish(envelope),
            )
            .await
            {
                Ok(result) => result?,
                Err(_) => return Err(TransportError::Timeout(self.config.op_timeout).into()),
            };

            // 2) Local atomic mutation: insert the row with status Created
            let insert = tokio::time::timeout(
                self.config.op_timeout,
                self.store.insert_order(NewOrder {
                    order_id: order_id.clone(),
                    amount,
                }),
            )
            .await;

            match insert {
                Ok(Ok(())) => {
                    // 3) Commit the publication. Failure or timeout never
                    //    rolls back the completed local mutation.
                    match tokio::time::timeout(
                        self.config.op_timeout,
                        self.transport.commit(prepared),
                    )
                    .await
                    {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => tracing::warn!(
                            "commit instruction for order {} failed: {} (recovery will resolve)",
                            order_id,
                            e
                        ),
                        Err(_) => tracing::warn!(
                            "commit instruction for order {} timed out (recovery will resolve)",
                            order_id
                        ),
                    }

                    self.scheduler.schedule_close(&order_id).await?;

                    tracing::info!("order {} created (amount {})", order_id, amount);
                    return Ok(order_id);
                }
                Ok(Err(StoreError::Conflict(msg))) => {
                    // Id collision: discard the staged publication and try
                    // again with a fresh id
                    self.rollback_best_effort(prepared, &order_id).await;
                    if attempt < self.config.max_id_retries {
                        tracing::warn!("order id collision on {}, retrying", order_id);
                        continue;
                    }
                    return Err(StoreError::Conflict(msg).into());
                }
                Ok(Err(e)) => {
                    self.rollback_best_effort(prepared, &order_id).await;
                    return Err(e.into());
                }
                Err(_) => {
                    // Outcome of the insert is unknown; roll back is best
                    // effort and recovery re-derives the truth from the row
                    self.rollback_best_effort(prepared, &order_id).await;
                    return Err(StoreError::Unavailable(format!(
                        "order insert timed out after {:?}",
                        self.config.op_timeout
                    ))
                    .into());
                }
            }
        }
    }

    async fn rollback_best_effort(&self, prepared: PreparedPublication, order_id: &OrderId) {
        let token = prepared.token;
        match tokio::time::timeout(self.config.op_timeout, self.transport.rollback(prepared)).await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(
                "rollback of publication {} for {} failed: {} (recovery will resolve)",
                token,
                order_id,
                e
            ),
            Err(_) => tracing::warn!(
                "rollback of publication {} for {} timed out (recovery will resolve)",
                token,
                order_id
            ),
        }
    }

    /// Request payment of an order. Asynchronous: the status changes when
    /// the Paid event is dispatched, not when this returns.
    pub async fn pay(&self, order_id: &OrderId) -> Result<(), OrderError> {
        let event = OrderEvent::Paid(Paid {
            order_id: order_id.clone(),
        });
        self.publish_with_retry(EventEnvelope::fifo(&event)?).await
    }

    /// Request shipment of an order. Asynchronous, like `pay`.
    pub async fn ship(&self, order_id: &OrderId) -> Result<(), OrderError> {
        let event = OrderEvent::Shipped(Shipped {
            order_id: order_id.clone(),
        });
        self.publish_with_retry(EventEnvelope::fifo(&event)?).await
    }

    async fn publish_with_retry(&self, envelope: EventEnvelope) -> Result<(), OrderError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.transport.publish(envelope.clone()).await {
                Ok(_) => return Ok(()),
                Err(e) if attempt < self.config.publish_retries => {
                    tracing::warn!(
                        "publish of {} for {} failed on attempt {}: {}",
                        envelope.kind,
                        envelope.ordering_key,
                        attempt,
                        e
                    );
                    tokio::time::sleep(self.config.retry_backoff * attempt).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Resolution checker answering commit-or-rollback for a prepared
/// "created" publication from the only durable truth there is: does the
/// order row exist?
pub struct OrderExistenceChecker {
    store: Arc<dyn OrderStore>,
}

impl OrderExistenceChecker {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ResolutionChecker for OrderExistenceChecker {
    async fn check(
        &self,
        properties: &HashMap<String, String>,
    ) -> Result<Resolution, StoreError> {
        let order_id = match properties.get(PROP_ORDER_ID) {
            Some(order_id) => OrderId::new(order_id.clone()),
            None => {
                // A created publication without the property can never be
                // tied back to a row; discarding it is the safe answer
                tracing::warn!("prepared publication without {} property", PROP_ORDER_ID);
                return Ok(Resolution::Rollback);
            }
        };

        if self.store.exists_order(&order_id).await? {
            Ok(Resolution::Commit)
        } else {
            Ok(Resolution::Rollback)
        }
    }
}
