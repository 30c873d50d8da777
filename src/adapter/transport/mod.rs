mod delivery;

pub use delivery::*;

use crate::{
    domain::{EventEnvelope, MessageId, TransportError},
    port::{Delivery, EventConsumer, PreparedPublication, Resolution, ResolutionChecker, Transport},
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

/// Delivery and recovery policy of the in-memory transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Delivery attempts per message before dead-lettering.
    pub max_delivery_attempts: u32,
    /// Pause between redelivery attempts of one message.
    pub redelivery_delay: Duration,
    /// How long a prepared publication may stay unresolved before the
    /// recovery sweep consults the resolution checker.
    pub recovery_grace: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_delivery_attempts: 5,
            redelivery_delay: Duration::from_millis(100),
            recovery_grace: Duration::from_secs(5),
        }
    }
}

/// Phase of a prepared publication as the transport sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicationPhase {
    Open,
    Committed,
    RolledBack,
}

struct PreparedEntry {
    envelope: EventEnvelope,
    phase: PublicationPhase,
    staged_at: Instant,
}

/// In-memory transport with the three properties the outbox design needs:
/// at-least-once delivery, FIFO within an ordering key (one DeliveryActor
/// per key), and prepared publications with commit/rollback plus a
/// resolution sweep for the ones whose instruction got lost. Delayed
/// visibility rides on the tokio timer.
///
/// Resolved publications keep their entry (with final phase) so tests and
/// operators can inspect what happened to a token.
#[derive(Clone)]
pub struct MemoryTransport {
    config: TransportConfig,
    prepared: Arc<Mutex<HashMap<u64, PreparedEntry>>>,
    token_counter: Arc<AtomicU64>,
    message_counter: Arc<AtomicU64>,
    namespace: String,
    consumer: Arc<RwLock<Option<Arc<dyn EventConsumer>>>>,
    checker: Arc<RwLock<Option<Arc<dyn ResolutionChecker>>>>,
    registry: DeliveryRegistry,
}

impl MemoryTransport {
    pub fn new(config: TransportConfig) -> Self {
        let raw = uuid::Uuid::new_v4().simple().to_string();
        Self::with_namespace(config, format!("mem-{}", &raw[..8]))
    }

    /// Create a transport whose delivery actors are named under `namespace`.
    /// Ractor's actor registry is process-global, so concurrently running
    /// transports need distinct namespaces.
    pub fn with_namespace(config: TransportConfig, namespace: String) -> Self {
        let registry = DeliveryRegistry::new(
            namespace.clone(),
            config.max_delivery_attempts,
            config.redelivery_delay,
        );

        Self {
            config,
            prepared: Arc::new(Mutex::new(HashMap::new())),
            token_counter: Arc::new(AtomicU64::new(0)),
            message_counter: Arc::new(AtomicU64::new(0)),
            namespace,
            consumer: Arc::new(RwLock::new(None)),
            checker: Arc::new(RwLock::new(None)),
            registry,
        }
    }

    /// Register the single logical consumer. Deliveries issued before a
    /// consumer is subscribed fail the publish call.
    pub fn subscribe(&self, consumer: Arc<dyn EventConsumer>) {
        *self.consumer.write().unwrap() = Some(consumer);
    }

    /// Register the resolution checker consulted by the recovery sweep.
    pub fn set_resolution_checker(&self, checker: Arc<dyn ResolutionChecker>) {
        *self.checker.write().unwrap() = Some(checker);
    }

    fn next_message_id(&self) -> MessageId {
        let n = self.message_counter.fetch_add(1, Ordering::SeqCst) + 1;
        MessageId::new(format!("{}-msg-{}", self.namespace, n))
    }

    fn subscribed_consumer(&self) -> Result<Arc<dyn EventConsumer>, TransportError> {
        self.consumer
            .read()
            .unwrap()
            .clone()
            .ok_or_else(|| TransportError::Publish("no consumer subscribed".to_string()))
    }

    async fn deliver(
        &self,
        envelope: EventEnvelope,
        message_id: MessageId,
    ) -> Result<(), TransportError> {
        let consumer = self.subscribed_consumer()?;
        let delivery = Delivery {
            message_id,
            envelope,
            attempt: 1,
        };
        self.registry.deliver(delivery, consumer).await
    }

    /// Resolve prepared publications that have been open longer than the
    /// grace period by asking the resolution checker. Returns how many
    /// publications were resolved.
    ///
    /// Safe to run repeatedly and concurrently: each entry is re-checked
    /// under the lock before its phase flips, and the checker itself is
    /// required to be idempotent.
    pub async fn resolve_pending(&self) -> Result<usize, TransportError> {
        let checker = match self.checker.read().unwrap().clone() {
            Some(checker) => checker,
            None => {
                tracing::warn!("recovery sweep ran without a resolution checker");
                return Ok(0);
            }
        };

        let due: Vec<(u64, HashMap<String, String>)> = {
            let prepared = self.prepared.lock().unwrap();
            prepared
                .iter()
                .filter(|(_, entry)| {
                    entry.phase == PublicationPhase::Open
                        && entry.staged_at.elapsed() >= self.config.recovery_grace
                })
                .map(|(token, entry)| (*token, entry.envelope.properties.clone()))
                .collect()
        };

        let mut resolved = 0;
        for (token, properties) in due {
            let resolution = match checker.check(&properties).await {
                Ok(resolution) => resolution,
                Err(e) => {
                    // Leave the entry open; the next sweep asks again
                    tracing::warn!("resolution deferred for publication {}: {}", token, e);
                    continue;
                }
            };

            match resolution {
                Resolution::Rollback => {
                    // Re-check under the lock: the primary instruction may
                    // have arrived while the checker ran
                    {
                        let mut prepared = self.prepared.lock().unwrap();
                        match prepared.get_mut(&token) {
                            Some(entry) if entry.phase == PublicationPhase::Open => {
                                entry.phase = PublicationPhase::RolledBack;
                            }
                            _ => continue,
                        }
                    }
                    tracing::info!("recovery rolled back prepared publication {}", token);
                }
                Resolution::Commit => {
                    let envelope = {
                        let prepared = self.prepared.lock().unwrap();
                        match prepared.get(&token) {
                            Some(entry) if entry.phase == PublicationPhase::Open => {
                                entry.envelope.clone()
                            }
                            _ => continue,
                        }
                    };

                    // Enqueue before flipping the phase; a failed delivery
                    // leaves the entry Open for the next sweep
                    let message_id = self.next_message_id();
                    if let Err(e) = self.deliver(envelope, message_id).await {
                        tracing::warn!(
                            "recovery delivery for publication {} failed: {}",
                            token,
                            e
                        );
                        continue;
                    }

                    {
                        let mut prepared = self.prepared.lock().unwrap();
                        if let Some(entry) = prepared.get_mut(&token) {
                            if entry.phase == PublicationPhase::Open {
                                entry.phase = PublicationPhase::Committed;
                            }
                        }
                    }
                    tracing::info!("recovery committed prepared publication {}", token);
                }
            }
            resolved += 1;
        }

        Ok(resolved)
    }

    /// Spawn a background loop invoking `resolve_pending` every `interval`.
    pub fn spawn_recovery_sweeper(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let transport = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = transport.resolve_pending().await {
                    tracing::error!("recovery sweep failed: {}", e);
                }
            }
        })
    }

    pub fn publication_phase(&self, token: u64) -> Option<PublicationPhase> {
        self.prepared.lock().unwrap().get(&token).map(|e| e.phase)
    }

    pub fn open_publications(&self) -> usize {
        self.prepared
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.phase == PublicationPhase::Open)
            .count()
    }

    pub fn dead_letters(&self) -> Vec<Delivery> {
        self.registry.dead_letters()
    }

    /// Stop all delivery actors spawned by this transport.
    pub fn shutdown(&self) {
        self.registry.shutdown_all();
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn prepare_publish(
        &self,
        envelope: EventEnvelope,
    ) -> Result<PreparedPublication, TransportError> {
        let token = self.token_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let ordering_key = envelope.ordering_key.clone();

        self.prepared.lock().unwrap().insert(
            token,
            PreparedEntry {
                envelope,
                phase: PublicationPhase::Open,
                staged_at: Instant::now(),
            },
        );

        tracing::debug!("staged prepared publication {} for {}", token, ordering_key);

        Ok(PreparedPublication {
            token,
            ordering_key,
        })
    }

    async fn commit(&self, prepared: PreparedPublication) -> Result<(), TransportError> {
        let envelope = {
            let entries = self.prepared.lock().unwrap();
            match entries.get(&prepared.token) {
                None => {
                    return Err(TransportError::Commit(format!(
                        "unknown publication {}",
                        prepared.token
                    )))
                }
                Some(entry) if entry.phase != PublicationPhase::Open => {
                    return Err(TransportError::Commit(format!(
                        "publication {} already resolved",
                        prepared.token
                    )))
                }
                Some(entry) => entry.envelope.clone(),
            }
        };

        // Deliver first; the phase flips only once the message is enqueued,
        // so a failed delivery leaves the entry Open for the recovery sweep
        let message_id = self.next_message_id();
        self.deliver(envelope, message_id).await?;

        let mut entries = self.prepared.lock().unwrap();
        if let Some(entry) = entries.get_mut(&prepared.token) {
            if entry.phase == PublicationPhase::Open {
                entry.phase = PublicationPhase::Committed;
            }
        }
        Ok(())
    }

    async fn rollback(&self, prepared: PreparedPublication) -> Result<(), TransportError> {
        let mut entries = self.prepared.lock().unwrap();
        match entries.get_mut(&prepared.token) {
            None => Err(TransportError::Rollback(format!(
                "unknown publication {}",
                prepared.token
            ))),
            Some(entry) if entry.phase != PublicationPhase::Open => {
                Err(TransportError::Rollback(format!(
                    "publication {} already resolved",
                    prepared.token
                )))
            }
            Some(entry) => {
                entry.phase = PublicationPhase::RolledBack;
                Ok(())
            }
        }
    }

    async fn publish(&self, envelope: EventEnvelope) -> Result<MessageId, TransportError> {
        let message_id = self.next_message_id();
        self.deliver(envelope, message_id.clone()).await?;
        Ok(message_id)
    }

    async fn publish_delayed(&self, envelope: EventEnvelope) -> Result<MessageId, TransportError> {
        let visible_at = envelope.visible_at.ok_or_else(|| {
            TransportError::Publish("delayed publish requires visible_at".to_string())
        })?;

        let message_id = self.next_message_id();
        let delay = (visible_at - chrono::Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);

        let transport = self.clone();
        let delayed_id = message_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            // Same bounded treatment as consumed messages: a delivery that
            // cannot even be enqueued is retried, then dead-lettered
            let mut attempt = 0;
            loop {
                attempt += 1;
                match transport
                    .deliver(envelope.clone(), delayed_id.clone())
                    .await
                {
                    Ok(()) => break,
                    Err(e) if attempt < transport.config.max_delivery_attempts => {
                        tracing::warn!(
                            "delayed delivery of {} failed on attempt {}: {}",
                            delayed_id,
                            attempt,
                            e
                        );
                        tokio::time::sleep(transport.config.redelivery_delay).await;
                    }
                    Err(e) => {
                        tracing::error!(
                            "delayed delivery of {} dead-lettered after {} attempts: {}",
                            delayed_id,
                            attempt,
                            e
                        );
                        transport.registry.dead_letter(Delivery {
                            message_id: delayed_id,
                            envelope,
                            attempt,
                        });
                        break;
                    }
                }
            }
        });

        Ok(message_id)
    }
}
