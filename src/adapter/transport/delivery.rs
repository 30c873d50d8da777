use crate::{
    domain::TransportError,
    port::{Delivery, EventConsumer},
};
use async_trait::async_trait;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Messages that can be sent to a DeliveryActor
pub enum DeliveryActorMessage {
    Deliver(Delivery),
}

impl ractor::Message for DeliveryActorMessage {}

pub struct DeliveryActorArguments {
    pub ordering_key: String,
    pub consumer: Arc<dyn EventConsumer>,
    pub max_attempts: u32,
    pub redelivery_delay: Duration,
    pub dead_letters: Arc<Mutex<Vec<Delivery>>>,
}

pub struct DeliveryActorState {
    ordering_key: String,
    consumer: Arc<dyn EventConsumer>,
    max_attempts: u32,
    redelivery_delay: Duration,
    dead_letters: Arc<Mutex<Vec<Delivery>>>,
}

/// DeliveryActor drains one ordering key's queue sequentially.
///
/// Because redelivery happens inline in `handle`, a failing message blocks
/// its key until it is either consumed or dead-lettered, which is exactly
/// the FIFO-within-key contract. Other keys keep flowing on their own
/// actors.
pub struct DeliveryActor;

#[async_trait]
impl Actor for DeliveryActor {
    type Msg = DeliveryActorMessage;
    type State = DeliveryActorState;
    type Arguments = DeliveryActorArguments;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::debug!("delivery actor starting for key {}", args.ordering_key);

        Ok(DeliveryActorState {
            ordering_key: args.ordering_key,
            consumer: args.consumer,
            max_attempts: args.max_attempts,
            redelivery_delay: args.redelivery_delay,
            dead_letters: args.dead_letters,
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        let DeliveryActorMessage::Deliver(mut delivery) = message;

        loop {
            match state.consumer.consume(delivery.clone()).await {
                Ok(()) => {
                    tracing::debug!(
                        "key {} consumed {} (attempt {})",
                        state.ordering_key,
                        delivery.message_id,
                        delivery.attempt
                    );
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        "key {} failed {} on attempt {}: {}",
                        state.ordering_key,
                        delivery.message_id,
                        delivery.attempt,
                        e
                    );

                    if delivery.attempt >= state.max_attempts {
                        tracing::error!(
                            "key {} dead-lettering {} after {} attempts",
                            state.ordering_key,
                            delivery.message_id,
                            delivery.attempt
                        );
                        state.dead_letters.lock().unwrap().push(delivery);
                        break;
                    }

                    delivery.attempt += 1;
                    tokio::time::sleep(state.redelivery_delay).await;
                }
            }
        }

        Ok(())
    }
}

type DeliveryActorRef = ActorRef<DeliveryActorMessage>;

/// DeliveryRegistry spawns one named DeliveryActor per ordering key.
///
/// Lookup goes through ractor's global registry via ActorRef::where_is, so
/// a key's actor is a singleton even when two deliveries race to spawn it.
/// The namespace prefix keeps concurrently running transports (tests) from
/// colliding on actor names.
#[derive(Clone)]
pub struct DeliveryRegistry {
    namespace: String,
    max_attempts: u32,
    redelivery_delay: Duration,
    dead_letters: Arc<Mutex<Vec<Delivery>>>,
    /// Keys this transport has delivered to, for shutdown only, not for
    /// routing.
    active_keys: Arc<Mutex<HashSet<String>>>,
}

impl DeliveryRegistry {
    pub fn new(namespace: String, max_attempts: u32, redelivery_delay: Duration) -> Self {
        Self {
            namespace,
            max_attempts,
            redelivery_delay,
            dead_letters: Arc::new(Mutex::new(Vec::new())),
            active_keys: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn actor_name(&self, ordering_key: &str) -> String {
        format!("{}-delivery-{}", self.namespace, ordering_key)
    }

    async fn get_or_spawn(
        &self,
        ordering_key: &str,
        consumer: Arc<dyn EventConsumer>,
    ) -> Result<DeliveryActorRef, TransportError> {
        let actor_name = self.actor_name(ordering_key);

        // Fast path: the key already has its actor
        if let Some(actor_ref) = ActorRef::<DeliveryActorMessage>::where_is(actor_name.clone()) {
            return Ok(actor_ref);
        }

        let args = DeliveryActorArguments {
            ordering_key: ordering_key.to_string(),
            consumer,
            max_attempts: self.max_attempts,
            redelivery_delay: self.redelivery_delay,
            dead_letters: self.dead_letters.clone(),
        };

        match Actor::spawn(Some(actor_name.clone()), DeliveryActor, args).await {
            Ok((actor_ref, _handle)) => Ok(actor_ref),
            Err(e) => {
                // Spawn lost a race against a concurrent delivery for the
                // same key; the named singleton must exist now
                if let Some(actor_ref) = ActorRef::<DeliveryActorMessage>::where_is(actor_name) {
                    Ok(actor_ref)
                } else {
                    Err(TransportError::Publish(format!(
                        "failed to spawn or find delivery actor: {:?}",
                        e
                    )))
                }
            }
        }
    }

    /// Enqueue a delivery on the key's actor (get_or_spawn + cast).
    pub async fn deliver(
        &self,
        delivery: Delivery,
        consumer: Arc<dyn EventConsumer>,
    ) -> Result<(), TransportError> {
        let ordering_key = delivery.envelope.ordering_key.clone();
        self.active_keys.lock().unwrap().insert(ordering_key.clone());

        let actor_ref = self.get_or_spawn(&ordering_key, consumer).await?;

        actor_ref
            .cast(DeliveryActorMessage::Deliver(delivery))
            .map_err(|e| {
                TransportError::Publish(format!("failed to enqueue delivery: {:?}", e))
            })
    }

    pub fn dead_letters(&self) -> Vec<Delivery> {
        self.dead_letters.lock().unwrap().clone()
    }

    /// Record a delivery that could not even be enqueued on its actor.
    pub fn dead_letter(&self, delivery: Delivery) {
        self.dead_letters.lock().unwrap().push(delivery);
    }

    /// Stop every delivery actor this transport has spawned.
    pub fn shutdown_all(&self) {
        let keys: Vec<String> = {
            let keys = self.active_keys.lock().unwrap();
            keys.iter().cloned().collect()
        };

        for key in keys {
            if let Some(actor_ref) =
                ActorRef::<DeliveryActorMessage>::where_is(self.actor_name(&key))
            {
                actor_ref.stop(None);
            }
        }

        self.active_keys.lock().unwrap().clear();
    }
}
