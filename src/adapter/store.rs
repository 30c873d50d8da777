use crate::{
    domain::{DedupKey, DedupRecord, NewOrder, Order, OrderId, OrderStatus, StoreError},
    port::{OrderStore, StatusUpdate},
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

struct StoreData {
    orders: HashMap<OrderId, Order>,
    dedup_log: HashMap<DedupKey, DedupRecord>,
}

/// In-memory order store.
///
/// Both tables live behind one lock, so an insert and the uniqueness check
/// that guards it are atomic, mirroring the unique indexes a relational
/// backend would enforce. For production, use a database-backed
/// implementation.
pub struct MemoryStore {
    data: Arc<RwLock<StoreData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(StoreData {
                orders: HashMap::new(),
                dedup_log: HashMap::new(),
            })),
        }
    }

    /// Snapshot of all orders, for demo output and test assertions.
    pub async fn list_orders(&self) -> Vec<Order> {
        let data = self.data.read().await;
        let mut orders: Vec<Order> = data.orders.values().cloned().collect();
        orders.sort_by(|a, b| a.order_id.as_str().cmp(b.order_id.as_str()));
        orders
    }

    pub async fn dedup_count(&self) -> usize {
        self.data.read().await.dedup_log.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, order: NewOrder) -> Result<(), StoreError> {
        let mut data = self.data.write().await;

        if data.orders.contains_key(&order.order_id) {
            return Err(StoreError::Conflict(format!(
                "order id already exists: {}",
                order.order_id
            )));
        }

        let now = Utc::now();
        data.orders.insert(
            order.order_id.clone(),
            Order {
                order_id: order.order_id,
                amount: order.amount,
                status: OrderStatus::Created,
                created_at: now,
                updated_at: now,
            },
        );

        Ok(())
    }

    async fn find_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError> {
        let data = self.data.read().await;
        Ok(data.orders.get(order_id).cloned())
    }

    async fn exists_order(&self, order_id: &OrderId) -> Result<bool, StoreError> {
        let data = self.data.read().await;
        Ok(data.orders.contains_key(order_id))
    }

    async fn update_status(
        &self,
        order_id: &OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<StatusUpdate, StoreError> {
        let mut data = self.data.write().await;

        match data.orders.get_mut(order_id) {
            None => Ok(StatusUpdate::NotFound),
            Some(order) if order.status == expected => {
                order.status = next;
                order.updated_at = Utc::now();
                Ok(StatusUpdate::Applied)
            }
            Some(_) => Ok(StatusUpdate::Stale),
        }
    }

    async fn insert_dedup(&self, record: DedupRecord) -> Result<(), StoreError> {
        let mut data = self.data.write().await;

        if data.dedup_log.contains_key(&record.dedup_key) {
            return Err(StoreError::Conflict(format!(
                "dedup key already processed: {}",
                record.dedup_key
            )));
        }

        data.dedup_log.insert(record.dedup_key.clone(), record);
        Ok(())
    }

    async fn find_dedup(&self, key: &DedupKey) -> Result<Option<DedupRecord>, StoreError> {
        let data = self.data.read().await;
        Ok(data.dedup_log.get(key).cloned())
    }
}
