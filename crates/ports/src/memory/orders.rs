use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, UserId, Version};
use domain::{Order, OrderStatus};

use super::{read, write};
use crate::{OrderStore, StoreError};

#[derive(Debug, Default)]
struct InMemoryOrderState {
    orders: HashMap<OrderId, Order>,
    fail_on_create: bool,
    fail_on_update: bool,
    fail_on_read: bool,
    write_delay: Option<Duration>,
    read_delay: Option<Duration>,
}

/// In-memory order store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<InMemoryOrderState>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `create` call fail with a backend error.
    pub fn set_fail_on_create(&self, fail: bool) {
        write(&self.state).fail_on_create = fail;
    }

    /// Makes every `update`, `update_status` and `delete` call fail.
    pub fn set_fail_on_update(&self, fail: bool) {
        write(&self.state).fail_on_update = fail;
    }

    /// Makes every read fail.
    pub fn set_fail_on_read(&self, fail: bool) {
        write(&self.state).fail_on_read = fail;
    }

    /// Delays every write before it is applied, to simulate a slow backend.
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        write(&self.state).write_delay = delay;
    }

    /// Delays `get_by_id` after the order has been read, so the caller
    /// receives a value that may be stale by the time it returns.
    pub fn set_read_delay(&self, delay: Option<Duration>) {
        write(&self.state).read_delay = delay;
    }

    pub fn len(&self) -> usize {
        read(&self.state).orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the stored copy of an order, bypassing failure toggles.
    pub fn snapshot(&self, id: OrderId) -> Option<Order> {
        read(&self.state).orders.get(&id).cloned()
    }

    async fn before_write(&self) {
        let delay = read(&self.state).write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check_version(id: OrderId, stored: &Order, expected: Version) -> Result<(), StoreError> {
        if stored.version() != expected {
            return Err(StoreError::Conflict {
                id,
                expected,
                actual: stored.version(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, id: OrderId, order: Order) -> Result<Order, StoreError> {
        self.before_write().await;
        let mut state = write(&self.state);

        if state.fail_on_create {
            return Err(StoreError::Backend("simulated create failure".to_string()));
        }
        if state.orders.contains_key(&id) {
            return Err(StoreError::AlreadyExists {
                entity: "order",
                id: id.to_string(),
            });
        }

        let stored = order.persisted_as(id, Version::first());
        state.orders.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let (found, delay) = {
            let state = read(&self.state);
            if state.fail_on_read {
                return Err(StoreError::Backend("simulated read failure".to_string()));
            }
            (state.orders.get(&id).cloned(), state.read_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(found)
    }

    async fn get_by_user_id(
        &self,
        user_id: &UserId,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<Order>, u64), StoreError> {
        let state = read(&self.state);
        if state.fail_on_read {
            return Err(StoreError::Backend("simulated read failure".to_string()));
        }

        let mut orders: Vec<&Order> = state
            .orders
            .values()
            .filter(|o| o.user_id() == user_id)
            .collect();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));

        let total = orders.len() as u64;
        let skip = page.saturating_sub(1) as usize * limit as usize;
        let page = orders
            .into_iter()
            .skip(skip)
            .take(limit as usize)
            .cloned()
            .collect();

        Ok((page, total))
    }

    async fn update(&self, order: Order) -> Result<Order, StoreError> {
        let id = order
            .id()
            .ok_or(StoreError::MissingIdentity { entity: "order" })?;

        self.before_write().await;
        let mut state = write(&self.state);

        if state.fail_on_update {
            return Err(StoreError::Backend("simulated update failure".to_string()));
        }
        let stored = state
            .orders
            .get(&id)
            .ok_or_else(|| StoreError::order_not_found(id))?;
        Self::check_version(id, stored, order.version())?;

        let mut updated = order;
        updated.set_version(updated.version().next());
        state.orders.insert(id, updated.clone());
        Ok(updated)
    }

    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        updated_at: DateTime<Utc>,
        expected_version: Version,
    ) -> Result<Order, StoreError> {
        self.before_write().await;
        let mut state = write(&self.state);

        if state.fail_on_update {
            return Err(StoreError::Backend("simulated update failure".to_string()));
        }
        let stored = state
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::order_not_found(id))?;
        Self::check_version(id, stored, expected_version)?;

        stored.overwrite_status(status, updated_at);
        stored.set_version(expected_version.next());
        Ok(stored.clone())
    }

    async fn delete(&self, id: OrderId) -> Result<(), StoreError> {
        let mut state = write(&self.state);
        if state.fail_on_update {
            return Err(StoreError::Backend("simulated delete failure".to_string()));
        }
        state
            .orders
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::order_not_found(id))
    }
}
