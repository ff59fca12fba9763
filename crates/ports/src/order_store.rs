use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, UserId, Version};
use domain::{Order, OrderStatus};

use crate::StoreError;

/// Durable system of record for orders.
///
/// Writes after `create` are conditional on the order's `Version`: the store
/// rejects a write whose expected version differs from the stored one with
/// `StoreError::Conflict`, and bumps the version on every accepted write.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new order under `id`.
    ///
    /// Returns the stored order with its id set and version 1.
    async fn create(&self, id: OrderId, order: Order) -> Result<Order, StoreError>;

    /// Loads an order. Returns None if it does not exist.
    async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Returns one page of a user's orders, newest first, and the user's
    /// total order count.
    ///
    /// Pages are 1-indexed: `skip = (page - 1) * limit`.
    async fn get_by_user_id(
        &self,
        user_id: &UserId,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<Order>, u64), StoreError>;

    /// Replaces a stored order.
    ///
    /// The order's own version is the expected version. Returns the stored
    /// order carrying the bumped version.
    async fn update(&self, order: Order) -> Result<Order, StoreError>;

    /// Writes only the status and update timestamp of an order.
    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        updated_at: DateTime<Utc>,
        expected_version: Version,
    ) -> Result<Order, StoreError>;

    async fn delete(&self, id: OrderId) -> Result<(), StoreError>;
}

/// Extension trait providing convenience methods for order stores.
#[async_trait]
pub trait OrderStoreExt: OrderStore {
    /// Loads an order, turning absence into `StoreError::NotFound`.
    async fn require(&self, id: OrderId) -> Result<Order, StoreError> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| StoreError::order_not_found(id))
    }
}

impl<T: OrderStore + ?Sized> OrderStoreExt for T {}
