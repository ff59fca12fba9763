use async_trait::async_trait;
use common::{AddressId, UserId};
use domain::DeliveryAddress;

use crate::StoreError;

/// Durable store for users' delivery addresses.
#[async_trait]
pub trait AddressStore: Send + Sync {
    /// Persists a new address and returns it with its assigned id.
    async fn create(&self, address: DeliveryAddress) -> Result<DeliveryAddress, StoreError>;

    async fn get_by_id(&self, id: AddressId) -> Result<Option<DeliveryAddress>, StoreError>;

    /// Returns every address of a user, the default one first.
    async fn get_by_user_id(&self, user_id: &UserId) -> Result<Vec<DeliveryAddress>, StoreError>;

    /// Replaces the stored fields of an address and returns the stored copy.
    ///
    /// The default flag of `address` is ignored: the stored flag is kept, so
    /// only [`AddressStore::set_default`] ever changes it.
    async fn update(&self, address: DeliveryAddress) -> Result<DeliveryAddress, StoreError>;

    async fn delete(&self, id: AddressId) -> Result<(), StoreError>;

    /// Marks `id` as the user's default address and clears the flag on all
    /// of that user's other addresses, in one step.
    async fn set_default(&self, user_id: &UserId, id: AddressId) -> Result<(), StoreError>;
}
