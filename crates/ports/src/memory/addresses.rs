use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::{AddressId, UserId};
use domain::DeliveryAddress;

use super::{read, write};
use crate::{AddressStore, StoreError};

#[derive(Debug, Default)]
struct InMemoryAddressState {
    /// Insertion sequence alongside each address, for stable listing.
    addresses: HashMap<AddressId, (u64, DeliveryAddress)>,
    next_seq: u64,
    fail_on_write: bool,
    fail_on_set_default: bool,
    fail_on_read: bool,
    write_delay: Option<Duration>,
}

/// In-memory address store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAddressStore {
    state: Arc<RwLock<InMemoryAddressState>>,
}

impl InMemoryAddressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_write(&self, fail: bool) {
        write(&self.state).fail_on_write = fail;
    }

    /// Makes only `set_default` fail, leaving other writes working.
    pub fn set_fail_on_set_default(&self, fail: bool) {
        write(&self.state).fail_on_set_default = fail;
    }

    pub fn set_fail_on_read(&self, fail: bool) {
        write(&self.state).fail_on_read = fail;
    }

    /// Delays every write before it is applied, to simulate a slow backend.
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        write(&self.state).write_delay = delay;
    }

    pub fn len(&self) -> usize {
        read(&self.state).addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn before_write(&self) {
        let delay = read(&self.state).write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl AddressStore for InMemoryAddressStore {
    async fn create(&self, address: DeliveryAddress) -> Result<DeliveryAddress, StoreError> {
        self.before_write().await;
        let mut state = write(&self.state);
        if state.fail_on_write {
            return Err(StoreError::Backend("simulated write failure".to_string()));
        }

        let id = AddressId::new();
        let stored = address.persisted_as(id);
        state.next_seq += 1;
        let seq = state.next_seq;
        state.addresses.insert(id, (seq, stored.clone()));
        Ok(stored)
    }

    async fn get_by_id(&self, id: AddressId) -> Result<Option<DeliveryAddress>, StoreError> {
        let state = read(&self.state);
        if state.fail_on_read {
            return Err(StoreError::Backend("simulated read failure".to_string()));
        }
        Ok(state.addresses.get(&id).map(|(_, a)| a.clone()))
    }

    async fn get_by_user_id(&self, user_id: &UserId) -> Result<Vec<DeliveryAddress>, StoreError> {
        let state = read(&self.state);
        if state.fail_on_read {
            return Err(StoreError::Backend("simulated read failure".to_string()));
        }

        let mut owned: Vec<&(u64, DeliveryAddress)> = state
            .addresses
            .values()
            .filter(|(_, a)| a.user_id() == user_id)
            .collect();
        owned.sort_by_key(|(seq, a)| (!a.is_default(), *seq));

        Ok(owned.into_iter().map(|(_, a)| a.clone()).collect())
    }

    async fn update(&self, address: DeliveryAddress) -> Result<DeliveryAddress, StoreError> {
        let id = address
            .id()
            .ok_or(StoreError::MissingIdentity { entity: "address" })?;

        self.before_write().await;
        let mut state = write(&self.state);
        if state.fail_on_write {
            return Err(StoreError::Backend("simulated write failure".to_string()));
        }
        let entry = state
            .addresses
            .get_mut(&id)
            .ok_or_else(|| StoreError::address_not_found(id))?;

        let mut updated = address;
        updated.set_default(entry.1.is_default());
        entry.1 = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, id: AddressId) -> Result<(), StoreError> {
        self.before_write().await;
        let mut state = write(&self.state);
        if state.fail_on_write {
            return Err(StoreError::Backend("simulated write failure".to_string()));
        }
        state
            .addresses
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::address_not_found(id))
    }

    async fn set_default(&self, user_id: &UserId, id: AddressId) -> Result<(), StoreError> {
        self.before_write().await;
        let mut state = write(&self.state);
        if state.fail_on_write || state.fail_on_set_default {
            return Err(StoreError::Backend("simulated write failure".to_string()));
        }

        let owned = state
            .addresses
            .get(&id)
            .is_some_and(|(_, a)| a.user_id() == user_id);
        if !owned {
            return Err(StoreError::address_not_found(id));
        }

        for (address_id, (_, address)) in state.addresses.iter_mut() {
            if address.user_id() == user_id {
                address.set_default(*address_id == id);
            }
        }
        Ok(())
    }
}
