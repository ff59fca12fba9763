//! Delivery address use cases.

use std::time::Instant;

use common::{AddressId, OperationContext, UserId};
use domain::{AddressFields, DeliveryAddress};
use metrics::histogram;
use ports::{AddressStore, Cache, StoreError};

use crate::orchestrator::flatten;
use crate::{OrchestratorConfig, OrchestratorError, Result, cache_keys, cached};

/// Manages the delivery addresses of users.
///
/// Every operation is scoped to a user: an address owned by someone else is
/// reported as not found. A user's address list is cached under
/// `addresses:{user}` and invalidated on every write.
pub struct AddressBook<A, C>
where
    A: AddressStore,
    C: Cache,
{
    store: A,
    cache: C,
    config: OrchestratorConfig,
}

impl<A, C> AddressBook<A, C>
where
    A: AddressStore,
    C: Cache,
{
    pub fn new(store: A, cache: C, config: OrchestratorConfig) -> Self {
        Self {
            store,
            cache,
            config,
        }
    }

    /// Validates and stores a new address.
    ///
    /// With `is_default` the address becomes the user's only default.
    #[tracing::instrument(skip(self, ctx, fields), fields(user_id = %user_id))]
    pub async fn add_address(
        &self,
        ctx: &OperationContext,
        user_id: UserId,
        fields: AddressFields,
        is_default: bool,
    ) -> Result<DeliveryAddress> {
        let started = Instant::now();
        let result = self.add(ctx, user_id, fields, is_default).await;
        observe("add_address", started, &result);
        result
    }

    #[tracing::instrument(skip(self, ctx), fields(user_id = %user_id, address_id = %address_id))]
    pub async fn get_address(
        &self,
        ctx: &OperationContext,
        user_id: &UserId,
        address_id: AddressId,
    ) -> Result<DeliveryAddress> {
        let started = Instant::now();
        let result = self.load_owned(ctx, user_id, address_id).await;
        observe("get_address", started, &result);
        result
    }

    /// Returns every address of a user, the default first.
    #[tracing::instrument(skip(self, ctx), fields(user_id = %user_id))]
    pub async fn list_addresses(
        &self,
        ctx: &OperationContext,
        user_id: &UserId,
    ) -> Result<Vec<DeliveryAddress>> {
        let started = Instant::now();
        let result = self.list(ctx, user_id).await;
        observe("list_addresses", started, &result);
        result
    }

    /// Replaces the editable fields of an address. The default flag is kept.
    #[tracing::instrument(skip(self, ctx, fields), fields(user_id = %user_id, address_id = %address_id))]
    pub async fn update_address(
        &self,
        ctx: &OperationContext,
        user_id: &UserId,
        address_id: AddressId,
        fields: AddressFields,
    ) -> Result<DeliveryAddress> {
        let started = Instant::now();
        let result = self.update(ctx, user_id, address_id, fields).await;
        observe("update_address", started, &result);
        result
    }

    /// Deletes an address. Deleting the default leaves the user without one.
    #[tracing::instrument(skip(self, ctx), fields(user_id = %user_id, address_id = %address_id))]
    pub async fn delete_address(
        &self,
        ctx: &OperationContext,
        user_id: &UserId,
        address_id: AddressId,
    ) -> Result<()> {
        let started = Instant::now();
        let result = self.delete(ctx, user_id, address_id).await;
        observe("delete_address", started, &result);
        result
    }

    /// Makes `address_id` the user's default address.
    #[tracing::instrument(skip(self, ctx), fields(user_id = %user_id, address_id = %address_id))]
    pub async fn set_default_address(
        &self,
        ctx: &OperationContext,
        user_id: &UserId,
        address_id: AddressId,
    ) -> Result<DeliveryAddress> {
        let started = Instant::now();
        let result = self.promote(ctx, user_id, address_id).await;
        observe("set_default_address", started, &result);
        result
    }
}

impl<A, C> AddressBook<A, C>
where
    A: AddressStore,
    C: Cache,
{
    async fn add(
        &self,
        ctx: &OperationContext,
        user_id: UserId,
        fields: AddressFields,
        is_default: bool,
    ) -> Result<DeliveryAddress> {
        // Promotion goes through the store's atomic set_default; a failed
        // promotion removes the address again.
        let address = DeliveryAddress::new(user_id, fields, false)?;
        let mut stored = ctx.run(self.store.create(address)).await??;
        let id = stored
            .id()
            .ok_or(StoreError::MissingIdentity { entity: "address" })?;
        tracing::info!(address_id = %id, "address added");

        let promoted = if is_default {
            flatten(ctx.run(self.store.set_default(stored.user_id(), id)).await)
        } else {
            Ok(())
        };
        if let Err(e) = &promoted {
            tracing::warn!(address_id = %id, error = %e, "default promotion failed");
            self.discard(id).await;
        }

        self.invalidate(stored.user_id()).await;
        promoted?;

        if is_default {
            stored.set_default(true);
        }
        Ok(stored)
    }

    async fn list(&self, ctx: &OperationContext, user_id: &UserId) -> Result<Vec<DeliveryAddress>> {
        let key = cache_keys::addresses(user_id);
        let hit: Option<Vec<DeliveryAddress>> = cached::read_json(ctx, &self.cache, &key).await;
        if let Some(addresses) = hit {
            tracing::debug!("address list cache hit");
            return Ok(addresses);
        }

        let addresses = ctx.run(self.store.get_by_user_id(user_id)).await??;
        cached::write_json(
            ctx,
            &self.cache,
            &key,
            &addresses,
            self.config.address_cache_ttl_secs,
        )
        .await;
        Ok(addresses)
    }

    async fn update(
        &self,
        ctx: &OperationContext,
        user_id: &UserId,
        address_id: AddressId,
        fields: AddressFields,
    ) -> Result<DeliveryAddress> {
        let mut address = self.load_owned(ctx, user_id, address_id).await?;
        address.update(fields)?;

        let stored = ctx.run(self.store.update(address)).await??;
        tracing::info!("address updated");

        self.invalidate(user_id).await;
        Ok(stored)
    }

    async fn delete(
        &self,
        ctx: &OperationContext,
        user_id: &UserId,
        address_id: AddressId,
    ) -> Result<()> {
        self.load_owned(ctx, user_id, address_id).await?;
        ctx.run(self.store.delete(address_id)).await??;
        tracing::info!("address deleted");

        self.invalidate(user_id).await;
        Ok(())
    }

    async fn promote(
        &self,
        ctx: &OperationContext,
        user_id: &UserId,
        address_id: AddressId,
    ) -> Result<DeliveryAddress> {
        let mut address = self.load_owned(ctx, user_id, address_id).await?;
        ctx.run(self.store.set_default(user_id, address_id)).await??;
        tracing::info!("default address changed");

        self.invalidate(user_id).await;
        address.set_default(true);
        Ok(address)
    }

    /// Loads an address from the store, hiding addresses of other users.
    async fn load_owned(
        &self,
        ctx: &OperationContext,
        user_id: &UserId,
        address_id: AddressId,
    ) -> Result<DeliveryAddress> {
        ctx.run(self.store.get_by_id(address_id))
            .await??
            .filter(|address| address.user_id() == user_id)
            .ok_or_else(|| OrchestratorError::address_not_found(address_id))
    }

    /// Deletes an address the caller was told was not added.
    async fn discard(&self, address_id: AddressId) {
        match tokio::time::timeout(self.config.compensation_timeout, self.store.delete(address_id))
            .await
        {
            Ok(Ok(())) => tracing::info!(%address_id, "unpromoted address removed"),
            Ok(Err(e)) => {
                tracing::error!(%address_id, error = %e, "failed to remove unpromoted address");
            }
            Err(_) => tracing::error!(%address_id, "removing unpromoted address timed out"),
        }
    }

    async fn invalidate(&self, user_id: &UserId) {
        cached::invalidate(
            &self.cache,
            &[cache_keys::addresses(user_id)],
            self.config.compensation_timeout,
        )
        .await;
    }
}

fn observe<T>(operation: &'static str, started: Instant, result: &Result<T>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.kind().as_str(),
    };
    histogram!(
        "address_operation_duration_seconds",
        "operation" => operation,
        "outcome" => outcome
    )
    .record(started.elapsed().as_secs_f64());
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::ErrorKind;
    use ports::{InMemoryAddressStore, InMemoryCache};

    fn book() -> (
        AddressBook<InMemoryAddressStore, InMemoryCache>,
        InMemoryAddressStore,
        InMemoryCache,
    ) {
        let store = InMemoryAddressStore::new();
        let cache = InMemoryCache::new();
        let book = AddressBook::new(store.clone(), cache.clone(), OrchestratorConfig::default());
        (book, store, cache)
    }

    fn fields(street: &str) -> AddressFields {
        AddressFields {
            full_name: "John Doe".to_string(),
            street_address: street.to_string(),
            apartment: None,
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            postal_code: "62704".to_string(),
            country: "USA".to_string(),
            phone: "+12025550123".to_string(),
        }
    }

    #[tokio::test]
    async fn test_add_and_get() {
        let (book, _, _) = book();
        let ctx = OperationContext::background();
        let user = UserId::new("user-1");

        let added = book
            .add_address(&ctx, user.clone(), fields("123 Main Street"), false)
            .await
            .unwrap();
        let id = added.id().unwrap();

        let fetched = book.get_address(&ctx, &user, id).await.unwrap();
        assert_eq!(fetched, added);
    }

    #[tokio::test]
    async fn test_invalid_fields_are_rejected() {
        let (book, store, _) = book();
        let ctx = OperationContext::background();

        let result = book
            .add_address(
                &ctx,
                UserId::new("user-1"),
                AddressFields {
                    postal_code: "!!".to_string(),
                    ..fields("123 Main Street")
                },
                false,
            )
            .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_other_users_address_is_not_found() {
        let (book, _, _) = book();
        let ctx = OperationContext::background();

        let added = book
            .add_address(&ctx, UserId::new("owner"), fields("123 Main Street"), false)
            .await
            .unwrap();
        let id = added.id().unwrap();
        let intruder = UserId::new("intruder");

        assert_eq!(
            book.get_address(&ctx, &intruder, id).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            book.delete_address(&ctx, &intruder, id).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            book.set_default_address(&ctx, &intruder, id)
                .await
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_list_is_cached_and_invalidated() {
        let (book, _, cache) = book();
        let ctx = OperationContext::background();
        let user = UserId::new("user-1");
        let key = cache_keys::addresses(&user);

        book.add_address(&ctx, user.clone(), fields("1 First Street"), false)
            .await
            .unwrap();
        assert_eq!(book.list_addresses(&ctx, &user).await.unwrap().len(), 1);
        assert!(cache.contains_key(&key));

        book.add_address(&ctx, user.clone(), fields("2 Second Street"), false)
            .await
            .unwrap();
        assert!(!cache.contains_key(&key));
        assert_eq!(book.list_addresses(&ctx, &user).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_keeps_previous_fields_on_failure() {
        let (book, _, _) = book();
        let ctx = OperationContext::background();
        let user = UserId::new("user-1");
        let id = book
            .add_address(&ctx, user.clone(), fields("123 Main Street"), false)
            .await
            .unwrap()
            .id()
            .unwrap();

        let result = book
            .update_address(
                &ctx,
                &user,
                id,
                AddressFields {
                    phone: "0123".to_string(),
                    ..fields("9 Elm Street")
                },
            )
            .await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);

        let unchanged = book.get_address(&ctx, &user, id).await.unwrap();
        assert_eq!(unchanged.street_address(), "123 Main Street");

        let updated = book
            .update_address(&ctx, &user, id, fields("9 Elm Street"))
            .await
            .unwrap();
        assert_eq!(updated.street_address(), "9 Elm Street");
    }

    #[tokio::test]
    async fn test_default_promotion_clears_previous_default() {
        let (book, _, _) = book();
        let ctx = OperationContext::background();
        let user = UserId::new("user-1");

        let first = book
            .add_address(&ctx, user.clone(), fields("1 First Street"), true)
            .await
            .unwrap();
        assert!(first.is_default());

        let second = book
            .add_address(&ctx, user.clone(), fields("2 Second Street"), false)
            .await
            .unwrap();
        let promoted = book
            .set_default_address(&ctx, &user, second.id().unwrap())
            .await
            .unwrap();
        assert!(promoted.is_default());

        let listed = book.list_addresses(&ctx, &user).await.unwrap();
        let defaults: Vec<_> = listed.iter().filter(|a| a.is_default()).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(listed[0].id(), second.id());
    }

    #[tokio::test]
    async fn test_failed_promotion_removes_the_new_address() {
        let (book, store, _) = book();
        let ctx = OperationContext::background();
        let user = UserId::new("user-1");
        store.set_fail_on_set_default(true);

        let result = book
            .add_address(&ctx, user.clone(), fields("123 Main Street"), true)
            .await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::PersistenceFailure);
        assert!(store.is_empty());

        store.set_fail_on_set_default(false);
        let added = book
            .add_address(&ctx, user.clone(), fields("123 Main Street"), true)
            .await
            .unwrap();
        assert!(added.is_default());
        assert_eq!(book.list_addresses(&ctx, &user).await.unwrap(), vec![added]);
    }

    #[tokio::test]
    async fn test_update_racing_a_default_change_keeps_one_default() {
        let (book, store, _) = book();
        let ctx = OperationContext::background();
        let user = UserId::new("user-1");
        let first = book
            .add_address(&ctx, user.clone(), fields("1 First Street"), true)
            .await
            .unwrap()
            .id()
            .unwrap();
        let second = book
            .add_address(&ctx, user.clone(), fields("2 Second Street"), false)
            .await
            .unwrap()
            .id()
            .unwrap();

        // The update loads `first` while it is the default and lands after
        // `second` has been promoted.
        store.set_write_delay(Some(Duration::from_millis(100)));
        let (updated, promoted) = tokio::join!(
            book.update_address(&ctx, &user, first, fields("9 Elm Street")),
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                store.set_write_delay(None);
                book.set_default_address(&ctx, &user, second).await
            }
        );
        let updated = updated.unwrap();
        promoted.unwrap();

        assert_eq!(updated.street_address(), "9 Elm Street");
        assert!(!updated.is_default());

        let listed = book.list_addresses(&ctx, &user).await.unwrap();
        let defaults: Vec<_> = listed.iter().filter(|a| a.is_default()).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id(), Some(second));
    }

    #[tokio::test]
    async fn test_delete() {
        let (book, store, _) = book();
        let ctx = OperationContext::background();
        let user = UserId::new("user-1");
        let id = book
            .add_address(&ctx, user.clone(), fields("123 Main Street"), false)
            .await
            .unwrap()
            .id()
            .unwrap();

        book.delete_address(&ctx, &user, id).await.unwrap();
        assert!(store.is_empty());
        assert_eq!(
            book.get_address(&ctx, &user, id).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_store_failure_is_a_persistence_failure() {
        let (book, store, _) = book();
        let ctx = OperationContext::background();
        store.set_fail_on_write(true);

        let result = book
            .add_address(&ctx, UserId::new("user-1"), fields("123 Main Street"), false)
            .await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::PersistenceFailure);
    }
}
