//! Ports consumed by the order orchestrator.
//!
//! Each external collaborator is a trait here: the durable order and address
//! stores, the read-through cache, the lifecycle event stream and the
//! delivery slot registry. The `memory` module provides in-memory adapters
//! for all of them, with failure toggles for tests.

pub mod address_store;
pub mod cache;
pub mod error;
pub mod events;
pub mod memory;
pub mod order_store;
pub mod retry;
pub mod slots;

pub use address_store::AddressStore;
pub use cache::{Cache, CacheExt};
pub use error::{CacheError, PublishError, SlotError, StoreError};
pub use events::{
    EventPublisher, OrderEventType, OrderLifecycleEvent, SUBJECT_ORDER_CANCELLED,
    SUBJECT_ORDER_CREATED, SUBJECT_ORDER_STATUS_UPDATED,
};
pub use memory::{
    InMemoryAddressStore, InMemoryCache, InMemoryEventPublisher, InMemoryOrderStore,
    InMemorySlotRegistry,
};
pub use order_store::{OrderStore, OrderStoreExt};
pub use retry::{RetryConfig, RetryingPublisher};
pub use slots::SlotRegistry;
