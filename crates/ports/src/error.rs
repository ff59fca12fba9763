use common::{OrderId, SlotId, Version};
use thiserror::Error;

/// Errors returned by the order and address stores.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No record exists under the given id.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A record already exists under the given id.
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    /// A conditional write lost against a concurrent writer.
    #[error("Version conflict for order {id}: expected version {expected}, found {actual}")]
    Conflict {
        id: OrderId,
        expected: Version,
        actual: Version,
    },

    /// The value passed to an update was never persisted.
    #[error("{entity} has no identity")]
    MissingIdentity { entity: &'static str },

    /// The backend failed to serve the request.
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn order_not_found(id: OrderId) -> Self {
        Self::NotFound {
            entity: "order",
            id: id.to_string(),
        }
    }

    pub fn address_not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity: "address",
            id: id.to_string(),
        }
    }
}

/// Errors returned by the cache.
///
/// The orchestrator never fails an operation because of one of these.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors returned when publishing a lifecycle event.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The broker rejected or dropped the message.
    #[error("Event broker error: {0}")]
    Broker(String),

    #[error("Event serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Events are only emitted for persisted orders.
    #[error("Cannot publish an event for an order without an id")]
    MissingOrderId,
}

impl PublishError {
    /// Returns true if sending the same event again might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Broker(_))
    }
}

/// Errors returned by the slot registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    /// Another order holds the slot.
    #[error("Slot {slot_id} is held by order {held_by}")]
    Unavailable { slot_id: SlotId, held_by: OrderId },

    #[error("Slot not found: {0}")]
    NotFound(SlotId),

    #[error("Slot registry backend error: {0}")]
    Backend(String),
}
