//! Orchestrator error types.

use common::{AddressId, Interrupted, OrderId, SlotId, Version};
use domain::{AddressError, DomainError, OrderError, OrderStatus};
use ports::{SlotError, StoreError};
use thiserror::Error;

/// Errors returned by orchestrator operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Input failed aggregate validation.
    #[error("Validation failed: {0}")]
    Validation(#[from] DomainError),

    /// The order's status does not allow the requested change.
    #[error("Invalid state transition: cannot {action} from {current}")]
    InvalidStateTransition { current: OrderStatus, action: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Another order holds the delivery slot, or the slot does not exist.
    #[error("Delivery slot {0} is not available")]
    SlotUnavailable(SlotId),

    /// The store rejected or failed the write.
    #[error("Persistence failure: {0}")]
    Persistence(#[source] StoreError),

    /// A concurrent writer changed the order first.
    #[error("Concurrent modification of order {id}: expected version {expected}, found {actual}")]
    Conflict {
        id: OrderId,
        expected: Version,
        actual: Version,
    },

    /// The caller cancelled the operation or its deadline passed.
    #[error("Operation interrupted: {0}")]
    Interrupted(#[from] Interrupted),

    #[error("Invalid pagination: page {page}, limit {limit}")]
    InvalidPagination { page: u32, limit: u32 },

    /// The slot registry itself failed.
    #[error("Slot registry failure: {0}")]
    SlotRegistry(#[source] SlotError),
}

/// Coarse classification of an `OrchestratorError`, for callers mapping
/// errors onto transport status codes and for metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    InvalidStateTransition,
    NotFound,
    SlotUnavailable,
    PersistenceFailure,
    Conflict,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::InvalidStateTransition => "invalid_state_transition",
            ErrorKind::NotFound => "not_found",
            ErrorKind::SlotUnavailable => "slot_unavailable",
            ErrorKind::PersistenceFailure => "persistence_failure",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl OrchestratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrchestratorError::Validation(_) | OrchestratorError::InvalidPagination { .. } => {
                ErrorKind::Validation
            }
            OrchestratorError::InvalidStateTransition { .. } => ErrorKind::InvalidStateTransition,
            OrchestratorError::NotFound { .. } => ErrorKind::NotFound,
            OrchestratorError::SlotUnavailable(_) => ErrorKind::SlotUnavailable,
            OrchestratorError::Persistence(_) | OrchestratorError::SlotRegistry(_) => {
                ErrorKind::PersistenceFailure
            }
            OrchestratorError::Conflict { .. } => ErrorKind::Conflict,
            OrchestratorError::Interrupted(_) => ErrorKind::Cancelled,
        }
    }

    pub(crate) fn address_not_found(id: AddressId) -> Self {
        OrchestratorError::NotFound {
            entity: "address",
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid_transition(current: OrderStatus, action: impl Into<String>) -> Self {
        OrchestratorError::InvalidStateTransition {
            current,
            action: action.into(),
        }
    }
}

impl From<OrderError> for OrchestratorError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::InvalidStateTransition {
                current_state,
                action,
            } => OrchestratorError::invalid_transition(current_state, action),
            other => OrchestratorError::Validation(DomainError::Order(other)),
        }
    }
}

impl From<AddressError> for OrchestratorError {
    fn from(e: AddressError) -> Self {
        OrchestratorError::Validation(DomainError::Address(e))
    }
}

impl From<StoreError> for OrchestratorError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, id } => OrchestratorError::NotFound { entity, id },
            StoreError::Conflict {
                id,
                expected,
                actual,
            } => OrchestratorError::Conflict {
                id,
                expected,
                actual,
            },
            other => OrchestratorError::Persistence(other),
        }
    }
}

impl From<SlotError> for OrchestratorError {
    fn from(e: SlotError) -> Self {
        match e {
            SlotError::Unavailable { slot_id, .. } | SlotError::NotFound(slot_id) => {
                OrchestratorError::SlotUnavailable(slot_id)
            }
            other => OrchestratorError::SlotRegistry(other),
        }
    }
}

/// Convenience type alias for orchestrator results.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Parses a caller-supplied order id. A malformed id can never exist, so it
/// is reported as `NotFound`.
pub fn parse_order_id(raw: &str) -> Result<OrderId> {
    OrderId::parse_str(raw).map_err(|_| OrchestratorError::NotFound {
        entity: "order",
        id: raw.to_string(),
    })
}

/// Parses a caller-supplied address id, reporting a malformed one as
/// `NotFound`.
pub fn parse_address_id(raw: &str) -> Result<AddressId> {
    AddressId::parse_str(raw).map_err(|_| OrchestratorError::NotFound {
        entity: "address",
        id: raw.to_string(),
    })
}
