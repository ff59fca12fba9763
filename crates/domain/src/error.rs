//! Domain error types.

use thiserror::Error;

use crate::address::AddressError;
use crate::order::OrderError;
use crate::slot::SlotWindowError;

/// Any validation failure raised by a domain value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Address error: {0}")]
    Address(#[from] AddressError),

    #[error("Slot error: {0}")]
    Slot(#[from] SlotWindowError),
}
