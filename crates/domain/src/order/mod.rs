//! Order aggregate and related types.

mod aggregate;
mod status;
mod value_objects;

pub use aggregate::{DEFAULT_CURRENCY, Order};
pub use status::OrderStatus;
pub use value_objects::{Money, OrderItem, ProductId};

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    /// User ID is required.
    #[error("invalid user ID")]
    InvalidUserId,

    /// Order has no items.
    #[error("order must have at least one item")]
    EmptyItems,

    /// Sum of line totals is zero, negative or overflowed.
    #[error("invalid total price: {total}")]
    InvalidTotalPrice { total: Money },

    /// Requested delivery time is not strictly in the future.
    #[error("invalid delivery time: {requested} is not after {now}")]
    InvalidDeliveryTime {
        requested: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    #[error("invalid unit price: {price}")]
    InvalidUnitPrice { price: Money },

    /// Supplied line total disagrees with quantity × unit price.
    #[error("line total for {product_id} is {actual}, expected {expected}")]
    LineTotalMismatch {
        product_id: String,
        expected: Money,
        actual: Money,
    },

    /// Order is not in a status that allows the action.
    #[error("invalid state transition: cannot {action} from {current_state}")]
    InvalidStateTransition {
        current_state: OrderStatus,
        action: &'static str,
    },
}
