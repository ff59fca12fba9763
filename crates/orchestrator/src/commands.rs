//! Order commands.

use chrono::{DateTime, Utc};
use common::UserId;
use domain::{DeliveryAddress, OrderItem};

/// Command to place a new order.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    /// The user placing the order.
    pub user_id: UserId,

    /// Line items, in the order they should be kept.
    pub items: Vec<OrderItem>,

    /// Address to snapshot onto the order.
    pub delivery_address: Option<DeliveryAddress>,

    /// Requested delivery time. A slot is reserved if one covers it.
    pub delivery_time: DateTime<Utc>,

    /// Currency code; the domain default applies when absent.
    pub currency: Option<String>,
}

impl CreateOrder {
    /// Creates a new CreateOrder command.
    pub fn new(user_id: UserId, items: Vec<OrderItem>, delivery_time: DateTime<Utc>) -> Self {
        Self {
            user_id,
            items,
            delivery_address: None,
            delivery_time,
            currency: None,
        }
    }

    pub fn with_delivery_address(mut self, address: DeliveryAddress) -> Self {
        self.delivery_address = Some(address);
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }
}
