//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Created ──► AwaitingPayment ──► Paid ──► Processing ──► ReadyForDelivery ──► OutForDelivery ──► Delivered
///    │               │             │           │                 │                   │
///    └───────────────┴─────────────┴───────────┴─────────────────┴───────────────────┴──► Cancelled
/// ```
///
/// `Created` may also go straight to `Paid`. Fulfilment statuses are driven
/// by external signals and are not gated beyond "never leave a terminal
/// status".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Freshly placed order (the only initial status).
    #[default]
    Created,

    /// Waiting for the payment provider.
    AwaitingPayment,

    Paid,

    Processing,

    ReadyForDelivery,

    OutForDelivery,

    /// Handed to the customer (terminal).
    Delivered,

    /// Cancelled by the customer or the system (terminal).
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Created,
        OrderStatus::AwaitingPayment,
        OrderStatus::Paid,
        OrderStatus::Processing,
        OrderStatus::ReadyForDelivery,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    /// Returns true if the order may move to `AwaitingPayment`.
    pub fn can_await_payment(&self) -> bool {
        matches!(self, OrderStatus::Created)
    }

    /// Returns true if the order may be marked as paid.
    pub fn can_be_paid(&self) -> bool {
        matches!(self, OrderStatus::Created | OrderStatus::AwaitingPayment)
    }

    /// Returns true if the order can be cancelled.
    pub fn can_be_cancelled(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true for statuses set directly from fulfilment signals.
    pub fn is_fulfillment(&self) -> bool {
        matches!(
            self,
            OrderStatus::Processing
                | OrderStatus::ReadyForDelivery
                | OrderStatus::OutForDelivery
                | OrderStatus::Delivered
        )
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::AwaitingPayment => "AWAITING_PAYMENT",
            OrderStatus::Paid => "PAID",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::ReadyForDelivery => "READY_FOR_DELIVERY",
            OrderStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown order status: {s}"))
    }
}
