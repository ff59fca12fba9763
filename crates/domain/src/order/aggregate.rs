//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{OrderId, SlotId, UserId, Version};
use serde::{Deserialize, Serialize};

use crate::address::DeliveryAddress;

use super::{Money, OrderError, OrderItem, OrderStatus};

/// Currency used when the caller does not pick one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Order aggregate root.
///
/// Holds a purchase order with its items, delivery details and status.
/// Invariants kept for the lifetime of the value: at least one item, and
/// `total_price` equals the sum of the line totals and is strictly positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Empty until the store has persisted the order.
    id: Option<OrderId>,

    /// Optimistic concurrency token maintained by the store.
    #[serde(default)]
    version: Version,

    user_id: UserId,

    /// Lines in catalog order.
    items: Vec<OrderItem>,

    total_price: Money,

    currency: String,

    status: OrderStatus,

    /// Snapshot of the address at the time it was attached to the order.
    delivery_address: Option<DeliveryAddress>,

    delivery_time: DateTime<Utc>,

    /// Delivery slot held on behalf of this order, if any.
    #[serde(default)]
    delivery_slot: Option<SlotId>,

    created_at: DateTime<Utc>,

    updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new order in the `Created` status.
    ///
    /// `now` is the caller's clock reading; both timestamps are set to it and
    /// the requested delivery time must be strictly later.
    pub fn new(
        user_id: UserId,
        items: Vec<OrderItem>,
        delivery_address: Option<DeliveryAddress>,
        delivery_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if user_id.is_blank() {
            return Err(OrderError::InvalidUserId);
        }

        if items.is_empty() {
            return Err(OrderError::EmptyItems);
        }

        let total_price = items
            .iter()
            .try_fold(Money::zero(), |acc, item| acc.checked_add(item.total_price()))
            .ok_or(OrderError::InvalidTotalPrice {
                total: Money::zero(),
            })?;

        if !total_price.is_positive() {
            return Err(OrderError::InvalidTotalPrice { total: total_price });
        }

        if delivery_time <= now {
            return Err(OrderError::InvalidDeliveryTime {
                requested: delivery_time,
                now,
            });
        }

        Ok(Self {
            id: None,
            version: Version::initial(),
            user_id,
            items,
            total_price,
            currency: DEFAULT_CURRENCY.to_string(),
            status: OrderStatus::Created,
            delivery_address,
            delivery_time,
            delivery_slot: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns the order with a different currency code.
    ///
    /// Only meaningful before the order is persisted.
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into().trim().to_ascii_uppercase();
        self
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> Option<OrderId> {
        self.id
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn total_price(&self) -> Money {
        self.total_price
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn delivery_address(&self) -> Option<&DeliveryAddress> {
        self.delivery_address.as_ref()
    }

    pub fn delivery_time(&self) -> DateTime<Utc> {
        self.delivery_time
    }

    pub fn delivery_slot(&self) -> Option<&SlotId> {
        self.delivery_slot.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns true if the order is `Delivered` or `Cancelled`.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// Lifecycle transitions
impl Order {
    /// Moves the order to `AwaitingPayment`.
    ///
    /// Only legal from `Created`. From any other status the call is ignored
    /// and `false` is returned; callers must not treat that as an error.
    pub fn mark_awaiting_payment(&mut self, now: DateTime<Utc>) -> bool {
        if !self.status.can_await_payment() {
            tracing::warn!(
                order_id = ?self.id,
                status = %self.status,
                "state machine violation: mark_awaiting_payment ignored"
            );
            return false;
        }

        self.status = OrderStatus::AwaitingPayment;
        self.touch(now);
        true
    }

    /// Moves the order to `Paid`.
    ///
    /// Legal from `Created` or `AwaitingPayment`; ignored (returning `false`)
    /// otherwise.
    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> bool {
        if !self.status.can_be_paid() {
            tracing::warn!(
                order_id = ?self.id,
                status = %self.status,
                "state machine violation: mark_paid ignored"
            );
            return false;
        }

        self.status = OrderStatus::Paid;
        self.touch(now);
        true
    }

    /// Cancels the order.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        if !self.status.can_be_cancelled() {
            return Err(OrderError::InvalidStateTransition {
                current_state: self.status,
                action: "cancel",
            });
        }

        self.status = OrderStatus::Cancelled;
        self.touch(now);
        Ok(())
    }

    /// Sets a fulfilment status reported by an external signal.
    ///
    /// Only `Processing`, `ReadyForDelivery`, `OutForDelivery` and `Delivered`
    /// are accepted, and never from a terminal status.
    pub fn advance_fulfillment(
        &mut self,
        status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        if self.status.is_terminal() || !status.is_fulfillment() {
            return Err(OrderError::InvalidStateTransition {
                current_state: self.status,
                action: "advance fulfillment",
            });
        }

        self.status = status;
        self.touch(now);
        Ok(())
    }

    /// Changes the requested delivery time.
    pub fn update_delivery_time(
        &mut self,
        delivery_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        if delivery_time <= now {
            return Err(OrderError::InvalidDeliveryTime {
                requested: delivery_time,
                now,
            });
        }

        self.delivery_time = delivery_time;
        self.touch(now);
        Ok(())
    }

    /// Replaces the delivery address snapshot.
    pub fn update_delivery_address(&mut self, address: DeliveryAddress, now: DateTime<Utc>) {
        self.delivery_address = Some(address);
        self.touch(now);
    }

    /// Records which delivery slot the order holds (or that it holds none).
    pub fn set_delivery_slot(&mut self, slot: Option<SlotId>, now: DateTime<Utc>) {
        if self.delivery_slot != slot {
            self.delivery_slot = slot;
            self.touch(now);
        }
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}

// Persistence hooks used by store adapters
impl Order {
    /// Stamps the identity and version assigned by the store.
    pub fn persisted_as(mut self, id: OrderId, version: Version) -> Self {
        self.id = Some(id);
        self.version = version;
        self
    }

    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    /// Writes a status that the orchestrator has already validated.
    ///
    /// Store adapters implementing a partial status update use this; it does
    /// not apply the state machine.
    pub fn overwrite_status(&mut self, status: OrderStatus, updated_at: DateTime<Utc>) {
        self.status = status;
        self.touch(updated_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
    }

    fn items() -> Vec<OrderItem> {
        vec![
            OrderItem::priced("SKU-001", "Widget", 2, Money::from_minor_units(1000)).unwrap(),
            OrderItem::priced("SKU-002", "Gadget", 1, Money::from_minor_units(2500)).unwrap(),
        ]
    }

    fn create_order() -> Order {
        Order::new(
            UserId::new("user-1"),
            items(),
            None,
            now() + Duration::days(1),
            now(),
        )
        .unwrap()
    }

    fn order_in(status: OrderStatus) -> Order {
        let mut order = create_order();
        order.overwrite_status(status, now());
        order
    }

    #[test]
    fn test_create_order() {
        let order = create_order();
        assert_eq!(order.id(), None);
        assert_eq!(order.status(), OrderStatus::Created);
        assert_eq!(order.total_price().minor_units(), 4500);
        assert_eq!(order.currency(), DEFAULT_CURRENCY);
        assert_eq!(order.created_at(), order.updated_at());
        assert_eq!(order.items()[0].product_id().as_str(), "SKU-001");
        assert_eq!(order.items()[1].product_id().as_str(), "SKU-002");
    }

    #[test]
    fn test_total_is_sum_of_line_totals() {
        let lines: Vec<OrderItem> = (1..=5)
            .map(|i| {
                OrderItem::priced(format!("SKU-{i}"), "Thing", i, Money::from_minor_units(i64::from(i) * 7))
                    .unwrap()
            })
            .collect();
        let expected: i64 = lines.iter().map(|l| l.total_price().minor_units()).sum();

        let order = Order::new(UserId::new("u"), lines, None, now() + Duration::hours(1), now())
            .unwrap();
        assert_eq!(order.total_price().minor_units(), expected);
    }

    #[test]
    fn test_blank_user_is_rejected() {
        let result = Order::new(UserId::new(""), items(), None, now() + Duration::days(1), now());
        assert!(matches!(result, Err(OrderError::InvalidUserId)));
    }

    #[test]
    fn test_empty_items_rejected() {
        let result = Order::new(UserId::new("u"), vec![], None, now() + Duration::days(1), now());
        assert!(matches!(result, Err(OrderError::EmptyItems)));
    }

    #[test]
    fn test_zero_total_rejected() {
        let free = OrderItem::priced("SKU-FREE", "Sticker", 1, Money::zero()).unwrap();
        let result = Order::new(UserId::new("u"), vec![free], None, now() + Duration::days(1), now());
        assert!(matches!(result, Err(OrderError::InvalidTotalPrice { .. })));
    }

    #[test]
    fn test_past_or_present_delivery_time_rejected() {
        for requested in [now() - Duration::days(1), now()] {
            let result = Order::new(UserId::new("u"), items(), None, requested, now());
            assert!(matches!(result, Err(OrderError::InvalidDeliveryTime { .. })));
        }
    }

    #[test]
    fn test_mark_awaiting_payment_only_from_created() {
        let mut order = create_order();
        assert!(order.mark_awaiting_payment(now()));
        assert_eq!(order.status(), OrderStatus::AwaitingPayment);

        assert!(!order.mark_awaiting_payment(now()));
        assert_eq!(order.status(), OrderStatus::AwaitingPayment);
    }

    #[test]
    fn test_mark_paid_from_created_and_awaiting_payment() {
        let mut order = create_order();
        assert!(order.mark_paid(now()));
        assert_eq!(order.status(), OrderStatus::Paid);

        let mut order = order_in(OrderStatus::AwaitingPayment);
        assert!(order.mark_paid(now()));
        assert_eq!(order.status(), OrderStatus::Paid);
    }

    #[test]
    fn test_mark_paid_from_processing_is_noop() {
        let mut order = order_in(OrderStatus::Processing);
        let before = order.updated_at();

        assert!(!order.mark_paid(now() + Duration::minutes(1)));
        assert_eq!(order.status(), OrderStatus::Processing);
        assert_eq!(order.updated_at(), before);
    }

    #[test]
    fn test_cancel_from_every_non_terminal_status() {
        for status in OrderStatus::ALL.into_iter().filter(|s| !s.is_terminal()) {
            let mut order = order_in(status);
            assert!(order.cancel(now()).is_ok(), "{status}");
            assert_eq!(order.status(), OrderStatus::Cancelled);
        }
    }

    #[test]
    fn test_cancel_from_terminal_status_fails() {
        for status in [OrderStatus::Delivered, OrderStatus::Cancelled] {
            let mut order = order_in(status);
            let result = order.cancel(now());
            assert!(matches!(
                result,
                Err(OrderError::InvalidStateTransition { current_state, .. }) if current_state == status
            ));
            assert_eq!(order.status(), status);
        }
    }

    #[test]
    fn test_advance_fulfillment() {
        let mut order = order_in(OrderStatus::Paid);
        order
            .advance_fulfillment(OrderStatus::Processing, now())
            .unwrap();
        order
            .advance_fulfillment(OrderStatus::Delivered, now())
            .unwrap();
        assert!(order.is_terminal());

        let result = order.advance_fulfillment(OrderStatus::OutForDelivery, now());
        assert!(matches!(result, Err(OrderError::InvalidStateTransition { .. })));
    }

    #[test]
    fn test_advance_fulfillment_rejects_payment_statuses() {
        let mut order = create_order();
        let result = order.advance_fulfillment(OrderStatus::Paid, now());
        assert!(matches!(result, Err(OrderError::InvalidStateTransition { .. })));
        assert_eq!(order.status(), OrderStatus::Created);
    }

    #[test]
    fn test_update_delivery_time() {
        let mut order = create_order();
        let later = now() + Duration::hours(2);

        order
            .update_delivery_time(now() + Duration::days(3), later)
            .unwrap();
        assert_eq!(order.delivery_time(), now() + Duration::days(3));
        assert_eq!(order.updated_at(), later);

        let result = order.update_delivery_time(later - Duration::minutes(1), later);
        assert!(matches!(result, Err(OrderError::InvalidDeliveryTime { .. })));
        assert_eq!(order.delivery_time(), now() + Duration::days(3));
    }

    #[test]
    fn test_updated_at_never_moves_backwards() {
        let mut order = create_order();
        order.mark_awaiting_payment(now() + Duration::hours(1));
        order.mark_paid(now() + Duration::minutes(30));

        assert_eq!(order.status(), OrderStatus::Paid);
        assert_eq!(order.updated_at(), now() + Duration::hours(1));
        assert_eq!(order.created_at(), now());
    }

    #[test]
    fn test_persisted_as_assigns_identity() {
        let id = OrderId::new();
        let order = create_order().persisted_as(id, Version::first());
        assert_eq!(order.id(), Some(id));
        assert_eq!(order.version(), Version::first());
    }

    #[test]
    fn test_serialization_keeps_snapshot() {
        let mut order = create_order().persisted_as(OrderId::new(), Version::first());
        order.set_delivery_slot(Some(SlotId::new("slot-1")), now());

        let json = serde_json::to_string(&order).unwrap();
        let deserialized: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, order);
    }
}
