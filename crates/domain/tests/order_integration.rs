//! Integration tests for the order and address aggregates.
//!
//! These exercise the public API end to end: construction, the status state
//! machine across every starting status, and snapshot round trips through
//! JSON as the cache stores them.

use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{AddressId, OrderId, SlotId, UserId, Version};
use domain::{
    AddressFields, DeliveryAddress, DomainError, Money, Order, OrderError, OrderItem, OrderStatus,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
}

fn address() -> DeliveryAddress {
    DeliveryAddress::new(
        UserId::new("user-1"),
        AddressFields {
            full_name: "John Doe".to_string(),
            street_address: "123 Main Street".to_string(),
            apartment: None,
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            postal_code: "62704".to_string(),
            country: "USA".to_string(),
            phone: "+12025550123".to_string(),
        },
        true,
    )
    .unwrap()
}

fn order() -> Order {
    Order::new(
        UserId::new("user-1"),
        vec![
            OrderItem::priced("SKU-001", "Widget", 2, Money::from_minor_units(1000)).unwrap(),
            OrderItem::priced("SKU-002", "Gadget", 1, Money::from_minor_units(2500)).unwrap(),
        ],
        Some(address()),
        now() + Duration::days(1),
        now(),
    )
    .unwrap()
}

/// Builds an order sitting in `status`, without going through the store.
fn order_in(status: OrderStatus) -> Order {
    let mut order = order();
    order.overwrite_status(status, now());
    order
}

mod construction {
    use super::*;

    #[test]
    fn new_order_totals_its_lines() {
        let order = order();
        assert_eq!(order.status(), OrderStatus::Created);
        assert_eq!(order.total_price(), Money::from_minor_units(4500));
        assert_eq!(order.currency(), "USD");
        assert_eq!(order.created_at(), order.updated_at());
        assert_eq!(order.id(), None);
        assert_eq!(order.version(), Version::initial());
    }

    #[test]
    fn reported_line_totals_must_match() {
        let result = OrderItem::new(
            "SKU-001",
            "Widget",
            2,
            Money::from_minor_units(1000),
            Money::from_minor_units(1999),
        );
        assert!(matches!(result, Err(OrderError::LineTotalMismatch { .. })));
    }

    #[test]
    fn zero_priced_order_is_rejected() {
        let result = Order::new(
            UserId::new("user-1"),
            vec![OrderItem::priced("SKU-FREE", "Sample", 1, Money::zero()).unwrap()],
            None,
            now() + Duration::days(1),
            now(),
        );
        assert!(matches!(result, Err(OrderError::InvalidTotalPrice { .. })));
    }

    #[test]
    fn validation_errors_lift_into_domain_error() {
        let err: DomainError = Order::new(
            UserId::new(""),
            vec![],
            None,
            now() + Duration::days(1),
            now(),
        )
        .unwrap_err()
        .into();
        assert_eq!(err, DomainError::Order(OrderError::InvalidUserId));
        assert_eq!(err.to_string(), "Order error: invalid user ID");
    }
}

mod state_machine {
    use super::*;

    #[test]
    fn awaiting_payment_only_from_created() {
        for status in OrderStatus::ALL {
            let mut order = order_in(status);
            let applied = order.mark_awaiting_payment(now());
            assert_eq!(applied, status == OrderStatus::Created, "{status}");
            if !applied {
                assert_eq!(order.status(), status);
            }
        }
    }

    #[test]
    fn paid_from_created_or_awaiting_payment() {
        for status in OrderStatus::ALL {
            let mut order = order_in(status);
            let applied = order.mark_paid(now());
            let expected = matches!(status, OrderStatus::Created | OrderStatus::AwaitingPayment);
            assert_eq!(applied, expected, "{status}");
        }
    }

    #[test]
    fn cancel_from_any_non_terminal_status() {
        for status in OrderStatus::ALL {
            let mut order = order_in(status);
            let result = order.cancel(now());
            let allowed = !status.is_terminal();
            assert_eq!(result.is_ok(), allowed, "{status}");
            if !allowed {
                assert_eq!(
                    result,
                    Err(OrderError::InvalidStateTransition {
                        current_state: status,
                        action: "cancel",
                    })
                );
                assert_eq!(order.status(), status);
            }
        }
    }

    #[test]
    fn fulfilment_never_leaves_terminal_status() {
        for terminal in [OrderStatus::Delivered, OrderStatus::Cancelled] {
            let mut order = order_in(terminal);
            assert!(
                order
                    .advance_fulfillment(OrderStatus::Processing, now())
                    .is_err()
            );
            assert_eq!(order.status(), terminal);
        }
    }

    #[test]
    fn full_happy_path_keeps_updated_at_monotonic() {
        let mut order = order();
        let mut at = now();
        let mut last = order.updated_at();

        at += Duration::minutes(1);
        assert!(order.mark_awaiting_payment(at));
        at += Duration::minutes(1);
        assert!(order.mark_paid(at));
        for status in [
            OrderStatus::Processing,
            OrderStatus::ReadyForDelivery,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
        ] {
            at += Duration::minutes(1);
            order.advance_fulfillment(status, at).unwrap();
            assert!(order.updated_at() > last);
            last = order.updated_at();
        }

        assert!(order.is_terminal());
        assert!(order.updated_at() >= order.created_at());
    }
}

mod snapshots {
    use super::*;

    #[test]
    fn persisted_order_survives_json_round_trip() {
        let id = OrderId::new();
        let mut order = order().persisted_as(id, Version::first());
        order.set_delivery_slot(Some(SlotId::new("2026-10-17T09")), now());

        let json = serde_json::to_string(&order).unwrap();
        let back: Order = serde_json::from_str(&json).unwrap();

        assert_eq!(back, order);
        assert_eq!(back.id(), Some(id));
        assert!(json.contains("\"status\":\"CREATED\""));
    }

    #[test]
    fn address_snapshot_keeps_identity() {
        let id = AddressId::new();
        let address = address().persisted_as(id);
        let order = Order::new(
            UserId::new("user-1"),
            vec![OrderItem::priced("SKU-001", "Widget", 1, Money::from_minor_units(100)).unwrap()],
            Some(address.clone()),
            now() + Duration::hours(2),
            now(),
        )
        .unwrap();

        assert_eq!(order.delivery_address().and_then(|a| a.id()), Some(id));
        assert_eq!(
            order.delivery_address().map(|a| a.format_full()),
            Some(address.format_full())
        );
    }
}
