//! Value objects for the order domain.

use serde::{Deserialize, Serialize};

use super::OrderError;

/// Product identifier (SKU).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a new product ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the product ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Money amount held in minor units (cents for USD) to avoid floating point
/// drift when summing line totals.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a money amount from minor units (e.g. 1000 = 10.00).
    pub fn from_minor_units(units: i64) -> Self {
        Self(units)
    }

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn minor_units(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Adds two amounts, returning `None` on overflow.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Multiplies by a quantity, returning `None` on overflow.
    pub fn checked_mul(&self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(i64::from(quantity)).map(Money)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

/// A line of an order.
///
/// The line total is supplied by the caller (it is what the customer was
/// quoted) and checked against `quantity × unit_price` once, here. It is
/// never recomputed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    product_id: ProductId,
    product_name: String,
    quantity: u32,
    unit_price: Money,
    total_price: Money,
}

impl OrderItem {
    /// Creates an order item with a caller-supplied line total.
    pub fn new(
        product_id: impl Into<ProductId>,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
        total_price: Money,
    ) -> Result<Self, OrderError> {
        let product_id = product_id.into();

        if quantity == 0 {
            return Err(OrderError::InvalidQuantity { quantity });
        }
        if unit_price.is_negative() {
            return Err(OrderError::InvalidUnitPrice { price: unit_price });
        }

        let expected = unit_price
            .checked_mul(quantity)
            .ok_or(OrderError::InvalidUnitPrice { price: unit_price })?;
        if expected != total_price {
            return Err(OrderError::LineTotalMismatch {
                product_id: product_id.to_string(),
                expected,
                actual: total_price,
            });
        }

        Ok(Self {
            product_id,
            product_name: product_name.into(),
            quantity,
            unit_price,
            total_price,
        })
    }

    /// Creates an order item whose line total is `quantity × unit_price`.
    pub fn priced(
        product_id: impl Into<ProductId>,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Result<Self, OrderError> {
        let total = unit_price
            .checked_mul(quantity)
            .ok_or(OrderError::InvalidUnitPrice { price: unit_price })?;
        Self::new(product_id, product_name, quantity, unit_price, total)
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn total_price(&self) -> Money {
        self.total_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_id_string_conversion() {
        let id = ProductId::new("SKU-001");
        assert_eq!(id.as_str(), "SKU-001");

        let id2: ProductId = "SKU-002".into();
        assert_eq!(id2.as_str(), "SKU-002");
    }

    #[test]
    fn test_money_units() {
        assert_eq!(Money::from_minor_units(1234).minor_units(), 1234);
        assert_eq!(Money::zero().minor_units(), 0);
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_minor_units(1234).to_string(), "12.34");
        assert_eq!(Money::from_minor_units(100).to_string(), "1.00");
        assert_eq!(Money::from_minor_units(5).to_string(), "0.05");
        assert_eq!(Money::from_minor_units(-1234).to_string(), "-12.34");
    }

    #[test]
    fn test_money_checked_arithmetic() {
        let a = Money::from_minor_units(1000);
        assert_eq!(a.checked_mul(3), Some(Money::from_minor_units(3000)));
        assert_eq!(a.checked_add(a), Some(Money::from_minor_units(2000)));
        assert_eq!(Money::from_minor_units(i64::MAX).checked_mul(2), None);
        assert_eq!(
            Money::from_minor_units(i64::MAX).checked_add(Money::from_minor_units(1)),
            None
        );
    }

    #[test]
    fn test_priced_item_computes_line_total() {
        let item = OrderItem::priced("SKU-001", "Widget", 3, Money::from_minor_units(1000)).unwrap();
        assert_eq!(item.total_price().minor_units(), 3000);
        assert_eq!(item.quantity(), 3);
        assert_eq!(item.product_name(), "Widget");
    }

    #[test]
    fn test_item_with_matching_total() {
        let item = OrderItem::new(
            "SKU-001",
            "Widget",
            2,
            Money::from_minor_units(999),
            Money::from_minor_units(1998),
        );
        assert!(item.is_ok());
    }

    #[test]
    fn test_item_with_wrong_total_is_rejected() {
        let result = OrderItem::new(
            "SKU-001",
            "Widget",
            2,
            Money::from_minor_units(999),
            Money::from_minor_units(2000),
        );
        assert!(matches!(
            result,
            Err(OrderError::LineTotalMismatch { expected, .. }) if expected.minor_units() == 1998
        ));
    }

    #[test]
    fn test_zero_quantity_is_rejected() {
        let result = OrderItem::priced("SKU-001", "Widget", 0, Money::from_minor_units(100));
        assert!(matches!(result, Err(OrderError::InvalidQuantity { quantity: 0 })));
    }

    #[test]
    fn test_negative_unit_price_is_rejected() {
        let result = OrderItem::priced("SKU-001", "Widget", 1, Money::from_minor_units(-100));
        assert!(matches!(result, Err(OrderError::InvalidUnitPrice { .. })));
    }
}
