//! Domain layer for the order service.
//!
//! This crate provides the aggregates and values the orchestration layer
//! works with:
//! - Order aggregate with its status state machine
//! - DeliveryAddress aggregate with field validation
//! - DeliverySlot with exclusive holding rules
//!
//! Nothing here performs I/O; every time-dependent method takes `now`.

pub mod address;
pub mod error;
pub mod order;
pub mod slot;

pub use address::{AddressError, AddressFields, DeliveryAddress};
pub use error::DomainError;
pub use order::{DEFAULT_CURRENCY, Money, Order, OrderError, OrderItem, OrderStatus, ProductId};
pub use slot::{DeliverySlot, SlotWindowError};
