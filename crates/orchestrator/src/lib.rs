//! Order lifecycle orchestration.
//!
//! `OrderOrchestrator` is the only component that talks to more than one
//! port per operation. Every write follows the same protocol: validate on
//! the aggregate, reserve a delivery slot if one applies, write the store,
//! then invalidate the cache and publish the lifecycle event on a
//! best-effort basis. `AddressBook` covers the delivery address use cases.

pub mod addresses;
pub mod cache_keys;
mod cached;
pub mod commands;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod pagination;
pub mod reservation;

pub use addresses::AddressBook;
pub use commands::CreateOrder;
pub use config::OrchestratorConfig;
pub use error::{ErrorKind, OrchestratorError, Result, parse_address_id, parse_order_id};
pub use orchestrator::OrderOrchestrator;
pub use pagination::{MAX_PAGE_LIMIT, OrderPage, PageRequest};
pub use reservation::SlotReservation;
