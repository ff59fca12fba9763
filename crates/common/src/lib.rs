//! Shared types for the order service crates.

pub mod clock;
pub mod context;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{Interrupted, OperationContext};
pub use types::{AddressId, OrderId, SlotId, UserId, Version};
