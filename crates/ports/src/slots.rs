use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{OrderId, SlotId};
use domain::DeliverySlot;

use crate::SlotError;

/// Registry of delivery slots and their holders.
///
/// Implementations must make `reserve_slot` a single conditional step per
/// slot: two concurrent reservations of the same free slot by different
/// orders must see exactly one success.
#[async_trait]
pub trait SlotRegistry: Send + Sync {
    /// Free slots starting on `date`, ordered by start time.
    async fn get_available_slots(&self, date: NaiveDate) -> Result<Vec<DeliverySlot>, SlotError>;

    /// The slot whose window contains `at`, if any.
    async fn find_slot(&self, at: DateTime<Utc>) -> Result<Option<DeliverySlot>, SlotError>;

    /// Holds the slot for `order_id` if it is free or already held by it.
    async fn reserve_slot(&self, order_id: OrderId, slot_id: &SlotId) -> Result<(), SlotError>;

    /// Frees the slot if `order_id` holds it. Releasing twice is not an error.
    async fn release_slot(&self, order_id: OrderId, slot_id: &SlotId) -> Result<(), SlotError>;
}
