//! Delivery time slots.

use chrono::{DateTime, NaiveDate, Utc};
use common::{OrderId, SlotId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A slot window whose end is not after its start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("slot {id} has an empty window: {start} .. {end}")]
pub struct SlotWindowError {
    pub id: SlotId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// A delivery window that at most one order can hold at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySlot {
    id: SlotId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    /// Order currently holding the slot.
    order_id: Option<OrderId>,
}

impl DeliverySlot {
    /// Creates a free slot covering `[start, end)`.
    pub fn new(id: SlotId, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, SlotWindowError> {
        if end <= start {
            return Err(SlotWindowError { id, start, end });
        }
        Ok(Self {
            id,
            start,
            end,
            order_id: None,
        })
    }

    pub fn id(&self) -> &SlotId {
        &self.id
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Calendar day (UTC) the slot starts on.
    pub fn date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    pub fn is_available(&self) -> bool {
        self.order_id.is_none()
    }

    pub fn held_by(&self) -> Option<OrderId> {
        self.order_id
    }

    /// Returns true if `at` falls inside the window.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    /// Takes the slot for `order_id` if it is free.
    ///
    /// Holding it already for the same order succeeds. If another order holds
    /// it, that order's id is returned as the error.
    pub fn try_hold(&mut self, order_id: OrderId) -> Result<(), OrderId> {
        match self.order_id {
            None => {
                self.order_id = Some(order_id);
                Ok(())
            }
            Some(holder) if holder == order_id => Ok(()),
            Some(holder) => Err(holder),
        }
    }

    /// Frees the slot if `order_id` holds it. Returns whether anything changed.
    pub fn release(&mut self, order_id: OrderId) -> bool {
        if self.order_id == Some(order_id) {
            self.order_id = None;
            true
        } else {
            false
        }
    }
}
