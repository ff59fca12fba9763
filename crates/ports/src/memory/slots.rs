use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use common::{OrderId, SlotId};
use domain::{DeliverySlot, SlotWindowError};

use super::{read, write};
use crate::{SlotError, SlotRegistry};

#[derive(Debug, Default)]
struct InMemorySlotState {
    slots: BTreeMap<SlotId, DeliverySlot>,
    fail_on_reserve: bool,
    fail_on_release: bool,
}

/// In-memory slot registry.
///
/// All slots sit behind one lock, so every reservation is linearised.
#[derive(Debug, Clone, Default)]
pub struct InMemorySlotRegistry {
    state: Arc<RwLock<InMemorySlotState>>,
}

impl InMemorySlotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the given slots.
    pub fn with_slots(slots: impl IntoIterator<Item = DeliverySlot>) -> Self {
        let registry = Self::new();
        for slot in slots {
            registry.add_slot(slot);
        }
        registry
    }

    /// Adds or replaces a slot.
    pub fn add_slot(&self, slot: DeliverySlot) {
        write(&self.state).slots.insert(slot.id().clone(), slot);
    }

    /// Opens back-to-back windows of `window_hours` between `opening_hour`
    /// and `closing_hour` (UTC) on each of `days` consecutive days.
    ///
    /// Slot ids have the form `YYYY-MM-DDTHH`. Returns the number of slots
    /// added.
    pub fn seed_daily(
        &self,
        first_day: NaiveDate,
        days: u32,
        opening_hour: u32,
        closing_hour: u32,
        window_hours: u32,
    ) -> Result<usize, SlotWindowError> {
        let mut added = 0;
        let step = window_hours.max(1);

        for day in first_day.iter_days().take(days as usize) {
            let mut hour = opening_hour;
            while hour + step <= closing_hour {
                let Some(start) = day.and_hms_opt(hour, 0, 0) else {
                    break;
                };
                let start = start.and_utc();
                let id = SlotId::new(format!("{}T{:02}", day.format("%Y-%m-%d"), hour));
                let slot = DeliverySlot::new(id, start, start + Duration::hours(i64::from(step)))?;
                self.add_slot(slot);
                added += 1;
                hour += step;
            }
        }

        Ok(added)
    }

    pub fn set_fail_on_reserve(&self, fail: bool) {
        write(&self.state).fail_on_reserve = fail;
    }

    pub fn set_fail_on_release(&self, fail: bool) {
        write(&self.state).fail_on_release = fail;
    }

    /// Order currently holding `slot_id`, if any.
    pub fn holder(&self, slot_id: &SlotId) -> Option<OrderId> {
        read(&self.state)
            .slots
            .get(slot_id)
            .and_then(|s| s.held_by())
    }

    pub fn slot_count(&self) -> usize {
        read(&self.state).slots.len()
    }
}

#[async_trait]
impl SlotRegistry for InMemorySlotRegistry {
    async fn get_available_slots(&self, date: NaiveDate) -> Result<Vec<DeliverySlot>, SlotError> {
        let state = read(&self.state);
        let mut slots: Vec<DeliverySlot> = state
            .slots
            .values()
            .filter(|s| s.date() == date && s.is_available())
            .cloned()
            .collect();
        slots.sort_by_key(|s| s.start());
        Ok(slots)
    }

    async fn find_slot(&self, at: DateTime<Utc>) -> Result<Option<DeliverySlot>, SlotError> {
        let state = read(&self.state);
        Ok(state
            .slots
            .values()
            .filter(|s| s.contains(at))
            .min_by_key(|s| s.start())
            .cloned())
    }

    async fn reserve_slot(&self, order_id: OrderId, slot_id: &SlotId) -> Result<(), SlotError> {
        let mut state = write(&self.state);
        if state.fail_on_reserve {
            return Err(SlotError::Backend("simulated reserve failure".to_string()));
        }

        let slot = state
            .slots
            .get_mut(slot_id)
            .ok_or_else(|| SlotError::NotFound(slot_id.clone()))?;
        slot.try_hold(order_id)
            .map_err(|held_by| SlotError::Unavailable {
                slot_id: slot_id.clone(),
                held_by,
            })
    }

    async fn release_slot(&self, order_id: OrderId, slot_id: &SlotId) -> Result<(), SlotError> {
        let mut state = write(&self.state);
        if state.fail_on_release {
            return Err(SlotError::Backend("simulated release failure".to_string()));
        }

        if let Some(slot) = state.slots.get_mut(slot_id) {
            slot.release(order_id);
        }
        Ok(())
    }
}
