//! Scoped delivery slot reservations.

use std::sync::Arc;
use std::time::Duration;

use common::{OrderId, SlotId};
use metrics::counter;
use ports::SlotRegistry;

/// A slot reservation that is released unless committed.
///
/// Created right before the registry call, so a reservation whose outcome
/// is unknown (cancelled mid-flight) is still released. Releasing a slot the
/// order does not hold is a no-op in the registry.
///
/// If the guard is dropped while still armed (for instance because the
/// caller dropped the operation future), the release is spawned onto the
/// current Tokio runtime.
pub struct SlotReservation<L: SlotRegistry + 'static> {
    slots: Arc<L>,
    order_id: OrderId,
    slot_id: SlotId,
    timeout: Duration,
    armed: bool,
}

impl<L: SlotRegistry + 'static> SlotReservation<L> {
    pub(crate) fn new(slots: Arc<L>, order_id: OrderId, slot_id: SlotId, timeout: Duration) -> Self {
        Self {
            slots,
            order_id,
            slot_id,
            timeout,
            armed: true,
        }
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn slot_id(&self) -> &SlotId {
        &self.slot_id
    }

    /// Keeps the reservation. The order now owns the slot.
    pub fn commit(mut self) {
        self.armed = false;
    }

    /// Releases the slot now. Returns false if the release failed or timed
    /// out.
    ///
    /// The guard stays armed until the release finishes, so dropping this
    /// future midway still releases in the background.
    pub async fn release(mut self) -> bool {
        let released =
            release_bounded(&*self.slots, self.order_id, &self.slot_id, self.timeout).await;
        self.armed = false;
        released
    }

    /// Drops the guard without releasing, for a reservation the registry
    /// refused outright.
    pub(crate) fn forget(mut self) {
        self.armed = false;
    }
}

impl<L: SlotRegistry + 'static> Drop for SlotReservation<L> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let slots = Arc::clone(&self.slots);
        let order_id = self.order_id;
        let slot_id = self.slot_id.clone();
        let timeout = self.timeout;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!(%order_id, %slot_id, "reservation dropped, releasing in background");
                handle.spawn(async move {
                    release_bounded(&*slots, order_id, &slot_id, timeout).await;
                });
            }
            Err(_) => {
                counter!("slot_release_failures_total").increment(1);
                tracing::error!(
                    %order_id,
                    %slot_id,
                    "reservation dropped outside a runtime, slot left held"
                );
            }
        }
    }
}

/// Releases `slot_id` for `order_id`, bounded by `timeout`.
///
/// Failures are logged and counted, never returned.
pub(crate) async fn release_bounded<L>(
    slots: &L,
    order_id: OrderId,
    slot_id: &SlotId,
    timeout: Duration,
) -> bool
where
    L: SlotRegistry + ?Sized,
{
    match tokio::time::timeout(timeout, slots.release_slot(order_id, slot_id)).await {
        Ok(Ok(())) => {
            counter!("slot_reservations_total", "outcome" => "released").increment(1);
            tracing::debug!(%order_id, %slot_id, "slot released");
            true
        }
        Ok(Err(e)) => {
            counter!("slot_release_failures_total").increment(1);
            tracing::error!(%order_id, %slot_id, error = %e, "slot release failed");
            false
        }
        Err(_) => {
            counter!("slot_release_failures_total").increment(1);
            tracing::error!(%order_id, %slot_id, ?timeout, "slot release timed out");
            false
        }
    }
}
