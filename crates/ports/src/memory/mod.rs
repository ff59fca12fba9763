//! In-memory adapters for every port.
//!
//! Used by the test suites and by the bootstrap binary. Each adapter is a
//! cheap `Clone` handle over shared state and exposes `set_fail_on_*`
//! toggles so callers can simulate backend outages.

mod addresses;
mod cache;
mod events;
mod orders;
mod slots;

pub use addresses::InMemoryAddressStore;
pub use cache::InMemoryCache;
pub use events::InMemoryEventPublisher;
pub use orders::InMemoryOrderStore;
pub use slots::InMemorySlotRegistry;

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// None of the critical sections can leave state half-written, so a poisoned
// lock is still safe to use.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
