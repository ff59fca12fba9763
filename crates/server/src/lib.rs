//! Operational server for the order orchestrator.
//!
//! Wires the orchestrator and the address book over the in-memory adapters
//! and exposes `/health` and `/metrics`.
//!
//! The `server` binary is a wiring host only: it builds [`AppState`] and
//! serves the operational endpoints, but never calls an order or address
//! operation itself. Those are driven by code embedding this crate through
//! [`AppState::orchestrator`] and [`AppState::addresses`]; there is no HTTP
//! surface for them.

pub mod config;
pub mod routes;

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::routing::get;
use chrono::{NaiveDate, Utc};
use common::SystemClock;
use domain::SlotWindowError;
use metrics::gauge;
use metrics_exporter_prometheus::PrometheusHandle;
use orchestrator::{AddressBook, OrderOrchestrator};
use ports::{
    InMemoryAddressStore, InMemoryCache, InMemoryEventPublisher, InMemoryOrderStore,
    InMemorySlotRegistry, RetryingPublisher,
};
use tower_http::trace::TraceLayer;

use config::Config;

pub type Orchestrator = OrderOrchestrator<
    InMemoryOrderStore,
    InMemoryCache,
    RetryingPublisher<InMemoryEventPublisher>,
    InMemorySlotRegistry,
>;

pub type Addresses = AddressBook<InMemoryAddressStore, InMemoryCache>;

const OPENING_HOUR: u32 = 9;
const CLOSING_HOUR: u32 = 21;
const SLOT_WINDOW_HOURS: u32 = 2;

/// Shared application state.
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub addresses: Addresses,
    /// Handle on the registry the orchestrator reserves from.
    pub slots: InMemorySlotRegistry,
    /// Handle on the event stream behind the retrying publisher.
    pub events: InMemoryEventPublisher,
    pub started_at: Instant,
}

/// Creates the default application state over the in-memory adapters.
///
/// Delivery slots are opened for `config.slot_seed_days` days starting at
/// `first_day`.
pub fn create_default_state(
    config: &Config,
    first_day: NaiveDate,
) -> Result<Arc<AppState>, SlotWindowError> {
    let cache = InMemoryCache::new();
    let events = InMemoryEventPublisher::new();
    let slots = InMemorySlotRegistry::new();

    let seeded = slots.seed_daily(
        first_day,
        config.slot_seed_days,
        OPENING_HOUR,
        CLOSING_HOUR,
        SLOT_WINDOW_HOURS,
    )?;
    gauge!("delivery_slots_seeded").set(seeded as f64);
    tracing::info!(seeded, %first_day, days = config.slot_seed_days, "delivery slots opened");

    let orchestrator = OrderOrchestrator::new(
        InMemoryOrderStore::new(),
        cache.clone(),
        RetryingPublisher::new(events.clone(), config.orchestrator.retry_config()),
        slots.clone(),
        Arc::new(SystemClock),
        config.orchestrator.clone(),
    );
    let addresses = AddressBook::new(
        InMemoryAddressStore::new(),
        cache,
        config.orchestrator.clone(),
    );

    Ok(Arc::new(AppState {
        orchestrator,
        addresses,
        slots,
        events,
        started_at: Instant::now(),
    }))
}

/// Same as [`create_default_state`], opening slots from today (UTC).
pub fn create_state_from_today(config: &Config) -> Result<Arc<AppState>, SlotWindowError> {
    create_default_state(config, Utc::now().date_naive())
}

/// Creates the Axum application router.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .with_state(state)
        .merge(metrics_router)
        .layer(TraceLayer::new_for_http())
}
