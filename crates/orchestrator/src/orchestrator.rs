//! The order orchestrator.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use common::{Clock, Interrupted, OperationContext, OrderId, UserId};
use domain::{AddressError, DeliveryAddress, DeliverySlot, Order, OrderError, OrderStatus};
use metrics::{counter, histogram};
use ports::{Cache, EventPublisher, OrderEventType, OrderStore, OrderStoreExt, SlotRegistry};
use uuid::Uuid;

use crate::reservation::{SlotReservation, release_bounded};
use crate::{
    CreateOrder, ErrorKind, OrchestratorConfig, OrchestratorError, OrderPage, PageRequest,
    Result, cache_keys, cached,
};

/// Coordinates the order store, cache, event stream and slot registry.
///
/// The store is the source of truth. For every write the orchestrator
/// reserves any needed delivery slot first, then writes the store, and
/// only after the store acknowledges does it touch the cache and publish.
/// Cache and publish failures are logged and never fail the operation.
/// Every port call is raced against the caller's `OperationContext`.
pub struct OrderOrchestrator<St, C, E, L>
where
    St: OrderStore,
    C: Cache,
    E: EventPublisher,
    L: SlotRegistry + 'static,
{
    store: St,
    cache: C,
    events: E,
    slots: Arc<L>,
    clock: Arc<dyn Clock>,
    config: OrchestratorConfig,
}

impl<St, C, E, L> OrderOrchestrator<St, C, E, L>
where
    St: OrderStore,
    C: Cache,
    E: EventPublisher,
    L: SlotRegistry + 'static,
{
    /// Creates a new orchestrator over the given ports.
    pub fn new(
        store: St,
        cache: C,
        events: E,
        slots: L,
        clock: Arc<dyn Clock>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            cache,
            events,
            slots: Arc::new(slots),
            clock,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Places a new order.
    ///
    /// If a delivery slot covers the requested time it is reserved before the
    /// order is written; a held slot fails the call with nothing persisted.
    /// A failed or interrupted store write releases the reservation.
    #[tracing::instrument(skip(self, ctx, cmd), fields(user_id = %cmd.user_id, order_id = tracing::field::Empty))]
    pub async fn create_order(&self, ctx: &OperationContext, cmd: CreateOrder) -> Result<Order> {
        let started = Instant::now();
        let result = self.place_order(ctx, cmd).await;
        observe("create_order", started, &result);
        result
    }

    /// Returns an order, reading through the cache.
    #[tracing::instrument(skip(self, ctx), fields(order_id = %order_id))]
    pub async fn get_order(&self, ctx: &OperationContext, order_id: OrderId) -> Result<Order> {
        let started = Instant::now();
        let result = self.read_order(ctx, order_id).await;
        observe("get_order", started, &result);
        result
    }

    /// Moves an order to `status`.
    ///
    /// `Cancelled` is handled by [`Self::cancel_order`]. A transition the
    /// state machine does not allow, including one the aggregate silently
    /// ignores, fails with `InvalidStateTransition` before any write.
    #[tracing::instrument(skip(self, ctx), fields(order_id = %order_id, status = %status))]
    pub async fn update_order_status(
        &self,
        ctx: &OperationContext,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Order> {
        if status == OrderStatus::Cancelled {
            return self.cancel_order(ctx, order_id).await;
        }

        let started = Instant::now();
        let result = self.change_status(ctx, order_id, status).await;
        observe("update_order_status", started, &result);
        result
    }

    /// Cancels an order and frees its delivery slot.
    #[tracing::instrument(skip(self, ctx), fields(order_id = %order_id))]
    pub async fn cancel_order(&self, ctx: &OperationContext, order_id: OrderId) -> Result<Order> {
        let started = Instant::now();
        let result = self.cancel(ctx, order_id).await;
        observe("cancel_order", started, &result);
        result
    }

    /// Replaces the delivery address snapshot of an order.
    ///
    /// The address must belong to the order's user. No event is published.
    #[tracing::instrument(skip(self, ctx, address), fields(order_id = %order_id))]
    pub async fn update_delivery_address(
        &self,
        ctx: &OperationContext,
        order_id: OrderId,
        address: DeliveryAddress,
    ) -> Result<Order> {
        let started = Instant::now();
        let result = self.change_address(ctx, order_id, address).await;
        observe("update_delivery_address", started, &result);
        result
    }

    /// Changes the requested delivery time of an order.
    ///
    /// When the new time falls in a different slot, the new slot is reserved
    /// before the write and the old one released after it. No event is
    /// published.
    #[tracing::instrument(skip(self, ctx), fields(order_id = %order_id))]
    pub async fn update_delivery_time(
        &self,
        ctx: &OperationContext,
        order_id: OrderId,
        delivery_time: DateTime<Utc>,
    ) -> Result<Order> {
        let started = Instant::now();
        let result = self.change_delivery_time(ctx, order_id, delivery_time).await;
        observe("update_delivery_time", started, &result);
        result
    }

    /// Returns one page of a user's orders, newest first.
    ///
    /// Pages are 1-indexed; `limit` is capped at [`crate::MAX_PAGE_LIMIT`].
    #[tracing::instrument(skip(self, ctx), fields(user_id = %user_id))]
    pub async fn list_orders(
        &self,
        ctx: &OperationContext,
        user_id: &UserId,
        page: u32,
        limit: u32,
    ) -> Result<OrderPage> {
        let started = Instant::now();
        let result = self.read_order_page(ctx, user_id, page, limit).await;
        observe("list_orders", started, &result);
        result
    }

    /// Returns the free delivery slots of a day, reading through the cache.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn available_slots(
        &self,
        ctx: &OperationContext,
        date: NaiveDate,
    ) -> Result<Vec<DeliverySlot>> {
        let started = Instant::now();
        let result = self.read_slots(ctx, date).await;
        observe("available_slots", started, &result);
        result
    }
}

// Operation bodies
impl<St, C, E, L> OrderOrchestrator<St, C, E, L>
where
    St: OrderStore,
    C: Cache,
    E: EventPublisher,
    L: SlotRegistry + 'static,
{
    async fn place_order(&self, ctx: &OperationContext, cmd: CreateOrder) -> Result<Order> {
        let now = self.clock.now();
        let mut order = Order::new(
            cmd.user_id,
            cmd.items,
            cmd.delivery_address,
            cmd.delivery_time,
            now,
        )?;
        if let Some(currency) = cmd.currency {
            order = order.with_currency(currency);
        }

        let order_id = OrderId::new();
        tracing::Span::current().record("order_id", tracing::field::display(order_id));

        let reservation = match ctx.run(self.slots.find_slot(order.delivery_time())).await?? {
            Some(slot) => {
                let reservation = self.reserve(ctx, order_id, &slot).await?;
                order.set_delivery_slot(Some(slot.id().clone()), now);
                Some((reservation, slot.date()))
            }
            None => None,
        };

        let stored = match flatten(ctx.run(self.store.create(order_id, order)).await) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(error = %e, "order not persisted");
                if let Some((reservation, _)) = reservation {
                    reservation.release().await;
                }
                return Err(e);
            }
        };
        let slot_date = reservation.map(|(reservation, date)| {
            reservation.commit();
            date
        });

        counter!("orders_created_total").increment(1);
        tracing::info!(total = %stored.total_price(), slot = ?stored.delivery_slot(), "order created");

        if let Some(token) = self.order_token(ctx, order_id).await {
            cached::write_json(
                ctx,
                &self.cache,
                &cache_keys::order_entry(order_id, &token),
                &stored,
                self.config.order_cache_ttl_secs,
            )
            .await;
        }

        let mut stale = vec![cache_keys::order_list_namespace(stored.user_id())];
        stale.extend(slot_date.map(cache_keys::slots));
        self.invalidate(&stale).await;

        self.publish(ctx, OrderEventType::OrderCreated, &stored).await;
        Ok(stored)
    }

    async fn read_order(&self, ctx: &OperationContext, order_id: OrderId) -> Result<Order> {
        let key = self
            .order_token(ctx, order_id)
            .await
            .map(|token| cache_keys::order_entry(order_id, &token));

        if let Some(key) = &key {
            let hit: Option<Order> = cached::read_json(ctx, &self.cache, key).await;
            if let Some(order) = hit {
                tracing::debug!("order cache hit");
                return Ok(order);
            }
        }

        let order = self.load(ctx, order_id).await?;
        if let Some(key) = &key {
            cached::write_json(ctx, &self.cache, key, &order, self.config.order_cache_ttl_secs)
                .await;
        }
        Ok(order)
    }

    async fn change_status(
        &self,
        ctx: &OperationContext,
        order_id: OrderId,
        target: OrderStatus,
    ) -> Result<Order> {
        let mut order = self.load(ctx, order_id).await?;
        let current = order.status();
        let now = self.clock.now();

        let applied = match target {
            OrderStatus::AwaitingPayment => order.mark_awaiting_payment(now),
            OrderStatus::Paid => order.mark_paid(now),
            status if status.is_fulfillment() => {
                order.advance_fulfillment(status, now)?;
                true
            }
            _ => false,
        };
        if !applied {
            return Err(OrchestratorError::invalid_transition(
                current,
                format!("move to {target}"),
            ));
        }

        let stored = ctx
            .run(self.store.update_status(
                order_id,
                order.status(),
                order.updated_at(),
                order.version(),
            ))
            .await??;

        counter!("order_status_updates_total", "status" => target.as_str()).increment(1);
        tracing::info!(from = %current, to = %target, "order status updated");

        self.invalidate(&[
            cache_keys::order_namespace(order_id),
            cache_keys::order_list_namespace(stored.user_id()),
        ])
        .await;
        self.publish(ctx, OrderEventType::OrderStatusUpdated, &stored)
            .await;
        Ok(stored)
    }

    async fn cancel(&self, ctx: &OperationContext, order_id: OrderId) -> Result<Order> {
        let mut order = self.load(ctx, order_id).await?;
        let now = self.clock.now();

        order.cancel(now)?;
        let held = order.delivery_slot().cloned();
        order.set_delivery_slot(None, now);

        let stored = ctx.run(self.store.update(order)).await??;

        counter!("order_status_updates_total", "status" => OrderStatus::Cancelled.as_str())
            .increment(1);
        tracing::info!(released_slot = ?held, "order cancelled");

        let mut stale = vec![
            cache_keys::order_namespace(order_id),
            cache_keys::order_list_namespace(stored.user_id()),
        ];
        if let Some(slot_id) = &held {
            release_bounded(
                &*self.slots,
                order_id,
                slot_id,
                self.config.compensation_timeout,
            )
            .await;
            stale.push(cache_keys::slots(stored.delivery_time().date_naive()));
        }
        self.invalidate(&stale).await;

        self.publish(ctx, OrderEventType::OrderCancelled, &stored)
            .await;
        Ok(stored)
    }

    async fn change_address(
        &self,
        ctx: &OperationContext,
        order_id: OrderId,
        address: DeliveryAddress,
    ) -> Result<Order> {
        let mut order = self.load(ctx, order_id).await?;
        if order.is_terminal() {
            return Err(OrchestratorError::invalid_transition(
                order.status(),
                "change delivery address",
            ));
        }
        if address.user_id() != order.user_id() {
            return Err(AddressError::InvalidUserId.into());
        }
        address.validate()?;

        order.update_delivery_address(address, self.clock.now());
        let stored = ctx.run(self.store.update(order)).await??;
        tracing::info!("delivery address updated");

        self.invalidate(&[
            cache_keys::order_namespace(order_id),
            cache_keys::order_list_namespace(stored.user_id()),
        ])
        .await;
        Ok(stored)
    }

    async fn change_delivery_time(
        &self,
        ctx: &OperationContext,
        order_id: OrderId,
        delivery_time: DateTime<Utc>,
    ) -> Result<Order> {
        let mut order = self.load(ctx, order_id).await?;
        if order.is_terminal() {
            return Err(OrchestratorError::invalid_transition(
                order.status(),
                "change delivery time",
            ));
        }

        let now = self.clock.now();
        let previous_time = order.delivery_time();
        order.update_delivery_time(delivery_time, now)?;

        let previous_slot = order.delivery_slot().cloned();
        let next_slot = ctx.run(self.slots.find_slot(delivery_time)).await??;
        let moved = next_slot.as_ref().map(|s| s.id()) != previous_slot.as_ref();

        let mut reservation = None;
        if moved {
            if let Some(slot) = &next_slot {
                reservation = Some(self.reserve(ctx, order_id, slot).await?);
            }
            order.set_delivery_slot(next_slot.as_ref().map(|s| s.id().clone()), now);
        }

        let stored = match flatten(ctx.run(self.store.update(order)).await) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(error = %e, "delivery time not persisted");
                if let Some(reservation) = reservation {
                    reservation.release().await;
                }
                return Err(e);
            }
        };
        if let Some(reservation) = reservation {
            reservation.commit();
        }
        tracing::info!(slot = ?stored.delivery_slot(), "delivery time updated");

        let mut stale = vec![
            cache_keys::order_namespace(order_id),
            cache_keys::order_list_namespace(stored.user_id()),
        ];
        if moved {
            if let Some(old) = &previous_slot {
                release_bounded(&*self.slots, order_id, old, self.config.compensation_timeout)
                    .await;
                stale.push(cache_keys::slots(previous_time.date_naive()));
            }
            if let Some(slot) = &next_slot {
                stale.push(cache_keys::slots(slot.date()));
            }
        }
        self.invalidate(&stale).await;
        Ok(stored)
    }

    async fn read_order_page(
        &self,
        ctx: &OperationContext,
        user_id: &UserId,
        page: u32,
        limit: u32,
    ) -> Result<OrderPage> {
        if user_id.is_blank() {
            return Err(OrderError::InvalidUserId.into());
        }
        let request = PageRequest::new(page, limit)?;

        let page_key = self
            .namespace(
                ctx,
                &cache_keys::order_list_namespace(user_id),
                self.config.order_list_cache_ttl_secs,
            )
            .await
            .map(|token| cache_keys::order_list_page(user_id, &token, page, limit));

        if let Some(key) = &page_key {
            let hit: Option<OrderPage> = cached::read_json(ctx, &self.cache, key).await;
            if let Some(cached_page) = hit {
                tracing::debug!("order page cache hit");
                return Ok(cached_page);
            }
        }

        let (orders, total) = ctx
            .run(
                self.store
                    .get_by_user_id(user_id, request.page(), request.limit()),
            )
            .await??;
        let result = OrderPage {
            orders,
            total,
            page: request.page(),
            limit: request.limit(),
        };

        if let Some(key) = &page_key {
            cached::write_json(
                ctx,
                &self.cache,
                key,
                &result,
                self.config.order_list_cache_ttl_secs,
            )
            .await;
        }
        Ok(result)
    }

    async fn read_slots(&self, ctx: &OperationContext, date: NaiveDate) -> Result<Vec<DeliverySlot>> {
        let key = cache_keys::slots(date);
        let hit: Option<Vec<DeliverySlot>> = cached::read_json(ctx, &self.cache, &key).await;
        if let Some(slots) = hit {
            return Ok(slots);
        }

        let slots = ctx.run(self.slots.get_available_slots(date)).await??;
        cached::write_json(ctx, &self.cache, &key, &slots, self.config.slot_cache_ttl_secs).await;
        Ok(slots)
    }
}

// Shared steps
impl<St, C, E, L> OrderOrchestrator<St, C, E, L>
where
    St: OrderStore,
    C: Cache,
    E: EventPublisher,
    L: SlotRegistry + 'static,
{
    /// Loads an order from the store, bypassing the cache.
    async fn load(&self, ctx: &OperationContext, order_id: OrderId) -> Result<Order> {
        Ok(ctx.run(self.store.require(order_id)).await??)
    }

    /// Reserves `slot` for the order and returns the guard that undoes it.
    async fn reserve(
        &self,
        ctx: &OperationContext,
        order_id: OrderId,
        slot: &DeliverySlot,
    ) -> Result<SlotReservation<L>> {
        let reservation = SlotReservation::new(
            Arc::clone(&self.slots),
            order_id,
            slot.id().clone(),
            self.config.compensation_timeout,
        );

        match ctx.run(self.slots.reserve_slot(order_id, slot.id())).await {
            Ok(Ok(())) => {
                counter!("slot_reservations_total", "outcome" => "reserved").increment(1);
                tracing::debug!(slot_id = %slot.id(), "slot reserved");
                Ok(reservation)
            }
            Ok(Err(e)) => {
                let err = OrchestratorError::from(e);
                if err.kind() == ErrorKind::SlotUnavailable {
                    counter!("slot_reservations_total", "outcome" => "rejected").increment(1);
                    reservation.forget();
                } else {
                    reservation.release().await;
                }
                Err(err)
            }
            Err(interrupted) => {
                reservation.release().await;
                Err(interrupted.into())
            }
        }
    }

    async fn order_token(&self, ctx: &OperationContext, order_id: OrderId) -> Option<String> {
        self.namespace(
            ctx,
            &cache_keys::order_namespace(order_id),
            self.config.order_cache_ttl_secs,
        )
        .await
    }

    /// Current token stored under namespace `key`, creating one if missing.
    ///
    /// None means the cache is unusable and nothing under the namespace
    /// should be cached.
    async fn namespace(&self, ctx: &OperationContext, key: &str, ttl_seconds: u64) -> Option<String> {
        match cached::read_raw(ctx, &self.cache, key).await {
            Ok(Some(token)) => Some(token),
            Ok(None) => {
                let token = Uuid::new_v4().simple().to_string();
                cached::write_raw(ctx, &self.cache, key, token.clone(), ttl_seconds)
                    .await
                    .then_some(token)
            }
            Err(_) => None,
        }
    }

    async fn invalidate(&self, keys: &[String]) {
        cached::invalidate(&self.cache, keys, self.config.compensation_timeout).await;
    }

    async fn publish(&self, ctx: &OperationContext, event_type: OrderEventType, order: &Order) {
        let at = self.clock.now();
        let send = async {
            match event_type {
                OrderEventType::OrderCreated => self.events.publish_order_created(order, at).await,
                OrderEventType::OrderStatusUpdated => {
                    self.events.publish_order_status_updated(order, at).await
                }
                OrderEventType::OrderCancelled => {
                    self.events.publish_order_cancelled(order, at).await
                }
            }
        };

        match ctx.run(send).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                counter!("event_publish_failures_total", "event_type" => event_type.as_str())
                    .increment(1);
                tracing::error!(%event_type, error = %e, "failed to publish order event");
            }
            Err(interrupted) => {
                counter!("event_publish_failures_total", "event_type" => event_type.as_str())
                    .increment(1);
                tracing::warn!(%event_type, reason = %interrupted, "order event not published");
            }
        }
    }
}

pub(crate) fn flatten<T, E>(outcome: std::result::Result<std::result::Result<T, E>, Interrupted>) -> Result<T>
where
    E: Into<OrchestratorError>,
{
    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.into()),
        Err(interrupted) => Err(interrupted.into()),
    }
}

fn observe<T>(operation: &'static str, started: Instant, result: &Result<T>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.kind().as_str(),
    };
    histogram!(
        "order_operation_duration_seconds",
        "operation" => operation,
        "outcome" => outcome
    )
    .record(started.elapsed().as_secs_f64());
}
