//! Order lifecycle events and the port that publishes them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use domain::{DeliveryAddress, Money, Order, OrderItem, OrderStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::PublishError;

pub const SUBJECT_ORDER_CREATED: &str = "order.created";
pub const SUBJECT_ORDER_STATUS_UPDATED: &str = "order.status.updated";
pub const SUBJECT_ORDER_CANCELLED: &str = "order.cancelled";

/// Kind of lifecycle change an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEventType {
    OrderCreated,
    OrderStatusUpdated,
    OrderCancelled,
}

impl OrderEventType {
    /// Message subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            OrderEventType::OrderCreated => SUBJECT_ORDER_CREATED,
            OrderEventType::OrderStatusUpdated => SUBJECT_ORDER_STATUS_UPDATED,
            OrderEventType::OrderCancelled => SUBJECT_ORDER_CANCELLED,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderEventType::OrderCreated => "order_created",
            OrderEventType::OrderStatusUpdated => "order_status_updated",
            OrderEventType::OrderCancelled => "order_cancelled",
        }
    }
}

impl std::fmt::Display for OrderEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Event envelope carrying a full snapshot of the order.
///
/// Delivery is at least once; consumers deduplicate on `event_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLifecycleEvent {
    pub event_id: Uuid,
    pub event_type: OrderEventType,
    #[serde(rename = "id")]
    pub order_id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total_price: Money,
    pub currency: String,
    pub delivery_address: Option<DeliveryAddress>,
    pub items: Vec<OrderItem>,
    pub timestamp: DateTime<Utc>,
}

impl OrderLifecycleEvent {
    /// Snapshots a persisted order into an event.
    pub fn from_order(
        event_type: OrderEventType,
        order: &Order,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, PublishError> {
        let order_id = order.id().ok_or(PublishError::MissingOrderId)?;
        Ok(Self {
            event_id: Uuid::new_v4(),
            event_type,
            order_id,
            user_id: order.user_id().clone(),
            status: order.status(),
            total_price: order.total_price(),
            currency: order.currency().to_string(),
            delivery_address: order.delivery_address().cloned(),
            items: order.items().to_vec(),
            timestamp,
        })
    }

    pub fn subject(&self) -> &'static str {
        self.event_type.subject()
    }

    /// Encodes the event as the JSON message body.
    pub fn to_payload(&self) -> Result<Vec<u8>, PublishError> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Asynchronous side channel for order lifecycle changes.
///
/// Implementors only provide `publish`; the typed helpers build the envelope
/// from the order snapshot.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: OrderLifecycleEvent) -> Result<(), PublishError>;

    async fn publish_order_created(
        &self,
        order: &Order,
        at: DateTime<Utc>,
    ) -> Result<(), PublishError> {
        let event = OrderLifecycleEvent::from_order(OrderEventType::OrderCreated, order, at)?;
        self.publish(event).await
    }

    async fn publish_order_status_updated(
        &self,
        order: &Order,
        at: DateTime<Utc>,
    ) -> Result<(), PublishError> {
        let event = OrderLifecycleEvent::from_order(OrderEventType::OrderStatusUpdated, order, at)?;
        self.publish(event).await
    }

    async fn publish_order_cancelled(
        &self,
        order: &Order,
        at: DateTime<Utc>,
    ) -> Result<(), PublishError> {
        let event = OrderLifecycleEvent::from_order(OrderEventType::OrderCancelled, order, at)?;
        self.publish(event).await
    }
}
