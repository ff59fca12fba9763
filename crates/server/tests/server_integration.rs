//! Integration tests for the operational endpoints.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{NaiveDate, TimeZone, Utc};
use common::{OperationContext, UserId};
use domain::{AddressFields, Money, OrderItem};
use metrics_exporter_prometheus::PrometheusHandle;
use orchestrator::CreateOrder;
use ports::OrderEventType;
use server::AppState;
use server::config::Config;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn config() -> Config {
    Config {
        slot_seed_days: 2,
        ..Config::default()
    }
}

fn setup() -> (axum::Router, Arc<AppState>) {
    let first_day = NaiveDate::from_ymd_opt(2099, 1, 1).unwrap();
    let state = server::create_default_state(&config(), first_day).unwrap();
    let app = server::create_app(Arc::clone(&state), get_metrics_handle());
    (app, state)
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["status"], "ok");
    // 09-21 in two-hour windows, over two days.
    assert_eq!(json["delivery_slots"], 12);
}

#[tokio::test]
async fn test_metrics_include_order_counters() {
    let (app, state) = setup();
    let delivery_time = Utc.with_ymd_and_hms(2099, 1, 1, 10, 0, 0).unwrap();

    let order = state
        .orchestrator
        .create_order(
            &OperationContext::background(),
            CreateOrder::new(
                UserId::new("user-1"),
                vec![OrderItem::priced("SKU-001", "Widget", 1, Money::from_minor_units(999)).unwrap()],
                delivery_time,
            ),
        )
        .await
        .unwrap();
    assert!(order.delivery_slot().is_some());
    assert_eq!(
        state
            .events
            .published_of_type(OrderEventType::OrderCreated)
            .len(),
        1
    );

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/plain"))
    );
    let body = body_string(response).await;
    assert!(body.contains("orders_created_total"));
    assert!(body.contains("order_operation_duration_seconds"));
}

#[tokio::test]
async fn test_state_serves_addresses_next_to_orders() {
    let (_, state) = setup();
    let ctx = OperationContext::background();
    let user = UserId::new("user-1");

    let address = state
        .addresses
        .add_address(
            &ctx,
            user.clone(),
            AddressFields {
                full_name: "John Doe".to_string(),
                street_address: "123 Main Street".to_string(),
                apartment: None,
                city: "Springfield".to_string(),
                state: "IL".to_string(),
                postal_code: "62704".to_string(),
                country: "USA".to_string(),
                phone: "+12025550123".to_string(),
            },
            true,
        )
        .await
        .unwrap();

    let order = state
        .orchestrator
        .create_order(
            &ctx,
            CreateOrder::new(
                user.clone(),
                vec![OrderItem::priced("SKU-001", "Widget", 1, Money::from_minor_units(999)).unwrap()],
                Utc.with_ymd_and_hms(2099, 1, 2, 12, 0, 0).unwrap(),
            )
            .with_delivery_address(address.clone()),
        )
        .await
        .unwrap();

    assert_eq!(order.delivery_address(), Some(&address));
    assert_eq!(state.addresses.list_addresses(&ctx, &user).await.unwrap(), vec![address]);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (app, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/orders")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
