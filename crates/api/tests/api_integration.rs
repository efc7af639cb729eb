//! Integration tests for the API server.

use std::sync::OnceLock;

use api::{AppState, Config};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{Money, ProductId, UserId};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::{InMemoryStore, ProductRecord, Store, UnitOfWork};
use tower::ServiceExt;

const WEBHOOK_KEY: &str = "test-webhook-key";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    store: InMemoryStore,
}

fn setup() -> TestApp {
    let store = InMemoryStore::new();
    let config = Config {
        payment_webhook_key: Some(WEBHOOK_KEY.to_string()),
        shipping_fee_cents: 500,
        free_shipping_threshold_cents: 0,
        ..Config::default()
    };
    let state = AppState::new(store.clone(), &config);
    TestApp {
        app: api::create_app(state, get_metrics_handle()),
        store,
    }
}

enum Who {
    Anonymous,
    Customer(UserId),
    Admin,
    Gateway(&'static str),
}

impl TestApp {
    async fn product(&self, price: i64, stock: i64) -> ProductId {
        let product = ProductRecord::new(ProductId::new(), "Widget", Money::from_cents(price), stock);
        let mut uow = self.store.begin().await.unwrap();
        uow.upsert_product(&product).await.unwrap();
        uow.commit().await.unwrap();
        product.id
    }

    async fn stock(&self, id: ProductId) -> i64 {
        let mut uow = self.store.begin().await.unwrap();
        uow.product(id).await.unwrap().unwrap().stock
    }

    async fn send(&self, method: &str, uri: &str, who: Who, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        match who {
            Who::Anonymous => {}
            Who::Customer(id) => {
                builder = builder
                    .header("x-user-id", id.to_string())
                    .header("x-user-role", "customer");
            }
            Who::Admin => {
                builder = builder
                    .header("x-user-id", UserId::new().to_string())
                    .header("x-user-role", "admin");
            }
            Who::Gateway(key) => {
                builder = builder.header("x-api-key", key);
            }
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).unwrap())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Adds lines to the user's cart and checks out.
    async fn place(&self, user: UserId, lines: &[(ProductId, u32)]) -> Value {
        for (product_id, quantity) in lines {
            let (status, _) = self
                .send(
                    "POST",
                    "/cart/items",
                    Who::Customer(user),
                    Some(json!({ "productId": product_id, "quantity": quantity })),
                )
                .await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, json) = self
            .send("POST", "/orders", Who::Customer(user), Some(checkout_body()))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json["data"].clone()
    }
}

fn checkout_body() -> Value {
    json!({
        "shippingAddress": "12 Market Street",
        "shippingPhone": "+1 555 010 0199",
        "paymentMethod": "COD",
        "note": "leave at the door"
    })
}

#[tokio::test]
async fn test_health_check() {
    let t = setup();
    let (status, json) = t.send("GET", "/health", Who::Anonymous, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = setup();
    let response = t
        .app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let t = setup();
    let (status, json) = t.send("GET", "/orders", Who::Anonymous, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);
    assert!(json["message"].as_str().is_some());
}

#[tokio::test]
async fn test_checkout_flow() {
    let t = setup();
    let a = t.product(100, 10).await;
    let b = t.product(50, 10).await;
    let user = UserId::new();

    let order = t.place(user, &[(a, 2), (b, 1)]).await;
    assert_eq!(order["subtotal"], 250);
    assert_eq!(order["shippingFee"], 500);
    assert_eq!(order["discountAmount"], 0);
    assert_eq!(order["totalMoney"], 750);
    assert_eq!(order["status"], "PENDING");
    assert_eq!(order["paymentStatus"], "UNPAID");
    assert_eq!(order["paymentMethod"], "COD");
    assert_eq!(order["items"].as_array().unwrap().len(), 2);

    assert_eq!(t.stock(a).await, 8);
    assert_eq!(t.stock(b).await, 9);

    let (status, cart) = t.send("GET", "/cart", Who::Customer(user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["data"]["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_checkout_empty_cart_is_bad_request() {
    let t = setup();
    let (status, json) = t
        .send("POST", "/orders", Who::Customer(UserId::new()), Some(checkout_body()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let t = setup();
    let (status, json) = t
        .send(
            "POST",
            "/orders",
            Who::Customer(UserId::new()),
            Some(json!({ "shippingAddress": 12 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_adding_more_than_stock_conflicts() {
    let t = setup();
    let a = t.product(100, 1).await;
    let (status, json) = t
        .send(
            "POST",
            "/cart/items",
            Who::Customer(UserId::new()),
            Some(json!({ "productId": a, "quantity": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["message"].as_str().unwrap().contains("Insufficient stock"));
}

#[tokio::test]
async fn test_cart_edit_endpoints() {
    let t = setup();
    let a = t.product(100, 10).await;
    let user = UserId::new();

    t.send(
        "POST",
        "/cart/items",
        Who::Customer(user),
        Some(json!({ "productId": a, "quantity": 1 })),
    )
    .await;

    let (status, json) = t
        .send(
            "PUT",
            &format!("/cart/items/{a}"),
            Who::Customer(user),
            Some(json!({ "quantity": 4 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["items"][0]["quantity"], 4);
    assert_eq!(json["data"]["subtotal"], 400);

    let (status, _) = t
        .send("DELETE", &format!("/cart/items/{a}"), Who::Customer(user), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t
        .send("DELETE", &format!("/cart/items/{a}"), Who::Customer(user), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = t.send("DELETE", "/cart", Who::Customer(user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["removed"], 0);
}

#[tokio::test]
async fn test_get_order_access_control() {
    let t = setup();
    let a = t.product(100, 10).await;
    let owner = UserId::new();
    let order = t.place(owner, &[(a, 1)]).await;
    let uri = format!("/orders/{}", order["id"].as_str().unwrap());

    let (status, json) = t.send("GET", &uri, Who::Customer(owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["note"], "leave at the door");

    let (status, _) = t.send("GET", &uri, Who::Customer(UserId::new()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t.send("GET", &uri, Who::Admin, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_get_unknown_and_invalid_order() {
    let t = setup();
    let (status, _) = t
        .send(
            "GET",
            &format!("/orders/{}", uuid::Uuid::new_v4()),
            Who::Admin,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t.send("GET", "/orders/not-a-uuid", Who::Admin, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_status_updates() {
    let t = setup();
    let a = t.product(100, 10).await;
    let owner = UserId::new();
    let order = t.place(owner, &[(a, 1)]).await;
    let uri = format!("/orders/{}/status", order["id"].as_str().unwrap());

    let (status, _) = t
        .send("PUT", &uri, Who::Customer(owner), Some(json!({ "status": "CONFIRMED" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t
        .send("PUT", &uri, Who::Admin, Some(json!({ "status": "COMPLETED" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, json) = t
        .send("PUT", &uri, Who::Admin, Some(json!({ "status": "CONFIRMED" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "CONFIRMED");

    let (status, _) = t
        .send("PUT", &uri, Who::Admin, Some(json!({ "status": "confirmed" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancel_restores_stock_once() {
    let t = setup();
    let a = t.product(100, 10).await;
    let owner = UserId::new();
    let order = t.place(owner, &[(a, 3)]).await;
    let uri = format!("/orders/{}/cancel", order["id"].as_str().unwrap());
    assert_eq!(t.stock(a).await, 7);

    let (status, json) = t
        .send("PUT", &uri, Who::Customer(owner), Some(json!({ "reason": "too slow" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "CANCELLED");
    assert_eq!(json["data"]["cancelReason"], "too slow");
    assert_eq!(t.stock(a).await, 10);

    let (status, _) = t.send("PUT", &uri, Who::Customer(owner), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(t.stock(a).await, 10);
}

#[tokio::test]
async fn test_list_orders_is_scoped_and_paged() {
    let t = setup();
    let a = t.product(100, 100).await;
    let alice = UserId::new();
    let bob = UserId::new();
    t.place(alice, &[(a, 1)]).await;
    t.place(alice, &[(a, 2)]).await;
    t.place(bob, &[(a, 1)]).await;

    let (status, json) = t.send("GET", "/orders", Who::Customer(alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["pagination"]["total"], 2);

    let (status, json) = t
        .send(
            "GET",
            "/orders?page=1&limit=2&sortBy=totalMoney&sortOrder=asc",
            Who::Admin,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["pagination"]["total"], 3);
    assert_eq!(json["data"]["pagination"]["totalPages"], 2);
    let orders = json["data"]["orders"].as_array().unwrap();
    assert_eq!(orders.len(), 2);
    assert!(orders[0]["totalMoney"].as_i64() <= orders[1]["totalMoney"].as_i64());

    let (status, _) = t
        .send("GET", "/orders?status=bogus", Who::Admin, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_requires_key() {
    let t = setup();
    let body = json!({
        "transactionCode": "TX-1",
        "orderId": uuid::Uuid::new_v4(),
        "amount": 100,
        "status": "success"
    });

    let (status, _) = t
        .send("POST", "/payment/webhook", Who::Anonymous, Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = t
        .send("POST", "/payment/webhook", Who::Gateway("wrong"), Some(body))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(t.store.transaction_count().await, 0);
}

#[tokio::test]
async fn test_webhook_applies_once() {
    let t = setup();
    let a = t.product(100, 10).await;
    let order = t.place(UserId::new(), &[(a, 2)]).await;
    let body = json!({
        "transactionCode": "TX-42",
        "orderId": order["id"],
        "amount": order["totalMoney"],
        "status": "success",
        "description": "card payment"
    });

    let (status, json) = t
        .send("POST", "/payment/webhook", Who::Gateway(WEBHOOK_KEY), Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["outcome"], "applied");
    assert_eq!(json["data"]["transactionStatus"], "SUCCESS");

    let (status, json) = t
        .send("POST", "/payment/webhook", Who::Gateway(WEBHOOK_KEY), Some(body))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["outcome"], "duplicate");
    assert_eq!(t.store.transaction_count().await, 1);

    let uri = format!("/orders/{}", order["id"].as_str().unwrap());
    let (_, json) = t.send("GET", &uri, Who::Admin, None).await;
    assert_eq!(json["data"]["paymentStatus"], "PAID");
    assert_eq!(json["data"]["transactions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_webhook_rejection_is_reported_not_thrown() {
    let t = setup();
    let a = t.product(100, 10).await;
    let order = t.place(UserId::new(), &[(a, 1)]).await;

    let (status, json) = t
        .send(
            "POST",
            "/payment/webhook",
            Who::Gateway(WEBHOOK_KEY),
            Some(json!({
                "transactionCode": "TX-7",
                "orderId": order["id"],
                "amount": 1,
                "status": "success"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["outcome"], "rejected");
    assert_eq!(json["data"]["transactionStatus"], "FAILED");
    assert_eq!(json["data"]["reason"]["reason"], "amountMismatch");
}

#[tokio::test]
async fn test_invalid_webhook_payload_is_not_recorded() {
    let t = setup();
    let a = t.product(100, 10).await;
    let order = t.place(UserId::new(), &[(a, 1)]).await;

    let payloads = [
        json!({ "transactionCode": "  ", "orderId": order["id"], "amount": 100, "status": "success" }),
        json!({ "transactionCode": "TX-9", "orderId": order["id"], "amount": -1, "status": "success" }),
        json!({ "transactionCode": "TX-9", "orderId": order["id"], "amount": "ten" }),
    ];
    for payload in payloads {
        let (status, json) = t
            .send("POST", "/payment/webhook", Who::Gateway(WEBHOOK_KEY), Some(payload))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{json}");
        assert_eq!(json["success"], false);
    }
    assert_eq!(t.store.transaction_count().await, 0);
}

#[tokio::test]
async fn test_payment_status_by_gateway_key_or_admin() {
    let t = setup();
    let a = t.product(100, 10).await;
    let owner = UserId::new();
    let order = t.place(owner, &[(a, 1)]).await;
    let uri = format!("/orders/{}/payment", order["id"].as_str().unwrap());

    let (status, _) = t
        .send("PUT", &uri, Who::Customer(owner), Some(json!({ "paymentStatus": "PAID" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = t
        .send(
            "PUT",
            &uri,
            Who::Gateway(WEBHOOK_KEY),
            Some(json!({ "paymentStatus": "PAID" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["paymentStatus"], "PAID");

    let (status, _) = t
        .send("PUT", &uri, Who::Admin, Some(json!({ "paymentStatus": "UNPAID" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, json) = t
        .send("PUT", &uri, Who::Admin, Some(json!({ "paymentStatus": "REFUNDED" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["paymentStatus"], "REFUNDED");
}
