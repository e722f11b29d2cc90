//! Integration tests for the order lifecycle and loyalty points.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (lotus-cli migrate)
//! - An admin account (lotus-cli seed admin), see `LOTUS_ADMIN_EMAIL`
//! - The API server running (cargo run -p lotus-api)
//!
//! Run with: `cargo test -p lotus-integration-tests -- --ignored`

#![allow(clippy::expect_used)]

use lotus_integration_tests::session::{Session, amount, shipping_address};
use reqwest::StatusCode;
use serde_json::{Value, json};

/// A fresh product owned by the test, so stock and prices are predictable.
async fn fresh_product(admin: &Session, price: &str, stock: i32) -> i64 {
    let category = admin.create_category("Gia dụng", None).await;
    let product = admin
        .create_product(category["id"].as_i64().expect("category id"), price, stock)
        .await;
    product["id"].as_i64().expect("product id")
}

/// Grant points and return the new lot.
async fn grant(admin: &Session, customer: &Session, points: i32) -> Value {
    let (status, body) = admin
        .post(
            "/loyalty/adjust",
            &json!({ "userId": customer.user_id, "points": points, "reason": "E2E grant" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["type"], "adjustment");
    body["data"].clone()
}

/// Put one unit in the cart and check out.
async fn place_order(customer: &Session, product_id: i64, payment: &str, redeem: i32) -> Value {
    let (status, _) = customer
        .post("/cart/items", &json!({ "productId": product_id, "quantity": 1 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = customer
        .post(
            "/orders",
            &json!({
                "shippingAddress": shipping_address(),
                "paymentMethod": payment,
                "redeemPoints": redeem,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"].clone()
}

/// Walk an order through the status table up to `target`.
async fn advance(admin: &Session, order_id: i64, target: &str) -> Value {
    let mut order = Value::Null;
    for status in ["confirmed", "processing", "shipped", "delivered"] {
        let (code, body) = admin
            .patch(&format!("/orders/{order_id}/status"), &json!({ "status": status }))
            .await;
        assert_eq!(code, StatusCode::OK, "{status}: {body}");
        order = body["data"].clone();
        if status == target {
            break;
        }
    }
    order
}

async fn balance(customer: &Session) -> (i64, i64) {
    let (status, body) = customer.get("/loyalty/summary").await;
    assert_eq!(status, StatusCode::OK);
    (
        body["data"]["balance"].as_i64().expect("balance"),
        body["data"]["lifetimePoints"].as_i64().expect("lifetime points"),
    )
}

/// The caller's adjustment entries, keyed by id.
async fn adjustment(customer: &Session, id: &Value) -> Value {
    let (status, body) = customer
        .get("/loyalty/transactions?type=adjustment&limit=50")
        .await;
    assert_eq!(status, StatusCode::OK);
    body["data"]
        .as_array()
        .expect("ledger")
        .iter()
        .find(|entry| &entry["id"] == id)
        .cloned()
        .expect("adjustment in ledger")
}

// ============================================================================
// Redemption
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server and seeded admin"]
async fn test_checkout_redeems_oldest_lots_first() {
    let admin = Session::admin().await;
    let customer = Session::register().await;
    let product_id = fresh_product(&admin, "500000", 5).await;

    let older = grant(&admin, &customer, 100).await;
    let newer = grant(&admin, &customer, 100).await;
    assert_eq!(balance(&customer).await.0, 200);

    let order = place_order(&customer, product_id, "cod", 150).await;
    assert_eq!(order["pointsRedeemed"], 150);
    assert!((amount(&order["discount"]) - 15_000.0).abs() < 0.01);
    assert!(
        (amount(&order["total"]) - (amount(&order["subtotal"]) + amount(&order["shippingFee"])
            - 15_000.0))
            .abs()
            < 0.01
    );

    assert_eq!(balance(&customer).await.0, 50);
    assert_eq!(adjustment(&customer, &older["id"]).await["remaining"], 0);
    assert_eq!(adjustment(&customer, &newer["id"]).await["remaining"], 50);

    // Asking for more than the balance is refused outright
    let (status, _) = customer
        .post("/cart/items", &json!({ "productId": product_id, "quantity": 1 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = customer
        .post(
            "/orders",
            &json!({
                "shippingAddress": shipping_address(),
                "paymentMethod": "cod",
                "redeemPoints": 51,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running API server and seeded admin"]
async fn test_cancel_refunds_redeemed_points() {
    let admin = Session::admin().await;
    let customer = Session::register().await;
    let product_id = fresh_product(&admin, "300000", 5).await;
    grant(&admin, &customer, 120).await;

    let order = place_order(&customer, product_id, "cod", 120).await;
    let order_id = order["id"].as_i64().expect("order id");
    assert_eq!(balance(&customer).await.0, 0);

    let (status, body) = customer
        .post(&format!("/orders/{order_id}/cancel"), &json!({ "reason": "Đặt nhầm" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "cancelled");
    assert_eq!(balance(&customer).await.0, 120);

    let (_, ledger) = customer
        .get("/loyalty/transactions?type=adjustment&limit=50")
        .await;
    let refund = ledger["data"]
        .as_array()
        .expect("ledger")
        .iter()
        .find(|entry| entry["orderId"].as_i64() == Some(order_id))
        .cloned()
        .expect("refund entry for the order");
    assert_eq!(refund["points"], 120);
    assert_eq!(refund["remaining"], 120);
    assert!(refund["expiresAt"].is_string());
}

// ============================================================================
// Fulfilment
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server and seeded admin"]
async fn test_delivery_awards_points_and_settles_cod() {
    let admin = Session::admin().await;
    let customer = Session::register().await;
    let product_id = fresh_product(&admin, "450000", 5).await;

    let order = place_order(&customer, product_id, "cod", 0).await;
    let order_id = order["id"].as_i64().expect("order id");
    assert_eq!(order["paymentStatus"], "pending");

    let delivered = advance(&admin, order_id, "delivered").await;
    assert_eq!(delivered["status"], "delivered");
    assert_eq!(delivered["paymentStatus"], "paid");

    #[allow(clippy::cast_possible_truncation)]
    let expected = (amount(&delivered["total"]) / 10_000.0).floor() as i64;
    assert!(expected > 0);
    assert_eq!(delivered["pointsEarned"].as_i64(), Some(expected));
    assert_eq!(balance(&customer).await, (expected, expected));

    let (_, ledger) = customer.get("/loyalty/transactions?type=earn").await;
    let earned = ledger["data"]
        .as_array()
        .expect("ledger")
        .iter()
        .find(|entry| entry["orderId"].as_i64() == Some(order_id))
        .cloned()
        .expect("earn entry for the order");
    assert_eq!(earned["points"].as_i64(), Some(expected));

    // Delivered is final for everyone
    let (status, _) = customer
        .post(&format!("/orders/{order_id}/cancel"), &json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = admin
        .patch(
            &format!("/orders/{order_id}/status"),
            &json!({ "status": "cancelled" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running API server and seeded admin"]
async fn test_status_cannot_skip_steps() {
    let admin = Session::admin().await;
    let customer = Session::register().await;
    let product_id = fresh_product(&admin, "99000", 5).await;
    let order = place_order(&customer, product_id, "bank_transfer", 0).await;

    let (status, _) = admin
        .patch(
            &format!("/orders/{}/status", order["id"]),
            &json!({ "status": "shipped" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running API server and seeded admin"]
async fn test_admin_cancels_shipped_order_through_either_route() {
    let admin = Session::admin().await;
    let customer = Session::register().await;
    let product_id = fresh_product(&admin, "200000", 5).await;

    let first = place_order(&customer, product_id, "cod", 0).await;
    let first_id = first["id"].as_i64().expect("order id");
    advance(&admin, first_id, "shipped").await;

    let (status, _) = customer
        .post(&format!("/orders/{first_id}/cancel"), &json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "customers can't cancel shipped orders");

    let (status, body) = admin
        .post(
            &format!("/orders/{first_id}/cancel"),
            &json!({ "reason": "Hàng thất lạc" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "cancelled");

    let second = place_order(&customer, product_id, "cod", 0).await;
    let second_id = second["id"].as_i64().expect("order id");
    advance(&admin, second_id, "shipped").await;
    let (status, body) = admin
        .patch(
            &format!("/orders/{second_id}/status"),
            &json!({ "status": "cancelled", "reason": "Khách từ chối nhận" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "cancelled");

    // Both cancellations put the stock back
    let (_, product) = customer.get(&format!("/products/{product_id}")).await;
    assert_eq!(product["data"]["stock"], 5);
}
