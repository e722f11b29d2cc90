//! End-to-end flows against a running API.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (lotus-cli migrate)
//! - The sample catalog (lotus-cli seed catalog)
//! - The API server running (cargo run -p lotus-api)
//!
//! Run with: `cargo test -p lotus-integration-tests -- --ignored`
//!
//! Every test registers its own throwaway customer, so runs don't interfere.

#![allow(clippy::expect_used)]

use lotus_integration_tests::session::{Session, shipping_address};
use reqwest::StatusCode;
use serde_json::{Value, json};

/// Some active product with at least `min_stock` units.
async fn product_in_stock(customer: &Session, min_stock: i64) -> Value {
    let (status, body) = customer.get("/products?inStock=true&limit=50").await;
    assert_eq!(status, StatusCode::OK);
    body["data"]
        .as_array()
        .expect("product list")
        .iter()
        .find(|p| p["stock"].as_i64().unwrap_or_default() >= min_stock)
        .cloned()
        .expect("seeded catalog has a product in stock")
}

// ============================================================================
// Checkout
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server and seeded database"]
async fn test_checkout_then_cancel_restores_stock() {
    let customer = Session::register().await;
    let product = product_in_stock(&customer, 2).await;
    let product_id = product["id"].as_i64().expect("product id");
    let stock_before = product["stock"].as_i64().expect("stock");

    let (status, cart) = customer
        .post("/cart/items", &json!({ "productId": product_id, "quantity": 2 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["data"]["itemCount"], 2);

    let (status, order) = customer
        .post(
            "/orders",
            &json!({ "shippingAddress": shipping_address(), "paymentMethod": "cod" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let order = &order["data"];
    assert_eq!(order["status"], "pending");
    assert_eq!(order["paymentStatus"], "pending");
    assert!(order["orderNumber"].as_str().is_some_and(|n| n.starts_with("LM")));

    // Cart is emptied by checkout
    let (_, cart) = customer.get("/cart").await;
    assert_eq!(cart["data"]["itemCount"], 0);

    let (_, after_order) = customer.get(&format!("/products/{product_id}")).await;
    assert_eq!(after_order["data"]["stock"].as_i64(), Some(stock_before - 2));

    let order_id = order["id"].as_i64().expect("order id");
    let (status, cancelled) = customer
        .post(
            &format!("/orders/{order_id}/cancel"),
            &json!({ "reason": "Changed my mind" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["data"]["status"], "cancelled");

    let (_, after_cancel) = customer.get(&format!("/products/{product_id}")).await;
    assert_eq!(after_cancel["data"]["stock"].as_i64(), Some(stock_before));

    // A cancelled order can't be cancelled again
    let (status, body) = customer
        .post(&format!("/orders/{order_id}/cancel"), &json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["messageVi"].is_string());
}

#[tokio::test]
#[ignore = "Requires running API server and seeded database"]
async fn test_checkout_with_empty_cart_rejected() {
    let customer = Session::register().await;
    let (status, body) = customer
        .post(
            "/orders",
            &json!({ "shippingAddress": shipping_address(), "paymentMethod": "cod" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
#[ignore = "Requires running API server and seeded database"]
async fn test_quantity_beyond_stock_rejected() {
    let customer = Session::register().await;
    let product = product_in_stock(&customer, 1).await;
    let too_many = product["stock"].as_i64().expect("stock") + 1;

    let (status, _) = customer
        .post(
            "/cart/items",
            &json!({ "productId": product["id"], "quantity": too_many.min(99) }),
        )
        .await;
    // Either beyond stock or beyond the per-line cap
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running API server and seeded database"]
async fn test_other_customers_order_is_forbidden() {
    let owner = Session::register().await;
    let product = product_in_stock(&owner, 1).await;
    owner
        .post("/cart/items", &json!({ "productId": product["id"], "quantity": 1 }))
        .await;
    let (status, order) = owner
        .post(
            "/orders",
            &json!({ "shippingAddress": shipping_address(), "paymentMethod": "bank_transfer" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id = order["data"]["id"].as_i64().expect("order id");

    let stranger = Session::register().await;
    let (status, _) = stranger.get(&format!("/orders/{order_id}")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ============================================================================
// Wishlist & Loyalty
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server and seeded database"]
async fn test_wishlist_duplicate_and_move_to_cart() {
    let customer = Session::register().await;
    let product = product_in_stock(&customer, 1).await;
    let body = json!({ "productId": product["id"] });

    let (status, _) = customer.post("/wishlist", &body).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = customer.post("/wishlist", &body).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let product_id = product["id"].as_i64().expect("product id");
    let (status, cart) = customer
        .post(&format!("/wishlist/{product_id}/move-to-cart"), &json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["data"]["itemCount"], 1);

    let (_, wishlist) = customer.get("/wishlist").await;
    assert_eq!(wishlist["data"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
#[ignore = "Requires running API server and seeded database"]
async fn test_new_customer_loyalty_summary() {
    let customer = Session::register().await;
    let (status, body) = customer.get("/loyalty/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["balance"], 0);
    assert_eq!(body["data"]["lifetimePoints"], 0);
    assert_eq!(body["data"]["tier"], "bronze");

    let (status, body) = customer
        .post("/loyalty/preview", &json!({ "subtotal": "200000", "points": 50 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["allowedPoints"], 0);
}

#[tokio::test]
#[ignore = "Requires running API server and seeded database"]
async fn test_customer_cannot_use_admin_routes() {
    let customer = Session::register().await;
    for path in ["/users", "/orders/all"] {
        let (status, _) = customer.get(path).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{path}");
    }
}
