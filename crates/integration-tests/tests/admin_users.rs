//! Integration tests for accounts and saved addresses.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (lotus-cli migrate)
//! - An admin account (lotus-cli seed admin), see `LOTUS_ADMIN_EMAIL`
//! - The API server running (cargo run -p lotus-api)
//!
//! Run with: `cargo test -p lotus-integration-tests -- --ignored`

#![allow(clippy::expect_used)]

use lotus_integration_tests::session::{Session, shipping_address};
use reqwest::StatusCode;
use serde_json::Value;

/// Save an address and return its id.
async fn save_address(customer: &Session, street: &str, is_default: bool) -> i64 {
    let mut body = shipping_address();
    body["street"] = Value::from(street);
    body["isDefault"] = Value::from(is_default);
    let (status, saved) = customer.post("/users/me/addresses", &body).await;
    assert_eq!(status, StatusCode::CREATED, "{saved}");
    saved["data"]["id"].as_i64().expect("address id")
}

/// Ids of the caller's default addresses.
async fn defaults(customer: &Session) -> Vec<i64> {
    let (status, body) = customer.get("/users/me/addresses").await;
    assert_eq!(status, StatusCode::OK);
    body["data"]
        .as_array()
        .expect("address list")
        .iter()
        .filter(|a| a["isDefault"] == true)
        .filter_map(|a| a["id"].as_i64())
        .collect()
}

// ============================================================================
// Addresses
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server and seeded database"]
async fn test_default_address_switches() {
    let customer = Session::register().await;

    // The first address becomes the default even when not asked
    let home = save_address(&customer, "1 Hàng Bài", false).await;
    assert_eq!(defaults(&customer).await, vec![home]);

    let office = save_address(&customer, "88 Láng Hạ", true).await;
    assert_eq!(defaults(&customer).await, vec![office]);

    let (status, _) = customer
        .patch(
            &format!("/users/me/addresses/{home}"),
            &serde_json::json!({ "isDefault": true }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(defaults(&customer).await, vec![home]);

    // Deleting the default promotes the remaining address
    let (status, _) = customer.delete(&format!("/users/me/addresses/{home}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(defaults(&customer).await, vec![office]);
}

// ============================================================================
// Account Administration
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server and seeded admin"]
async fn test_admin_cannot_delete_or_demote_self() {
    let admin = Session::admin().await;
    let own = format!("/users/{}", admin.user_id);

    let (status, body) = admin.delete(&own).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["messageVi"].is_string());

    let (status, _) = admin
        .patch(&own, &serde_json::json!({ "role": "customer" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, me) = admin.get(&own).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["role"], "admin");
}

#[tokio::test]
#[ignore = "Requires running API server and seeded admin"]
async fn test_admin_deletes_customer_without_orders() {
    let admin = Session::admin().await;
    let customer = Session::register().await;
    let path = format!("/users/{}", customer.user_id);

    let (status, _) = admin.delete(&path).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = admin.get(&path).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
