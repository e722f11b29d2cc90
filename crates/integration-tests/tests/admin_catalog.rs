//! Integration tests for admin catalog management.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (lotus-cli migrate)
//! - An admin account (lotus-cli seed admin), see `LOTUS_ADMIN_EMAIL`
//! - The API server running (cargo run -p lotus-api)
//!
//! Run with: `cargo test -p lotus-integration-tests -- --ignored`

#![allow(clippy::expect_used)]

use lotus_integration_tests::session::{Session, amount, unique};
use reqwest::StatusCode;
use serde_json::json;

// ============================================================================
// Category Tree
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server and seeded admin"]
async fn test_reparent_rewrites_subtree_and_rejects_cycles() {
    let admin = Session::admin().await;
    let home = admin.create_category("Nhà cửa", None).await;
    let kitchen = admin.create_category("Nhà bếp", home["id"].as_i64()).await;
    let knives = admin.create_category("Dao", kitchen["id"].as_i64()).await;
    let outdoor = admin.create_category("Ngoài trời", None).await;

    let kitchen_id = kitchen["id"].as_i64().expect("kitchen id");
    let knives_id = knives["id"].as_i64().expect("knives id");
    assert_eq!(knives["level"], 2);

    let (status, moved) = admin
        .patch(
            &format!("/categories/{kitchen_id}"),
            &json!({ "parentId": outdoor["id"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{moved}");
    let outdoor_path = outdoor["path"].as_str().expect("outdoor path");
    let kitchen_slug = kitchen["slug"].as_str().expect("kitchen slug");
    assert_eq!(moved["data"]["path"], format!("{outdoor_path}/{kitchen_slug}"));
    assert_eq!(moved["data"]["level"], 1);

    // The grandchild follows its parent
    let (_, knives_after) = admin.get(&format!("/categories/{knives_id}")).await;
    let knives_slug = knives["slug"].as_str().expect("knives slug");
    assert_eq!(
        knives_after["data"]["path"],
        format!("{outdoor_path}/{kitchen_slug}/{knives_slug}")
    );
    assert_eq!(knives_after["data"]["level"], 2);

    // Moving to the root resets the level
    let (status, rooted) = admin
        .patch(&format!("/categories/{kitchen_id}"), &json!({ "parentId": null }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rooted["data"]["level"], 0);
    assert_eq!(rooted["data"]["path"], kitchen_slug);

    // A category can't move under its own descendant, or itself
    let (status, body) = admin
        .patch(
            &format!("/categories/{kitchen_id}"),
            &json!({ "parentId": knives_id }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["messageVi"].is_string());
    let (status, _) = admin
        .patch(
            &format!("/categories/{kitchen_id}"),
            &json!({ "parentId": kitchen_id }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running API server and seeded admin"]
async fn test_delete_category_in_use_conflicts() {
    let admin = Session::admin().await;
    let parent = admin.create_category("Điện tử", None).await;
    let child = admin.create_category("Tai nghe", parent["id"].as_i64()).await;
    let parent_id = parent["id"].as_i64().expect("parent id");
    let child_id = child["id"].as_i64().expect("child id");

    let (status, _) = admin.delete(&format!("/categories/{parent_id}")).await;
    assert_eq!(status, StatusCode::CONFLICT, "category with children");

    admin.create_product(child_id, "350000", 5).await;
    let (status, _) = admin.delete(&format!("/categories/{child_id}")).await;
    assert_eq!(status, StatusCode::CONFLICT, "category with products");

    let empty = admin.create_category("Trống", None).await;
    let empty_id = empty["id"].as_i64().expect("empty id");
    let (status, _) = admin.delete(&format!("/categories/{empty_id}")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = admin.get(&format!("/categories/{empty_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Products & Stock
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server and seeded admin"]
async fn test_duplicate_sku_conflicts() {
    let admin = Session::admin().await;
    let category = admin.create_category("Văn phòng phẩm", None).await;
    let product = admin
        .create_product(category["id"].as_i64().expect("category id"), "15000", 10)
        .await;

    // Same SKU in another case is the same SKU
    let sku = product["sku"].as_str().expect("sku").to_lowercase();
    let (status, body) = admin
        .post(
            "/products",
            &json!({
                "name": format!("Bản sao {}", unique("copy")),
                "sku": sku,
                "categoryId": category["id"],
                "price": "15000",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
}

#[tokio::test]
#[ignore = "Requires running API server and seeded admin"]
async fn test_stock_changes_stay_in_range() {
    let admin = Session::admin().await;
    let category = admin.create_category("Đồ chơi", None).await;
    let product = admin
        .create_product(category["id"].as_i64().expect("category id"), "120000", 3)
        .await;
    let path = format!("/products/{}/stock", product["id"]);

    let (status, body) = admin.patch(&path, &json!({ "delta": -4 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["messageVi"].is_string());

    let (status, _) = admin.patch(&path, &json!({ "delta": 2_000_000_000 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = admin.patch(&path, &json!({ "delta": 1, "set": 5 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Rejected changes leave stock untouched
    let (status, body) = admin.patch(&path, &json!({ "delta": -3 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["stock"], 0);

    let (status, body) = admin.patch(&path, &json!({ "set": 40 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["stock"], 40);
}

// ============================================================================
// Reviews
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server and seeded admin"]
async fn test_review_upsert_recomputes_rating() {
    let admin = Session::admin().await;
    let category = admin.create_category("Sách", None).await;
    let product = admin
        .create_product(category["id"].as_i64().expect("category id"), "89000", 10)
        .await;
    let product_id = product["id"].as_i64().expect("product id");
    let reviews = format!("/products/{product_id}/reviews");

    let first = Session::register().await;
    let second = Session::register().await;

    let (status, _) = first
        .post(&reviews, &json!({ "rating": 5, "comment": "Rất hay" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = second.post(&reviews, &json!({ "rating": 2 })).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = first.get(&format!("/products/{product_id}")).await;
    assert_eq!(body["data"]["ratingCount"], 2);
    assert!((amount(&body["data"]["ratingAverage"]) - 3.5).abs() < 0.01);

    // A second review from the same customer replaces the first
    let (status, _) = first.post(&reviews, &json!({ "rating": 3 })).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = first.get(&format!("/products/{product_id}")).await;
    assert_eq!(body["data"]["ratingCount"], 2);
    assert!((amount(&body["data"]["ratingAverage"]) - 2.5).abs() < 0.01);

    let (status, _) = second.delete(&reviews).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = first.get(&format!("/products/{product_id}")).await;
    assert_eq!(body["data"]["ratingCount"], 1);
    assert!((amount(&body["data"]["ratingAverage"]) - 3.0).abs() < 0.01);

    let (status, _) = first.post(&reviews, &json!({ "rating": 6 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
