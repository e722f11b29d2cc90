//! Router-level tests that need no database.
//!
//! Each test builds the real application router over a pool pointed at a
//! closed port, so anything that reaches the database fails. The behaviour
//! under test is all decided before that point.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header};
use serde_json::Value;

use lotus_api::services::auth::Claims;
use lotus_core::{UserId, UserRole};
use lotus_integration_tests::{TEST_JWT_SECRET, json_body, send, test_app};

// `/auth` routes key their rate limit on the client address, which oneshot
// requests only have via the forwarding headers.
const CLIENT_IP: &str = "192.0.2.10";

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-forwarded-for", CLIENT_IP)
        .body(Body::empty())
        .unwrap()
}

fn get_with_token(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-forwarded-for", CLIENT_IP)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: &str, client_ip: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", client_ip)
        .body(Body::from(body.to_owned()))
        .unwrap()
}

fn token_signed_with(secret: &[u8], issued_secs_ago: i64, lifetime_secs: i64) -> String {
    let iat = Utc::now().timestamp() - issued_secs_ago;
    let claims = Claims {
        sub: UserId::new(1),
        email: "admin@lotusmart.vn".to_string(),
        role: UserRole::Admin,
        iat,
        exp: iat + lifetime_secs,
    };
    jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(secret)).unwrap()
}

fn assert_error_envelope(body: &Value) {
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
    assert!(body["messageVi"].as_str().is_some_and(|m| !m.is_empty()));
}

// =============================================================================
// Health & Docs
// =============================================================================

#[tokio::test]
async fn test_health_is_ok() {
    let response = send(test_app(), get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_readiness_reports_unreachable_database() {
    let response = send(test_app(), get("/health/ready")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_openapi_document_served() {
    let response = send(test_app(), get("/api-docs/openapi.json")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let doc = json_body(response).await;
    assert!(doc["openapi"].as_str().is_some_and(|v| v.starts_with('3')));
    assert!(doc["paths"]["/orders/{id}/cancel"].is_object());
    assert!(doc["components"]["securitySchemes"]["bearer"].is_object());
}

#[tokio::test]
async fn test_unknown_route_is_bilingual_404() {
    let response = send(test_app(), get("/no-such-thing")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_error_envelope(&json_body(response).await);
}

// =============================================================================
// Authentication Gating
// =============================================================================

#[tokio::test]
async fn test_protected_routes_require_token() {
    for uri in [
        "/auth/me",
        "/users/me",
        "/cart",
        "/wishlist",
        "/orders",
        "/orders/all",
        "/loyalty/summary",
        "/users",
    ] {
        let response = send(test_app(), get(uri)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        assert_error_envelope(&json_body(response).await);
    }
}

#[tokio::test]
async fn test_non_bearer_scheme_rejected() {
    let request = Request::builder()
        .uri("/cart")
        .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .body(Body::empty())
        .unwrap();
    let response = send(test_app(), request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_garbage_token_rejected() {
    let response = send(test_app(), get_with_token("/cart", "not-a-jwt")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_from_other_secret_rejected() {
    let token = token_signed_with(b"some-other-secret-that-is-long-enough", 0, 3600);
    let response = send(test_app(), get_with_token("/loyalty/summary", &token)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let token = token_signed_with(TEST_JWT_SECRET.as_bytes(), 7200, 3600);
    let response = send(test_app(), get_with_token("/orders", &token)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_error_envelope(&body);
}

// =============================================================================
// Input Validation
// =============================================================================

#[tokio::test]
async fn test_malformed_json_is_bilingual_400() {
    let response = send(
        test_app(),
        post_json("/auth/register", "{\"email\": ", "198.51.100.1"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_error_envelope(&json_body(response).await);
}

#[tokio::test]
async fn test_missing_content_type_is_400() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/login")
        .header("x-forwarded-for", "198.51.100.2")
        .body(Body::from(r#"{"email":"a@b.vn","password":"x"}"#))
        .unwrap();
    let response = send(test_app(), request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_product_query_is_400() {
    for uri in ["/products?minPrice=cheap", "/products?sort=random"] {
        let response = send(test_app(), get(uri)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_error_envelope(&json_body(response).await);
    }
}

// =============================================================================
// Middleware
// =============================================================================

#[tokio::test]
async fn test_auth_routes_are_rate_limited_per_client() {
    let app = test_app();

    let mut statuses = Vec::new();
    for _ in 0..6 {
        let response = send(app.clone(), post_json("/auth/login", "{", "203.0.113.50")).await;
        statuses.push(response.status());
    }
    assert!(
        statuses.iter().take(5).all(|s| *s == StatusCode::BAD_REQUEST),
        "{statuses:?}"
    );
    assert_eq!(statuses.last(), Some(&StatusCode::TOO_MANY_REQUESTS));

    // A different client still gets through.
    let response = send(app, post_json("/auth/login", "{", "203.0.113.51")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rate_limit_does_not_apply_outside_auth() {
    let app = test_app();
    for _ in 0..8 {
        let request = Request::builder()
            .uri("/health")
            .header("x-forwarded-for", "203.0.113.60")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(app.clone(), request).await.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_security_headers_present() {
    let response = send(test_app(), get("/health")).await;
    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert!(headers.contains_key("content-security-policy"));
}

#[tokio::test]
async fn test_request_id_generated_and_echoed() {
    let response = send(test_app(), get("/health")).await;
    let generated = response.headers()["x-request-id"].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(generated).is_ok());

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "upstream-123")
        .body(Body::empty())
        .unwrap();
    let response = send(test_app(), request).await;
    assert_eq!(response.headers()["x-request-id"], "upstream-123");
}

#[tokio::test]
async fn test_cors_preflight_allows_any_origin_by_default() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/products")
        .header(header::ORIGIN, "https://shop.example.vn")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap();
    let response = send(test_app(), request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}
