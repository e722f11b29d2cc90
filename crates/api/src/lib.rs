//! Lotus Mart API library.
//!
//! The REST server as a library, so the router can be built by the binary,
//! the CLI and the integration tests alike.
//!
//! # Security
//!
//! Handlers authenticate per request with bearer tokens (see
//! [`middleware::auth`]). Admin routes check the role on every call, so role
//! changes and deactivations take effect without waiting for tokens to expire.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod routes;
pub mod services;
pub mod state;

use std::time::Duration;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::get,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::error::AppError;
use crate::middleware::{auth_rate_limiter, request_id_middleware, security_headers_middleware};
use crate::state::AppState;

/// Build the full application router, minus the Sentry layers.
pub fn app(state: AppState) -> Router {
    let auth = match auth_rate_limiter() {
        Some(limiter) => routes::auth_routes().layer(limiter),
        None => routes::auth_routes(),
    };
    let cors = cors_layer(&state.config().cors_allowed_origins);

    Router::new()
        .nest("/health", routes::health_routes())
        .route("/api-docs/openapi.json", get(openapi::openapi_json))
        .nest("/auth", auth)
        .nest("/users", routes::user_routes())
        .nest("/categories", routes::category_routes())
        .nest("/products", routes::product_routes())
        .nest("/cart", routes::cart_routes())
        .nest("/wishlist", routes::wishlist_routes())
        .nest("/orders", routes::order_routes())
        .nest("/loyalty", routes::loyalty_routes())
        .fallback(route_not_found)
        .layer(cors)
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

/// CORS for browser clients. An empty allow-list means any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

async fn route_not_found() -> AppError {
    AppError::not_found("Route not found", "Không tìm thấy đường dẫn")
}
