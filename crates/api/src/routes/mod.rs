//! HTTP route handlers for the REST API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                          - Liveness
//! GET    /health/ready                    - Readiness (database)
//! GET    /api-docs/openapi.json           - OpenAPI document
//!
//! # Auth (rate limited)
//! POST   /auth/register | /auth/login | /auth/refresh | /auth/change-password
//! GET    /auth/me
//!
//! # Users
//! GET    /users/me, PATCH /users/me
//! GET    /users/me/addresses, POST /users/me/addresses
//! PATCH  /users/me/addresses/{id}, DELETE /users/me/addresses/{id}
//! GET    /users (admin), GET|PATCH|DELETE /users/{id} (admin)
//!
//! # Catalog
//! GET    /categories, /categories/tree, /categories/{id}, /categories/slug/{slug}
//! POST   /categories, PATCH|DELETE /categories/{id} (admin)
//! GET    /products, /products/{id}, /products/slug/{slug}, /products/{id}/reviews
//! POST   /products/{id}/reviews, DELETE /products/{id}/reviews
//! POST   /products, PATCH|DELETE /products/{id}, PATCH /products/{id}/stock (admin)
//!
//! # Shopping
//! GET    /cart, DELETE /cart, POST /cart/items
//! PATCH  /cart/items/{productId}, DELETE /cart/items/{productId}
//! GET    /wishlist, POST /wishlist, DELETE /wishlist/{productId}
//! POST   /wishlist/{productId}/move-to-cart
//!
//! # Orders
//! POST   /orders, GET /orders, GET /orders/{id}, POST /orders/{id}/cancel
//! GET    /orders/all, PATCH /orders/{id}/status, PATCH /orders/{id}/payment (admin)
//!
//! # Loyalty
//! GET    /loyalty/summary, /loyalty/transactions, POST /loyalty/preview
//! POST   /loyalty/adjust, POST /loyalty/expire (admin)
//! ```

pub mod auth;
pub mod cart;
pub mod categories;
pub mod extract;
pub mod loyalty;
pub mod orders;
pub mod products;
pub mod users;
pub mod wishlist;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::Paged;
use crate::error::Message;
use crate::models::Pagination;
use crate::state::AppState;

/// Success envelope: `{"success": true, "data": ...}` plus an optional
/// bilingual message and pagination.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    /// Always `true`.
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_vi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T> ApiResponse<T> {
    /// Wrap `data` in a success envelope.
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
            message_vi: None,
            pagination: None,
        }
    }

    /// Attach a bilingual message.
    #[must_use]
    pub fn with_message(mut self, message: Message) -> Self {
        self.message = Some(message.en.into_owned());
        self.message_vi = Some(message.vi.into_owned());
        self
    }
}

impl<T> ApiResponse<Vec<T>> {
    /// Envelope for one page of a list.
    pub fn paged(paged: Paged<T>) -> Self {
        let pagination = Pagination::from(&paged);
        Self {
            pagination: Some(pagination),
            ..Self::ok(paged.items)
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// A `201 Created` response with a success envelope.
pub fn created<T: Serialize>(body: ApiResponse<T>) -> Response {
    (StatusCode::CREATED, body).into_response()
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/refresh", post(auth::refresh))
        .route("/change-password", post(auth::change_password))
}

/// Create the user routes router.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(users::list))
        .route("/me", get(users::me).patch(users::update_me))
        .route(
            "/me/addresses",
            get(users::addresses).post(users::create_address),
        )
        .route(
            "/me/addresses/{id}",
            patch(users::update_address).delete(users::delete_address),
        )
        .route(
            "/{id}",
            get(users::show).patch(users::update).delete(users::remove),
        )
}

/// Create the category routes router.
pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(categories::list).post(categories::create))
        .route("/tree", get(categories::tree))
        .route("/slug/{slug}", get(categories::show_by_slug))
        .route(
            "/{id}",
            get(categories::show)
                .patch(categories::update)
                .delete(categories::remove),
        )
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::list).post(products::create))
        .route("/slug/{slug}", get(products::show_by_slug))
        .route(
            "/{id}",
            get(products::show)
                .patch(products::update)
                .delete(products::remove),
        )
        .route("/{id}/stock", patch(products::update_stock))
        .route(
            "/{id}/reviews",
            get(products::reviews)
                .post(products::upsert_review)
                .delete(products::delete_review),
        )
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add_item))
        .route(
            "/items/{product_id}",
            patch(cart::update_item).delete(cart::remove_item),
        )
}

/// Create the wishlist routes router.
pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(wishlist::list).post(wishlist::add))
        .route("/{product_id}", delete(wishlist::remove))
        .route("/{product_id}/move-to-cart", post(wishlist::move_to_cart))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::list).post(orders::create))
        .route("/all", get(orders::list_all))
        .route("/{id}", get(orders::show))
        .route("/{id}/cancel", post(orders::cancel))
        .route("/{id}/status", patch(orders::update_status))
        .route("/{id}/payment", patch(orders::update_payment))
}

/// Create the loyalty routes router.
pub fn loyalty_routes() -> Router<AppState> {
    Router::new()
        .route("/summary", get(loyalty::summary))
        .route("/transactions", get(loyalty::transactions))
        .route("/preview", post(loyalty::preview))
        .route("/adjust", post(loyalty::adjust))
        .route("/expire", post(loyalty::expire))
}

/// Create the health routes router.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(health))
        .route("/ready", get(readiness))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
#[utoipa::path(get, path = "/health", tag = "health", responses((status = 200, description = "Server is up", body = String)))]
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity before returning OK.
/// Returns 503 Service Unavailable if the database is not reachable.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Database reachable"),
        (status = 503, description = "Database unreachable")
    )
)]
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").execute(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::PageRequest;

    #[test]
    fn test_envelope_omits_empty_fields() {
        let json = serde_json::to_value(ApiResponse::ok(5)).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "data": 5}));
    }

    #[test]
    fn test_envelope_with_message() {
        let body = ApiResponse::ok(())
            .with_message(Message::new("Logged out", "Đã đăng xuất"));
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json["message"], "Logged out");
        assert_eq!(json["messageVi"], "Đã đăng xuất");
    }

    #[test]
    fn test_paged_envelope() {
        let paged = Paged {
            items: vec!["a", "b"],
            total: 12,
            page: PageRequest::new(Some(2), Some(5)),
        };
        let json = serde_json::to_value(ApiResponse::paged(paged)).unwrap();
        assert_eq!(json["data"], serde_json::json!(["a", "b"]));
        assert_eq!(json["pagination"]["page"], 2);
        assert_eq!(json["pagination"]["totalPages"], 3);
    }
}
