//! OpenAPI document for the REST API, served at `/api-docs/openapi.json`.

use axum::Json;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::routes;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Lotus Mart API",
        description = "Catalog, cart, checkout and loyalty points for the Lotus Mart store."
    ),
    paths(
        routes::health,
        routes::readiness,
        routes::auth::register,
        routes::auth::login,
        routes::auth::me,
        routes::auth::refresh,
        routes::auth::change_password,
        routes::users::me,
        routes::users::update_me,
        routes::users::addresses,
        routes::users::create_address,
        routes::users::update_address,
        routes::users::delete_address,
        routes::users::list,
        routes::users::show,
        routes::users::update,
        routes::users::remove,
        routes::categories::list,
        routes::categories::tree,
        routes::categories::show,
        routes::categories::show_by_slug,
        routes::categories::create,
        routes::categories::update,
        routes::categories::remove,
        routes::products::list,
        routes::products::show,
        routes::products::show_by_slug,
        routes::products::create,
        routes::products::update,
        routes::products::remove,
        routes::products::update_stock,
        routes::products::reviews,
        routes::products::upsert_review,
        routes::products::delete_review,
        routes::cart::show,
        routes::cart::add_item,
        routes::cart::update_item,
        routes::cart::remove_item,
        routes::cart::clear,
        routes::wishlist::list,
        routes::wishlist::add,
        routes::wishlist::remove,
        routes::wishlist::move_to_cart,
        routes::orders::create,
        routes::orders::list,
        routes::orders::list_all,
        routes::orders::show,
        routes::orders::cancel,
        routes::orders::update_status,
        routes::orders::update_payment,
        routes::loyalty::summary,
        routes::loyalty::transactions,
        routes::loyalty::preview,
        routes::loyalty::adjust,
        routes::loyalty::expire,
    ),
    components(schemas(crate::error::ErrorBody, crate::models::Pagination)),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Liveness and readiness"),
        (name = "auth", description = "Registration, login and tokens"),
        (name = "users", description = "Profiles, addresses and account administration"),
        (name = "categories", description = "Category tree"),
        (name = "products", description = "Products, stock and reviews"),
        (name = "cart", description = "Shopping cart"),
        (name = "wishlist", description = "Saved products"),
        (name = "orders", description = "Checkout and order lifecycle"),
        (name = "loyalty", description = "Loyalty points")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` security scheme referenced by protected paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// GET /api-docs/openapi.json
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_checkout() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/orders"));
        assert!(doc.paths.paths.contains_key("/loyalty/summary"));
    }

    #[test]
    fn test_admin_operations_documented() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths["/products/{id}/stock"].patch.is_some());
        assert!(paths["/products/{id}"].delete.is_some());
        assert!(paths["/categories/{id}"].patch.is_some());
        assert!(paths["/categories/{id}"].delete.is_some());
        assert!(paths["/categories"].post.is_some());
        assert!(paths["/orders/all"].get.is_some());
        assert!(paths["/orders/{id}/status"].patch.is_some());
        assert!(paths["/orders/{id}/payment"].patch.is_some());
        assert!(paths["/loyalty/expire"].post.is_some());
        assert!(paths["/users/{id}"].get.is_some());
        assert!(paths["/users/{id}"].delete.is_some());
    }

    #[test]
    fn test_bearer_scheme_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer"));
    }
}
