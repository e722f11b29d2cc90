//! Cart and wishlist types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use lotus_core::pricing::{Totals, line_total};
use lotus_core::{ProductId, WishlistItemId};

use super::product::Product;

/// A cart line joined with its product.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    #[schema(value_type = i32)]
    pub product_id: ProductId,
    pub name: String,
    pub slug: String,
    pub sku: String,
    pub image: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
    /// Units currently available.
    pub stock: i32,
    /// `false` when the product was deactivated or stock dropped below the
    /// requested quantity.
    pub available: bool,
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    #[must_use]
    pub fn new(product: &Product, quantity: i32, added_at: DateTime<Utc>) -> Self {
        Self {
            product_id: product.id,
            name: product.name.clone(),
            slug: product.slug.clone(),
            sku: product.sku.clone(),
            image: product.primary_image().map(str::to_owned),
            unit_price: product.price,
            quantity,
            line_total: line_total(product.price, quantity),
            stock: product.stock,
            available: product.can_fulfil(quantity),
            added_at,
        }
    }
}

/// The caller's cart.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub items: Vec<CartLine>,
    /// Total units across lines.
    pub item_count: i32,
    pub totals: Totals,
}

/// Add a product to the cart.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddCartItemInput {
    #[schema(value_type = i32)]
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

/// Set a cart line's quantity. Zero removes the line.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartItemInput {
    pub quantity: i32,
}

/// A wishlist entry with its product.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WishlistEntry {
    #[schema(value_type = i32)]
    pub id: WishlistItemId,
    pub added_at: DateTime<Utc>,
    pub product: Product,
}

/// Add a product to the wishlist.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddWishlistInput {
    #[schema(value_type = i32)]
    pub product_id: ProductId,
}

/// Move a wishlist entry into the cart.
#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MoveToCartInput {
    pub quantity: Option<i32>,
}

const fn default_quantity() -> i32 {
    1
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_add_cart_item_defaults_to_one() {
        let input: AddCartItemInput = serde_json::from_str(r#"{"productId":9}"#).unwrap();
        assert_eq!(input.quantity, 1);
        assert_eq!(input.product_id, ProductId::new(9));
    }
}
