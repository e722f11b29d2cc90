//! Product and review types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use lotus_core::{CategoryId, ProductId, ReviewId, UserId};

use super::double_option;

/// A catalog product.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[schema(value_type = i32)]
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub sku: String,
    pub description: String,
    pub short_description: Option<String>,
    #[schema(value_type = i32)]
    pub category_id: CategoryId,
    pub brand: Option<String>,
    pub price: Decimal,
    /// Original price shown struck through when higher than `price`.
    pub compare_at_price: Option<Decimal>,
    pub stock: i32,
    pub images: Vec<String>,
    /// Free-form specification table, e.g. `{"RAM": "8GB"}`.
    pub specifications: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub rating_average: Decimal,
    pub rating_count: i32,
    pub sold_count: i32,
    pub is_active: bool,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// First image, used for cart and order snapshots.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// Whether the product can be bought in `quantity` units right now.
    #[must_use]
    pub const fn can_fulfil(&self, quantity: i32) -> bool {
        self.is_active && quantity > 0 && quantity <= self.stock
    }
}

/// Sort order for product listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
    Rating,
    BestSelling,
}

impl ProductSort {
    /// SQL `ORDER BY` clause. Always ends with `id` for stable pages.
    #[must_use]
    pub const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC, p.id DESC",
            Self::PriceAsc => "p.price ASC, p.id ASC",
            Self::PriceDesc => "p.price DESC, p.id DESC",
            Self::Name => "p.name ASC, p.id ASC",
            Self::Rating => "p.rating_average DESC, p.rating_count DESC, p.id DESC",
            Self::BestSelling => "p.sold_count DESC, p.id DESC",
        }
    }
}

/// Product listing filter.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ProductFilter {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Full-text search over name, description and SKU.
    pub q: Option<String>,
    /// Category ID or slug. Includes subcategories.
    pub category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub tag: Option<String>,
    pub brand: Option<String>,
    pub featured: Option<bool>,
    pub in_stock: Option<bool>,
    pub sort: Option<ProductSort>,
}

/// Resolved filter passed to the repository.
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category_ids: Option<Vec<CategoryId>>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub tag: Option<String>,
    pub brand: Option<String>,
    pub featured: Option<bool>,
    pub in_stock: Option<bool>,
    /// Include inactive products (admin listings).
    pub include_inactive: bool,
    pub sort: ProductSort,
}

/// New product.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductInput {
    pub name: String,
    /// Derived from the name when omitted.
    pub slug: Option<String>,
    pub sku: String,
    #[serde(default)]
    pub description: String,
    pub short_description: Option<String>,
    #[schema(value_type = i32)]
    pub category_id: CategoryId,
    pub brand: Option<String>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub specifications: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
}

/// Partial product update.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    #[schema(value_type = Option<i32>)]
    pub category_id: Option<CategoryId>,
    pub brand: Option<String>,
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub compare_at_price: Option<Option<Decimal>>,
    pub stock: Option<i32>,
    pub images: Option<Vec<String>>,
    pub specifications: Option<BTreeMap<String, String>>,
    pub tags: Option<Vec<String>>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
}

/// Largest stock level (and largest single adjustment) a product may hold.
pub const MAX_STOCK: i32 = 1_000_000;

/// Stock change. Exactly one of `delta` or `set`.
#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdateInput {
    /// Add (or with a negative value remove) units.
    pub delta: Option<i32>,
    /// Replace the stock level.
    pub set: Option<i32>,
}

/// A validated [`StockUpdateInput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockChange {
    Delta(i32),
    Set(i32),
}

/// Why a [`StockUpdateInput`] was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockInputError {
    /// Neither or both of `delta` and `set`.
    Ambiguous,
    /// `set` below zero.
    Negative,
    /// Outside `-MAX_STOCK..=MAX_STOCK`.
    TooLarge,
}

impl StockUpdateInput {
    /// Check the shape and bounds of the request.
    ///
    /// # Errors
    ///
    /// Returns the first [`StockInputError`] that applies.
    pub const fn validate(self) -> Result<StockChange, StockInputError> {
        match (self.delta, self.set) {
            (Some(delta), None) if delta < -MAX_STOCK || delta > MAX_STOCK => {
                Err(StockInputError::TooLarge)
            }
            (Some(delta), None) => Ok(StockChange::Delta(delta)),
            (None, Some(set)) if set < 0 => Err(StockInputError::Negative),
            (None, Some(set)) if set > MAX_STOCK => Err(StockInputError::TooLarge),
            (None, Some(set)) => Ok(StockChange::Set(set)),
            _ => Err(StockInputError::Ambiguous),
        }
    }
}

/// A product review with the reviewer's display name.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[schema(value_type = i32)]
    pub id: ReviewId,
    #[schema(value_type = i32)]
    pub product_id: ProductId,
    #[schema(value_type = i32)]
    pub user_id: UserId,
    pub user_name: String,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create or replace the caller's review.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewInput {
    /// 1 to 5.
    pub rating: i16,
    pub comment: Option<String>,
}

/// Review listing query.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ReviewFilter {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_update_validate() {
        let delta = |d| StockUpdateInput { delta: Some(d), set: None };
        let set = |v| StockUpdateInput { delta: None, set: Some(v) };

        assert_eq!(delta(-3).validate(), Ok(StockChange::Delta(-3)));
        assert_eq!(set(0).validate(), Ok(StockChange::Set(0)));
        assert_eq!(set(-1).validate(), Err(StockInputError::Negative));
        assert_eq!(delta(i32::MAX).validate(), Err(StockInputError::TooLarge));
        assert_eq!(delta(i32::MIN).validate(), Err(StockInputError::TooLarge));
        assert_eq!(set(MAX_STOCK + 1).validate(), Err(StockInputError::TooLarge));
        assert_eq!(
            StockUpdateInput::default().validate(),
            Err(StockInputError::Ambiguous)
        );
        assert_eq!(
            StockUpdateInput { delta: Some(1), set: Some(2) }.validate(),
            Err(StockInputError::Ambiguous)
        );
    }

    #[test]
    fn test_product_sort_parses_snake_case() {
        let sort: ProductSort = serde_json::from_str(r#""price_desc""#).unwrap();
        assert_eq!(sort, ProductSort::PriceDesc);
        assert!(ProductSort::BestSelling.order_by().starts_with("p.sold_count"));
    }

    #[test]
    fn test_create_product_defaults() {
        let input: CreateProductInput = serde_json::from_str(
            r#"{"name":"Áo thun","sku":"TS-001","categoryId":3,"price":"199000"}"#,
        )
        .unwrap();
        assert!(input.is_active);
        assert!(!input.is_featured);
        assert_eq!(input.stock, 0);
        assert_eq!(input.price, Decimal::from(199_000));
    }

    #[test]
    fn test_update_product_can_clear_compare_price() {
        let input: UpdateProductInput =
            serde_json::from_str(r#"{"compareAtPrice":null}"#).unwrap();
        assert_eq!(input.compare_at_price, Some(None));
    }
}
