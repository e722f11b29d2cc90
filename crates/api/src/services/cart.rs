//! Cart and wishlist service.

use sqlx::PgPool;
use tracing::instrument;

use lotus_core::pricing::{ShippingRules, Totals};
use lotus_core::{ProductId, UserId};

use crate::db::{CartRepository, ProductRepository, RepositoryError, WishlistRepository};
use crate::error::{AppError, Result};
use crate::models::cart::{Cart, CartLine, WishlistEntry};
use crate::models::product::Product;

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: i32 = 99;

/// The caller's cart.
pub struct CartService<'a> {
    pool: &'a PgPool,
    shipping: &'a ShippingRules,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, shipping: &'a ShippingRules) -> Self {
        Self { pool, shipping }
    }

    /// Lines with live product data and totals over the available lines.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if loading fails.
    pub async fn get(&self, user_id: UserId) -> Result<Cart> {
        let items = CartRepository::new(self.pool).list(user_id).await?;
        let lines: Vec<CartLine> = items
            .iter()
            .map(|item| CartLine::new(&item.product, item.quantity, item.added_at))
            .collect();
        Ok(build_cart(lines, self.shipping))
    }

    /// Add `quantity` units, incrementing an existing line.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a non-positive quantity, an inactive
    /// product or not enough stock, and `AppError::NotFound` for an unknown
    /// product.
    #[instrument(skip(self))]
    pub async fn add(&self, user_id: UserId, product_id: ProductId, quantity: i32) -> Result<Cart> {
        if quantity <= 0 {
            return Err(invalid_quantity());
        }
        let product = self.purchasable(product_id).await?;
        check_quantity(&product, quantity)?;

        let repo = CartRepository::new(self.pool);
        if repo
            .increment(user_id, product_id, quantity, line_limit(&product))
            .await?
            .is_none()
        {
            let current = repo.quantity_of(user_id, product_id).await?.unwrap_or(0);
            check_quantity(&product, current.saturating_add(quantity))?;
            return Err(AppError::conflict(
                "Cart changed while adding, please try again",
                "Giỏ hàng vừa thay đổi, vui lòng thử lại",
            ));
        }
        self.get(user_id).await
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product isn't in the cart and
    /// `AppError::BadRequest` for a quantity the product can't cover.
    #[instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<Cart> {
        if quantity < 0 {
            return Err(invalid_quantity());
        }
        if quantity == 0 {
            return self.remove(user_id, product_id).await;
        }

        let repo = CartRepository::new(self.pool);
        if repo.quantity_of(user_id, product_id).await?.is_none() {
            return Err(not_in_cart());
        }
        let product = self.purchasable(product_id).await?;
        check_quantity(&product, quantity)?;

        repo.upsert(user_id, product_id, quantity).await?;
        self.get(user_id).await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product isn't in the cart.
    #[instrument(skip(self))]
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<Cart> {
        CartRepository::new(self.pool)
            .remove(user_id, product_id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => not_in_cart(),
                other => AppError::Database(other),
            })?;
        self.get(user_id).await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the delete fails.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: UserId) -> Result<Cart> {
        CartRepository::new(self.pool).clear(user_id).await?;
        Ok(build_cart(Vec::new(), self.shipping))
    }

    async fn purchasable(&self, product_id: ProductId) -> Result<Product> {
        let product = ProductRepository::new(self.pool)
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| AppError::not_found("Product not found", "Không tìm thấy sản phẩm"))?;
        if !product.is_active {
            return Err(AppError::bad_request(
                "Product is no longer available",
                "Sản phẩm không còn được bán",
            ));
        }
        Ok(product)
    }
}

/// Saved products of the caller.
pub struct WishlistService<'a> {
    pool: &'a PgPool,
}

impl<'a> WishlistService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if loading fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<WishlistEntry>> {
        Ok(WishlistRepository::new(self.pool).list(user_id).await?)
    }

    /// Save a product.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown or inactive product and
    /// `AppError::Conflict` if it is already saved.
    #[instrument(skip(self))]
    pub async fn add(&self, user_id: UserId, product_id: ProductId) -> Result<Vec<WishlistEntry>> {
        ProductRepository::new(self.pool)
            .get_by_id(product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| AppError::not_found("Product not found", "Không tìm thấy sản phẩm"))?;

        let repo = WishlistRepository::new(self.pool);
        repo.add(user_id, product_id).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => AppError::conflict(
                "Product is already in your wishlist",
                "Sản phẩm đã có trong danh sách yêu thích",
            ),
            other => AppError::Database(other),
        })?;
        Ok(repo.list(user_id).await?)
    }

    /// Remove a saved product.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if it isn't saved.
    #[instrument(skip(self))]
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<Vec<WishlistEntry>> {
        let repo = WishlistRepository::new(self.pool);
        repo.remove(user_id, product_id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => not_in_wishlist(),
                other => AppError::Database(other),
            })?;
        Ok(repo.list(user_id).await?)
    }

    /// Add a saved product to the cart and drop it from the wishlist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if it isn't saved, plus any error from
    /// [`CartService::add`].
    #[instrument(skip(self, cart))]
    pub async fn move_to_cart(
        &self,
        cart: &CartService<'_>,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<Cart> {
        let repo = WishlistRepository::new(self.pool);
        if !repo.contains(user_id, product_id).await? {
            return Err(not_in_wishlist());
        }

        let updated = cart.add(user_id, product_id, quantity).await?;
        repo.remove(user_id, product_id).await?;
        Ok(updated)
    }
}

/// Assemble a cart. Totals only count lines that can be fulfilled.
fn build_cart(items: Vec<CartLine>, shipping: &ShippingRules) -> Cart {
    let totals = Totals::compute(
        items
            .iter()
            .filter(|line| line.available)
            .map(|line| (line.unit_price, line.quantity)),
        shipping,
        rust_decimal::Decimal::ZERO,
    );
    let item_count = items.iter().map(|line| line.quantity).sum();
    Cart {
        items,
        item_count,
        totals,
    }
}

/// Most units of `product` one cart line may hold.
fn line_limit(product: &Product) -> i32 {
    product.stock.clamp(0, MAX_LINE_QUANTITY)
}

fn check_quantity(product: &Product, quantity: i32) -> Result<()> {
    if quantity > MAX_LINE_QUANTITY {
        return Err(AppError::bad_request(
            "At most 99 units per product",
            "Tối đa 99 sản phẩm cho mỗi mặt hàng",
        ));
    }
    if quantity > product.stock {
        return Err(AppError::BadRequest(crate::error::Message::owned(
            format!("Only {} units of {} left in stock", product.stock, product.name),
            format!("Chỉ còn {} sản phẩm {} trong kho", product.stock, product.name),
        )));
    }
    Ok(())
}

const fn invalid_quantity() -> AppError {
    AppError::bad_request(
        "Quantity must be at least 1",
        "Số lượng phải lớn hơn hoặc bằng 1",
    )
}

const fn not_in_cart() -> AppError {
    AppError::not_found("Product is not in your cart", "Sản phẩm không có trong giỏ hàng")
}

const fn not_in_wishlist() -> AppError {
    AppError::not_found(
        "Product is not in your wishlist",
        "Sản phẩm không có trong danh sách yêu thích",
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use lotus_core::CategoryId;
    use rust_decimal::Decimal;

    use super::*;

    fn product(price: i64, stock: i32, is_active: bool) -> Product {
        Product {
            id: ProductId::new(1),
            name: "Nồi cơm điện".to_string(),
            slug: "noi-com-dien".to_string(),
            sku: "NCD-01".to_string(),
            description: String::new(),
            short_description: None,
            category_id: CategoryId::new(1),
            brand: None,
            price: Decimal::from(price),
            compare_at_price: None,
            stock,
            images: vec![],
            specifications: BTreeMap::new(),
            tags: vec![],
            rating_average: Decimal::ZERO,
            rating_count: 0,
            sold_count: 0,
            is_active,
            is_featured: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_check_quantity() {
        let p = product(100_000, 5, true);
        assert!(check_quantity(&p, 5).is_ok());
        assert!(check_quantity(&p, 6).is_err());
        let plenty = product(100_000, 1_000, true);
        assert!(check_quantity(&plenty, 100).is_err());
    }

    #[test]
    fn test_line_limit() {
        assert_eq!(line_limit(&product(100_000, 5, true)), 5);
        assert_eq!(line_limit(&product(100_000, 1_000, true)), MAX_LINE_QUANTITY);
        assert_eq!(line_limit(&product(100_000, -2, true)), 0);
    }

    #[test]
    fn test_build_cart_skips_unavailable_lines_in_totals() {
        let now = Utc::now();
        let lines = vec![
            CartLine::new(&product(200_000, 10, true), 2, now),
            CartLine::new(&product(90_000, 10, false), 1, now),
        ];
        let cart = build_cart(lines, &ShippingRules::default());
        assert_eq!(cart.item_count, 3);
        assert_eq!(cart.totals.subtotal, Decimal::from(400_000));
        assert_eq!(cart.totals.shipping_fee, Decimal::from(30_000));
        assert_eq!(cart.totals.total, Decimal::from(430_000));
    }

    #[test]
    fn test_empty_cart_ships_free() {
        let cart = build_cart(Vec::new(), &ShippingRules::default());
        assert_eq!(cart.item_count, 0);
        assert_eq!(cart.totals.total, Decimal::ZERO);
    }
}
