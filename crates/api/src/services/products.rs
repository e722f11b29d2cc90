//! Product catalog and review service.

use sqlx::PgPool;
use tracing::instrument;

use lotus_core::{ProductId, Sku, Slug, UserId};

use super::catalog::{CatalogService, CategoryCache};
use crate::db::products::ProductRecord;
use crate::db::{PageRequest, Paged, ProductRepository, RepositoryError, ReviewRepository};
use crate::error::{AppError, Result};
use crate::models::product::{
    CreateProductInput, MAX_STOCK, Product, ProductFilter, ProductQuery, Review, ReviewInput,
    StockChange, StockInputError, StockUpdateInput, UpdateProductInput,
};

/// Product reads, admin writes and customer reviews.
pub struct ProductService<'a> {
    pool: &'a PgPool,
    categories: CatalogService<'a>,
}

impl<'a> ProductService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, cache: &'a CategoryCache) -> Self {
        Self {
            pool,
            categories: CatalogService::new(pool, cache),
        }
    }

    /// Filtered, sorted page of products. Inactive products are only listed
    /// for admins.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if the price range is inverted.
    #[instrument(skip(self, filter))]
    pub async fn list(&self, filter: &ProductFilter, include_inactive: bool) -> Result<Paged<Product>> {
        if let (Some(min), Some(max)) = (filter.min_price, filter.max_price)
            && min > max
        {
            return Err(AppError::bad_request(
                "minPrice must not exceed maxPrice",
                "Giá tối thiểu không được lớn hơn giá tối đa",
            ));
        }

        let category_ids = match filter.category.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => Some(self.categories.subtree_ids(value).await?),
            _ => None,
        };

        let query = ProductQuery {
            search: non_blank(filter.q.as_deref()),
            category_ids,
            min_price: filter.min_price,
            max_price: filter.max_price,
            tag: non_blank(filter.tag.as_deref()).map(|t| t.to_lowercase()),
            brand: non_blank(filter.brand.as_deref()),
            featured: filter.featured,
            in_stock: filter.in_stock,
            include_inactive,
            sort: filter.sort.unwrap_or_default(),
        };

        Ok(ProductRepository::new(self.pool)
            .list(&query, PageRequest::new(filter.page, filter.limit))
            .await?)
    }

    /// A product by ID. Inactive products are hidden from customers.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product doesn't exist or is hidden.
    pub async fn get(&self, id: ProductId, include_inactive: bool) -> Result<Product> {
        ProductRepository::new(self.pool)
            .get_by_id(id)
            .await?
            .filter(|p| include_inactive || p.is_active)
            .ok_or_else(product_not_found)
    }

    /// A product by slug. Inactive products are hidden from customers.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product doesn't exist or is hidden.
    pub async fn get_by_slug(&self, slug: &str, include_inactive: bool) -> Result<Product> {
        ProductRepository::new(self.pool)
            .get_by_slug(slug)
            .await?
            .filter(|p| include_inactive || p.is_active)
            .ok_or_else(product_not_found)
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for invalid fields or an unknown
    /// category, and `AppError::Conflict` for a duplicate SKU or slug.
    #[instrument(skip(self, input), fields(sku = %input.sku))]
    pub async fn create(&self, input: &CreateProductInput) -> Result<Product> {
        let name = required_name(&input.name)?;
        let record = ProductRecord {
            slug: product_slug(input.slug.as_deref(), &name)?,
            sku: parse_sku(&input.sku)?,
            name,
            description: input.description.trim().to_owned(),
            short_description: non_blank(input.short_description.as_deref()),
            category_id: input.category_id,
            brand: non_blank(input.brand.as_deref()),
            price: input.price,
            compare_at_price: input.compare_at_price,
            stock: input.stock,
            images: input.images.clone(),
            specifications: input.specifications.clone(),
            tags: normalize_tags(&input.tags),
            is_active: input.is_active,
            is_featured: input.is_featured,
        };
        self.validate(&record).await?;

        let product = ProductRepository::new(self.pool)
            .create(&record)
            .await
            .map_err(write_conflict)?;

        tracing::info!(product_id = %product.id, sku = %product.sku, "Product created");
        Ok(product)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Same as [`Self::create`], plus `AppError::NotFound` for an unknown ID.
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: ProductId, input: &UpdateProductInput) -> Result<Product> {
        let repo = ProductRepository::new(self.pool);
        let current = repo.get_by_id(id).await?.ok_or_else(product_not_found)?;
        let mut record = ProductRecord::from(current);

        if let Some(name) = &input.name {
            record.name = required_name(name)?;
        }
        if let Some(slug) = &input.slug {
            record.slug = product_slug(Some(slug), &record.name)?;
        }
        if let Some(sku) = &input.sku {
            record.sku = parse_sku(sku)?;
        }
        if let Some(description) = &input.description {
            record.description = description.trim().to_owned();
        }
        if let Some(short) = &input.short_description {
            record.short_description = non_blank(Some(short));
        }
        if let Some(category_id) = input.category_id {
            record.category_id = category_id;
        }
        if let Some(brand) = &input.brand {
            record.brand = non_blank(Some(brand));
        }
        if let Some(price) = input.price {
            record.price = price;
        }
        if let Some(compare_at_price) = input.compare_at_price {
            record.compare_at_price = compare_at_price;
        }
        if let Some(stock) = input.stock {
            record.stock = stock;
        }
        if let Some(images) = &input.images {
            record.images.clone_from(images);
        }
        if let Some(specifications) = &input.specifications {
            record.specifications.clone_from(specifications);
        }
        if let Some(tags) = &input.tags {
            record.tags = normalize_tags(tags);
        }
        if let Some(is_active) = input.is_active {
            record.is_active = is_active;
        }
        if let Some(is_featured) = input.is_featured {
            record.is_featured = is_featured;
        }
        self.validate(&record).await?;

        let product = repo
            .update(id, &record)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => product_not_found(),
                other => write_conflict(other),
            })?;

        tracing::info!(product_id = %id, "Product updated");
        Ok(product)
    }

    /// Delete a product. Order snapshots keep their copy of the details.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product doesn't exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: ProductId) -> Result<()> {
        ProductRepository::new(self.pool)
            .delete(id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => product_not_found(),
                other => AppError::Database(other),
            })?;

        tracing::info!(product_id = %id, "Product deleted");
        Ok(())
    }

    /// Change stock by a delta or to an absolute level.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` unless exactly one of `delta`/`set` is
    /// given, or if the result would be negative.
    #[instrument(skip(self))]
    pub async fn update_stock(&self, id: ProductId, input: StockUpdateInput) -> Result<Product> {
        let change = input.validate().map_err(stock_input_error)?;
        let repo = ProductRepository::new(self.pool);
        let product = match change {
            StockChange::Delta(delta) => match repo.adjust_stock(id, delta).await? {
                Some(product) => product,
                None => {
                    // Distinguish a missing product from an out-of-range result.
                    repo.get_by_id(id).await?.ok_or_else(product_not_found)?;
                    return Err(stock_input_error(StockInputError::Negative));
                }
            },
            StockChange::Set(set) => repo.set_stock(id, set).await.map_err(|e| match e {
                RepositoryError::NotFound => product_not_found(),
                other => AppError::Database(other),
            })?,
        };

        tracing::info!(product_id = %id, stock = product.stock, "Stock updated");
        Ok(product)
    }

    /// Reviews of an active product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product doesn't exist.
    pub async fn reviews(&self, product_id: ProductId, page: PageRequest) -> Result<Paged<Review>> {
        self.get(product_id, false).await?;
        Ok(ReviewRepository::new(self.pool)
            .list_for_product(product_id, page)
            .await?)
    }

    /// Create or replace the caller's review and refresh the product rating.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a rating outside 1 to 5 and
    /// `AppError::NotFound` if the product doesn't exist.
    #[instrument(skip(self, input))]
    pub async fn review(
        &self,
        product_id: ProductId,
        user_id: UserId,
        input: &ReviewInput,
    ) -> Result<Review> {
        if !(1..=5).contains(&input.rating) {
            return Err(AppError::bad_request(
                "Rating must be between 1 and 5",
                "Điểm đánh giá phải từ 1 đến 5",
            ));
        }
        self.get(product_id, false).await?;

        let comment = non_blank(input.comment.as_deref());
        Ok(ReviewRepository::new(self.pool)
            .upsert(product_id, user_id, input.rating, comment.as_deref())
            .await?)
    }

    /// Remove the caller's review.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if there is no such review.
    pub async fn delete_review(&self, product_id: ProductId, user_id: UserId) -> Result<()> {
        ReviewRepository::new(self.pool)
            .delete(product_id, user_id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => {
                    AppError::not_found("Review not found", "Không tìm thấy đánh giá")
                }
                other => AppError::Database(other),
            })
    }

    async fn validate(&self, record: &ProductRecord) -> Result<()> {
        if record.price < rust_decimal::Decimal::ZERO {
            return Err(AppError::bad_request(
                "Price cannot be negative",
                "Giá không được âm",
            ));
        }
        if record
            .compare_at_price
            .is_some_and(|p| p < rust_decimal::Decimal::ZERO)
        {
            return Err(AppError::bad_request(
                "Compare-at price cannot be negative",
                "Giá gốc không được âm",
            ));
        }
        if !(0..=MAX_STOCK).contains(&record.stock) {
            return Err(stock_input_error(StockInputError::Negative));
        }
        if !self.categories.exists(record.category_id).await? {
            return Err(AppError::bad_request(
                "Category not found",
                "Không tìm thấy danh mục",
            ));
        }
        Ok(())
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn required_name(name: &str) -> Result<String> {
    non_blank(Some(name)).ok_or_else(|| {
        AppError::bad_request("Product name is required", "Vui lòng nhập tên sản phẩm")
    })
}

fn parse_sku(sku: &str) -> Result<String> {
    Sku::parse(sku)
        .map(|s| s.as_str().to_owned())
        .map_err(|_| AppError::bad_request("Invalid SKU", "Mã SKU không hợp lệ"))
}

fn product_slug(requested: Option<&str>, name: &str) -> Result<String> {
    let slug = match requested.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) => Slug::parse(slug),
        None => Slug::from_title(name),
    };
    slug.map(Slug::into_inner).map_err(|_| {
        AppError::bad_request(
            "Slug may only contain lowercase letters, digits and dashes",
            "Slug chỉ được chứa chữ thường, chữ số và dấu gạch ngang",
        )
    })
}

/// Trim, lowercase and de-duplicate tags, keeping first-seen order.
fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

fn write_conflict(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::Conflict(what) if what == "sku" => {
            AppError::conflict("SKU already exists", "Mã SKU đã tồn tại")
        }
        RepositoryError::Conflict(what) if what == "category" => {
            AppError::bad_request("Category not found", "Không tìm thấy danh mục")
        }
        RepositoryError::Conflict(_) => {
            AppError::conflict("Product slug already exists", "Slug sản phẩm đã tồn tại")
        }
        other => AppError::Database(other),
    }
}

const fn stock_input_error(err: StockInputError) -> AppError {
    match err {
        StockInputError::Ambiguous => AppError::bad_request(
            "Provide exactly one of delta or set",
            "Chỉ được cung cấp một trong hai giá trị delta hoặc set",
        ),
        StockInputError::Negative => AppError::bad_request(
            "Stock must stay between 0 and 1,000,000",
            "Tồn kho phải nằm trong khoảng từ 0 đến 1.000.000",
        ),
        StockInputError::TooLarge => AppError::bad_request(
            "Stock changes are limited to 1,000,000 units",
            "Mỗi lần thay đổi tồn kho tối đa 1.000.000 sản phẩm",
        ),
    }
}

const fn product_not_found() -> AppError {
    AppError::not_found("Product not found", "Không tìm thấy sản phẩm")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    #[test]
    fn test_normalize_tags() {
        let tags = vec![
            " Sale ".to_string(),
            "sale".to_string(),
            String::new(),
            "Điện Thoại".to_string(),
        ];
        assert_eq!(normalize_tags(&tags), vec!["sale", "điện thoại"]);
    }

    #[test]
    fn test_product_slug_from_name() {
        assert_eq!(
            product_slug(None, "Tai nghe Bluetooth Sony").unwrap(),
            "tai-nghe-bluetooth-sony"
        );
        assert_eq!(product_slug(Some("tai-nghe"), "x").unwrap(), "tai-nghe");
        assert_eq!(
            product_slug(Some("Tai Nghe"), "x").unwrap_err().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_write_conflict_messages() {
        let sku = write_conflict(RepositoryError::Conflict("sku".to_string()));
        assert_eq!(sku.message().en, "SKU already exists");
        let slug = write_conflict(RepositoryError::Conflict("slug".to_string()));
        assert_eq!(slug.status(), StatusCode::CONFLICT);
        let category = write_conflict(RepositoryError::Conflict("category".to_string()));
        assert_eq!(category.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_stock_input_errors_are_bad_requests() {
        for err in [
            StockInputError::Ambiguous,
            StockInputError::Negative,
            StockInputError::TooLarge,
        ] {
            assert_eq!(stock_input_error(err).status(), StatusCode::BAD_REQUEST);
        }
        assert_eq!(
            stock_input_error(StockInputError::TooLarge).message().en,
            "Stock changes are limited to 1,000,000 units"
        );
    }

    #[test]
    fn test_required_name() {
        assert!(required_name("   ").is_err());
        assert_eq!(required_name(" Áo thun ").unwrap(), "Áo thun");
    }
}
