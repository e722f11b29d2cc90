//! Category service.
//!
//! The full category list is small and read on almost every catalog request,
//! so it is cached in-process with `moka` and invalidated on every write.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::{debug, instrument};

use lotus_core::catalog;
use lotus_core::{CategoryId, Slug};

use crate::db::RepositoryError;
use crate::db::categories::{CategoryRecord, CategoryRepository};
use crate::error::{AppError, Result};
use crate::models::category::{
    Breadcrumb, Category, CategoryDetail, CategoryFilter, CategoryTreeNode, CreateCategoryInput,
    UpdateCategoryInput,
};

/// In-process cache of the category table.
#[derive(Clone)]
pub struct CategoryCache {
    inner: Cache<(), Arc<Vec<Category>>>,
}

impl Default for CategoryCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

impl CategoryCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
        }
    }

    /// Drop the cached list.
    pub async fn invalidate(&self) {
        self.inner.invalidate(&()).await;
    }
}

/// Category reads and admin writes.
pub struct CatalogService<'a> {
    pool: &'a PgPool,
    cache: &'a CategoryCache,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, cache: &'a CategoryCache) -> Self {
        Self { pool, cache }
    }

    /// Every category, from cache when possible.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if loading fails.
    pub async fn all(&self) -> Result<Arc<Vec<Category>>> {
        if let Some(cached) = self.cache.inner.get(&()).await {
            debug!("Cache hit for categories");
            return Ok(cached);
        }

        let categories = Arc::new(CategoryRepository::new(self.pool).list_all().await?);
        self.cache.inner.insert((), Arc::clone(&categories)).await;
        Ok(categories)
    }

    /// Flat list, optionally only active ones or only children of a parent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if loading fails.
    pub async fn list(&self, filter: &CategoryFilter) -> Result<Vec<Category>> {
        let all = self.all().await?;
        let parent = filter.parent_id.map(CategoryId::new);

        let mut categories: Vec<Category> = all
            .iter()
            .filter(|c| filter.active != Some(true) || c.is_active)
            .filter(|c| parent.is_none() || c.parent_id == parent)
            .cloned()
            .collect();
        categories.sort_by(|a, b| {
            a.level
                .cmp(&b.level)
                .then(a.sort_order.cmp(&b.sort_order))
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(categories)
    }

    /// Nested tree. With `active_only`, inactive categories and everything
    /// below them are left out.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if loading fails.
    pub async fn tree(&self, active_only: bool) -> Result<Vec<CategoryTreeNode>> {
        let all = self.all().await?;
        let visible: Vec<Category> = if active_only {
            let hidden: Vec<CategoryId> = all
                .iter()
                .filter(|c| !c.is_active)
                .flat_map(|c| catalog::descendant_ids(all.as_slice(), c.id))
                .collect();
            all.iter()
                .filter(|c| !hidden.contains(&c.id))
                .cloned()
                .collect()
        } else {
            all.to_vec()
        };

        Ok(catalog::build_forest(&visible)
            .into_iter()
            .map(CategoryTreeNode::from)
            .collect())
    }

    /// Category with children, breadcrumbs and product count.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the category doesn't exist.
    pub async fn detail(&self, id: CategoryId) -> Result<CategoryDetail> {
        let all = self.all().await?;
        let category = all
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(category_not_found)?;
        self.build_detail(&all, category).await
    }

    /// Category detail looked up by slug.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no category has that slug.
    pub async fn detail_by_slug(&self, slug: &str) -> Result<CategoryDetail> {
        let all = self.all().await?;
        let category = all
            .iter()
            .find(|c| c.slug == slug)
            .cloned()
            .ok_or_else(category_not_found)?;
        self.build_detail(&all, category).await
    }

    async fn build_detail(&self, all: &[Category], category: Category) -> Result<CategoryDetail> {
        let mut children: Vec<Category> = all
            .iter()
            .filter(|c| c.parent_id == Some(category.id))
            .cloned()
            .collect();
        children.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then_with(|| a.name.cmp(&b.name))
        });

        let breadcrumbs = catalog::ancestors(all, category.id)
            .into_iter()
            .chain(std::iter::once(&category))
            .map(Breadcrumb::from)
            .collect();

        let subtree = catalog::descendant_ids(all, category.id);
        let product_count = CategoryRepository::new(self.pool)
            .count_active_products(&subtree)
            .await?;

        Ok(CategoryDetail {
            category,
            children,
            breadcrumbs,
            product_count,
        })
    }

    /// Resolve a product filter value (ID or slug) to the category and all
    /// its descendants. Unknown values give an empty list.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if loading fails.
    pub async fn subtree_ids(&self, id_or_slug: &str) -> Result<Vec<CategoryId>> {
        let all = self.all().await?;
        let root = id_or_slug.trim().parse::<i32>().map_or_else(
            |_| all.iter().find(|c| c.slug == id_or_slug.trim()).map(|c| c.id),
            |id| Some(CategoryId::new(id)),
        );
        Ok(root.map_or_else(Vec::new, |id| catalog::descendant_ids(all.as_slice(), id)))
    }

    /// Whether a category exists.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if loading fails.
    pub async fn exists(&self, id: CategoryId) -> Result<bool> {
        Ok(self.all().await?.iter().any(|c| c.id == id))
    }

    /// Create a category under an optional parent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a blank name, bad slug or unknown
    /// parent, and `AppError::Conflict` if the slug is taken.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: &CreateCategoryInput) -> Result<Category> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(AppError::bad_request(
                "Category name is required",
                "Vui lòng nhập tên danh mục",
            ));
        }
        let slug = resolve_slug(input.slug.as_deref(), name)?;

        let all = self.all().await?;
        let parent = match input.parent_id {
            Some(id) => Some(
                all.iter()
                    .find(|c| c.id == id)
                    .ok_or_else(|| AppError::from(catalog::TreeError::ParentNotFound(id)))?,
            ),
            None => None,
        };
        let path = catalog::child_path(parent.map(|p| p.path.as_str()), slug.as_str());

        let record = CategoryRecord {
            name,
            slug: slug.as_str(),
            description: input.description.as_deref(),
            image_url: input.image_url.as_deref(),
            parent_id: input.parent_id,
            path: &path,
            level: catalog::child_level(parent.map(|p| p.level)),
            sort_order: input.sort_order,
            is_active: input.is_active,
        };

        let category = CategoryRepository::new(self.pool)
            .create(&record)
            .await
            .map_err(slug_conflict)?;
        self.cache.invalidate().await;

        tracing::info!(category_id = %category.id, path = %category.path, "Category created");
        Ok(category)
    }

    /// Update a category. A new parent or slug rewrites the path and level of
    /// the whole subtree.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the category doesn't exist,
    /// `AppError::BadRequest` for an invalid parent or slug, and
    /// `AppError::Conflict` if the slug is taken.
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: CategoryId, input: &UpdateCategoryInput) -> Result<Category> {
        let all = self.all().await?;
        let current = all
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(category_not_found)?;

        let name = match input.name.as_deref().map(str::trim) {
            Some("") => {
                return Err(AppError::bad_request(
                    "Category name is required",
                    "Vui lòng nhập tên danh mục",
                ));
            }
            Some(name) => name.to_owned(),
            None => current.name.clone(),
        };
        let slug = match input.slug.as_deref() {
            Some(slug) => resolve_slug(Some(slug), &name)?.into_inner(),
            None => current.slug.clone(),
        };
        let parent_id = input.parent_id.unwrap_or(current.parent_id);
        if parent_id != current.parent_id {
            catalog::validate_parent(all.as_slice(), id, parent_id)?;
        }

        // Recompute paths against the tree as it will look after the update.
        let mut next: Vec<Category> = all.to_vec();
        if let Some(entry) = next.iter_mut().find(|c| c.id == id) {
            entry.slug.clone_from(&slug);
            entry.parent_id = parent_id;
        }
        let paths = catalog::subtree_paths(&next, id);
        let (path, level) = paths
            .iter()
            .find(|(node, _, _)| *node == id)
            .map_or_else(
                || (current.path.clone(), current.level),
                |(_, path, level)| (path.clone(), *level),
            );
        let descendants: Vec<(CategoryId, String, i32)> = paths
            .into_iter()
            .filter(|(node, new_path, _)| {
                *node != id
                    && all
                        .iter()
                        .find(|c| c.id == *node)
                        .is_none_or(|c| &c.path != new_path)
            })
            .collect();

        let description = input
            .description
            .as_deref()
            .or(current.description.as_deref());
        let image_url = input.image_url.as_deref().or(current.image_url.as_deref());
        let record = CategoryRecord {
            name: &name,
            slug: &slug,
            description,
            image_url,
            parent_id,
            path: &path,
            level,
            sort_order: input.sort_order.unwrap_or(current.sort_order),
            is_active: input.is_active.unwrap_or(current.is_active),
        };

        let category = CategoryRepository::new(self.pool)
            .update(id, &record, &descendants)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => category_not_found(),
                other => slug_conflict(other),
            })?;
        self.cache.invalidate().await;

        tracing::info!(
            category_id = %id,
            moved = descendants.len(),
            "Category updated"
        );
        Ok(category)
    }

    /// Delete a category with no subcategories and no products.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if it doesn't exist and
    /// `AppError::Conflict` if anything still references it.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: CategoryId) -> Result<()> {
        CategoryRepository::new(self.pool)
            .delete(id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => category_not_found(),
                RepositoryError::Conflict(what) if what == "subcategories" => AppError::conflict(
                    "Category has subcategories",
                    "Danh mục vẫn còn danh mục con",
                ),
                RepositoryError::Conflict(_) => AppError::conflict(
                    "Category still has products",
                    "Danh mục vẫn còn sản phẩm",
                ),
                other => AppError::Database(other),
            })?;
        self.cache.invalidate().await;

        tracing::info!(category_id = %id, "Category deleted");
        Ok(())
    }
}

/// Use the given slug if well formed, otherwise derive one from the name.
fn resolve_slug(requested: Option<&str>, name: &str) -> Result<Slug> {
    match requested.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) => Slug::parse(slug).map_err(|_| {
            AppError::bad_request(
                "Slug may only contain lowercase letters, digits and dashes",
                "Slug chỉ được chứa chữ thường, chữ số và dấu gạch ngang",
            )
        }),
        None => Slug::from_title(name).map_err(|_| {
            AppError::bad_request(
                "Cannot derive a slug from this name",
                "Không thể tạo slug từ tên này",
            )
        }),
    }
}

fn slug_conflict(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::Conflict(_) => {
            AppError::conflict("Category slug already exists", "Slug danh mục đã tồn tại")
        }
        other => AppError::Database(other),
    }
}

const fn category_not_found() -> AppError {
    AppError::not_found("Category not found", "Không tìm thấy danh mục")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_slug_prefers_explicit() {
        assert_eq!(
            resolve_slug(Some("dien-thoai"), "Điện thoại di động").unwrap().as_str(),
            "dien-thoai"
        );
        assert_eq!(
            resolve_slug(None, "Điện thoại di động").unwrap().as_str(),
            "dien-thoai-di-dong"
        );
        assert_eq!(
            resolve_slug(Some("  "), "Phụ kiện").unwrap().as_str(),
            "phu-kien"
        );
    }

    #[test]
    fn test_resolve_slug_rejects_malformed() {
        let err = resolve_slug(Some("Bad Slug"), "x").unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cache_invalidate_is_idempotent() {
        let cache = CategoryCache::default();
        cache.invalidate().await;
        assert!(cache.inner.get(&()).await.is_none());
    }
}
