//! Seed the database with a sample catalog or an admin account.
//!
//! Catalog seeding reads categories (nested) and products from YAML and is
//! idempotent: anything whose slug already exists is left untouched.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info};

use lotus_api::db;
use lotus_api::error::AppError;
use lotus_api::models::category::CreateCategoryInput;
use lotus_api::models::product::CreateProductInput;
use lotus_api::services::auth::{AuthError, AuthService};
use lotus_api::services::catalog::{CatalogService, CategoryCache};
use lotus_api::services::products::ProductService;
use lotus_core::{CategoryId, Slug, UserRole};

/// Contents of a catalog seed file.
#[derive(Debug, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub categories: Vec<CategorySeed>,
    #[serde(default)]
    pub products: Vec<ProductSeed>,
}

/// A category and its subcategories.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySeed {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub children: Vec<CategorySeed>,
}

impl CategorySeed {
    fn slug(&self) -> Result<String, lotus_core::SlugError> {
        match &self.slug {
            Some(slug) => Ok(slug.clone()),
            None => Slug::from_title(&self.name).map(Slug::into_inner),
        }
    }
}

/// A product, placed in a category by slug.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSeed {
    pub name: String,
    pub slug: Option<String>,
    pub sku: String,
    /// Slug of a category in the same file.
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub short_description: Option<String>,
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
    #[serde(default)]
    pub featured: bool,
}

impl ProductSeed {
    fn slug(&self) -> Result<String, lotus_core::SlugError> {
        match &self.slug {
            Some(slug) => Ok(slug.clone()),
            None => Slug::from_title(&self.name).map(Slug::into_inner),
        }
    }
}

/// Problems that would make seeding fail part-way.
#[must_use]
pub fn validate(seed: &CatalogSeed) -> Vec<String> {
    let mut errors = Vec::new();

    let mut category_slugs = HashSet::new();
    let mut queue: VecDeque<&CategorySeed> = seed.categories.iter().collect();
    while let Some(category) = queue.pop_front() {
        match category.slug() {
            Ok(slug) => {
                if !category_slugs.insert(slug.clone()) {
                    errors.push(format!("duplicate category slug '{slug}'"));
                }
            }
            Err(e) => errors.push(format!("category '{}': {e}", category.name)),
        }
        queue.extend(category.children.iter());
    }

    let mut skus = HashSet::new();
    for product in &seed.products {
        if !skus.insert(product.sku.to_uppercase()) {
            errors.push(format!("duplicate SKU '{}'", product.sku));
        }
        if !category_slugs.contains(&product.category) {
            errors.push(format!(
                "product '{}' references unknown category '{}'",
                product.name, product.category
            ));
        }
        if product.price < Decimal::ZERO || product.stock < 0 {
            errors.push(format!(
                "product '{}' has a negative price or stock",
                product.name
            ));
        }
        if let Err(e) = product.slug() {
            errors.push(format!("product '{}': {e}", product.name));
        }
    }
    errors
}

/// Seed categories and products from a YAML file.
///
/// # Errors
///
/// Returns an error if the file can't be read or fails validation, or if a
/// database operation fails.
pub async fn catalog(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog from file");
    let content = tokio::fs::read_to_string(path).await?;
    let seed: CatalogSeed = serde_yaml::from_str(&content)?;

    let errors = validate(&seed);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let database_url = super::database_url()?;
    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let cache = CategoryCache::default();
    let categories = CatalogService::new(&pool, &cache);
    let products = ProductService::new(&pool, &cache);

    let mut created_categories = 0;
    let mut category_ids: BTreeMap<String, CategoryId> = BTreeMap::new();
    let mut queue: VecDeque<(Option<CategoryId>, &CategorySeed)> =
        seed.categories.iter().map(|c| (None, c)).collect();

    while let Some((parent_id, category)) = queue.pop_front() {
        let slug = category.slug()?;
        let id = match categories.detail_by_slug(&slug).await {
            Ok(existing) => existing.category.id,
            Err(AppError::NotFound(_)) => {
                let input = CreateCategoryInput {
                    name: category.name.clone(),
                    slug: Some(slug.clone()),
                    description: category.description.clone(),
                    image_url: category.image_url.clone(),
                    parent_id,
                    sort_order: category.sort_order,
                    is_active: true,
                };
                created_categories += 1;
                categories.create(&input).await?.id
            }
            Err(e) => return Err(e.into()),
        };
        category_ids.insert(slug, id);
        queue.extend(category.children.iter().map(|child| (Some(id), child)));
    }

    let mut created_products = 0;
    let mut skipped_products = 0;
    for product in &seed.products {
        let slug = product.slug()?;
        match products.get_by_slug(&slug, true).await {
            Ok(_) => {
                skipped_products += 1;
                continue;
            }
            Err(AppError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let category_id = *category_ids
            .get(&product.category)
            .ok_or_else(|| format!("unknown category '{}'", product.category))?;
        let input = CreateProductInput {
            name: product.name.clone(),
            slug: Some(slug),
            sku: product.sku.clone(),
            description: product.description.clone(),
            short_description: product.short_description.clone(),
            category_id,
            brand: product.brand.clone(),
            price: product.price,
            compare_at_price: product.compare_at_price,
            stock: product.stock,
            images: product.images.clone(),
            specifications: product.specifications.clone(),
            tags: product.tags.clone(),
            is_active: true,
            is_featured: product.featured,
        };
        products.create(&input).await?;
        created_products += 1;
    }

    info!("Seeding complete!");
    info!("  Categories created: {created_categories}");
    info!("  Products created: {created_products}");
    info!("  Products skipped (already exist): {skipped_products}");
    Ok(())
}

/// Create an admin account.
///
/// # Errors
///
/// Returns an error if the email is invalid or taken, the password is too
/// weak, or the database is unreachable.
pub async fn admin(email: &str, password: &str, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url()?;
    let pool = db::create_pool(&database_url).await?;

    info!("Creating admin user: {email}");
    let user = match AuthService::new(&pool)
        .create_account(email, password, name, None, UserRole::Admin)
        .await
    {
        Ok(user) => user,
        Err(AuthError::UserAlreadyExists) => {
            return Err(format!("A user already exists with email: {email}").into());
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user.id, "Admin user created");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = include_str!("../../../../data/catalog.yaml");

    #[test]
    fn test_bundled_catalog_is_valid() {
        let seed: CatalogSeed = serde_yaml::from_str(SAMPLE).unwrap();
        assert!(!seed.categories.is_empty());
        assert!(!seed.products.is_empty());
        assert_eq!(validate(&seed), Vec::<String>::new());
    }

    #[test]
    fn test_unknown_category_reported() {
        let seed: CatalogSeed = serde_yaml::from_str(
            r#"
categories:
  - name: Electronics
products:
  - name: Mystery Box
    sku: MB-1
    category: toys
    price: "100000"
"#,
        )
        .unwrap();
        let errors = validate(&seed);
        assert_eq!(errors.len(), 1);
        assert!(errors.first().unwrap().contains("unknown category 'toys'"));
    }

    #[test]
    fn test_duplicate_sku_is_case_insensitive() {
        let seed: CatalogSeed = serde_yaml::from_str(
            r#"
categories:
  - name: Books
    slug: books
products:
  - { name: A, sku: bk-1, category: books, price: "1000" }
  - { name: B, sku: BK-1, category: books, price: "1000" }
"#,
        )
        .unwrap();
        assert!(validate(&seed).iter().any(|e| e.contains("duplicate SKU")));
    }

    #[test]
    fn test_nested_slugs_collected() {
        let seed: CatalogSeed = serde_yaml::from_str(
            r#"
categories:
  - name: Home
    slug: home
    children:
      - name: Kitchen
        slug: kitchen
products:
  - { name: Pan, sku: KT-1, category: kitchen, price: "250000", stock: 3 }
"#,
        )
        .unwrap();
        assert!(validate(&seed).is_empty());
    }
}
