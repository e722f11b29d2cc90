//! Category types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use lotus_core::CategoryId;
use lotus_core::catalog::{TreeEntry, TreeNode};

use super::double_option;

/// A product category.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[schema(value_type = i32)]
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    #[schema(value_type = Option<i32>)]
    pub parent_id: Option<CategoryId>,
    /// Slash-joined slugs from the root down to this category.
    pub path: String,
    /// Depth in the tree, 0 for roots.
    pub level: i32,
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TreeNode for Category {
    fn id(&self) -> CategoryId {
        self.id
    }

    fn parent_id(&self) -> Option<CategoryId> {
        self.parent_id
    }

    fn slug(&self) -> &str {
        &self.slug
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn sort_order(&self) -> i32 {
        self.sort_order
    }
}

/// A category with its subtree.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTreeNode {
    #[serde(flatten)]
    pub category: Category,
    #[schema(no_recursion)]
    pub children: Vec<CategoryTreeNode>,
}

impl From<TreeEntry<Category>> for CategoryTreeNode {
    fn from(entry: TreeEntry<Category>) -> Self {
        Self {
            category: entry.item,
            children: entry.children.into_iter().map(Self::from).collect(),
        }
    }
}

/// Breadcrumb link.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Breadcrumb {
    #[schema(value_type = i32)]
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
}

impl From<&Category> for Breadcrumb {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
            slug: category.slug.clone(),
        }
    }
}

/// A category with its direct children and the trail from the root.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDetail {
    #[serde(flatten)]
    pub category: Category,
    pub children: Vec<Category>,
    pub breadcrumbs: Vec<Breadcrumb>,
    /// Active products in this category and its descendants.
    pub product_count: i64,
}

/// New category.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryInput {
    pub name: String,
    /// Derived from the name when omitted.
    pub slug: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    #[schema(value_type = Option<i32>)]
    pub parent_id: Option<CategoryId>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Partial category update. `parentId: null` moves the category to the root.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i32>)]
    pub parent_id: Option<Option<CategoryId>>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
}

/// Category list filter.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CategoryFilter {
    /// Only active categories when `true`.
    pub active: Option<bool>,
    /// Only direct children of this category.
    pub parent_id: Option<i32>,
}

const fn default_true() -> bool {
    true
}
