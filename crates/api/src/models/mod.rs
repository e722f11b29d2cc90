//! Domain models and request/response types.
//!
//! Models serialize to camelCase JSON. Internal row types live next to the
//! queries in `crate::db`.

pub mod cart;
pub mod category;
pub mod loyalty;
pub mod order;
pub mod product;
pub mod user;

use serde::{Deserialize, Deserializer, Serialize};

use crate::db::{PageRequest, Paged};

/// Pagination metadata returned with list responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    #[must_use]
    pub fn new(page: PageRequest, total: i64) -> Self {
        let limit = i64::from(page.limit);
        Self {
            page: page.page,
            limit: page.limit,
            total,
            total_pages: (total + limit - 1) / limit,
        }
    }
}

impl<T> From<&Paged<T>> for Pagination {
    fn from(paged: &Paged<T>) -> Self {
        Self::new(paged.page, paged.total)
    }
}

/// Deserialize a field that distinguishes "absent" from "null".
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`:
/// absent gives `None`, `null` gives `Some(None)`.
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_total_pages() {
        let page = PageRequest::new(Some(2), Some(20));
        assert_eq!(Pagination::new(page, 0).total_pages, 0);
        assert_eq!(Pagination::new(page, 20).total_pages, 1);
        assert_eq!(Pagination::new(page, 41).total_pages, 3);
    }

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        parent_id: Option<Option<i32>>,
    }

    #[test]
    fn test_double_option() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.parent_id, None);
        let null: Patch = serde_json::from_str(r#"{"parent_id":null}"#).unwrap();
        assert_eq!(null.parent_id, Some(None));
        let set: Patch = serde_json::from_str(r#"{"parent_id":7}"#).unwrap();
        assert_eq!(set.parent_id, Some(Some(7)));
    }
}
