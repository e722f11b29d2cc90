//! Category tree algorithms.
//!
//! Categories are stored flat with a parent reference. These helpers turn the
//! flat list into a forest, walk it, and check that a reparent keeps the tree
//! acyclic. They work over any type implementing [`TreeNode`], so the API can
//! feed its own category rows in directly.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;

use crate::CategoryId;

/// Separator between slugs in a materialized category path.
pub const PATH_SEPARATOR: &str = "/";

/// A node of the category tree.
pub trait TreeNode {
    /// This node's ID.
    fn id(&self) -> CategoryId;
    /// The parent's ID, or `None` for a root.
    fn parent_id(&self) -> Option<CategoryId>;
    /// URL slug, used to build materialized paths.
    fn slug(&self) -> &str;
    /// Display name, used as the secondary sort key.
    fn name(&self) -> &str;
    /// Explicit ordering among siblings.
    fn sort_order(&self) -> i32;
}

/// A node with its children attached.
#[derive(Debug, Clone, Serialize)]
pub struct TreeEntry<T> {
    #[serde(flatten)]
    pub item: T,
    pub children: Vec<TreeEntry<T>>,
}

/// Errors raised when validating a change to the tree.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeError {
    /// The category was given itself as parent.
    #[error("a category cannot be its own parent")]
    SelfParent,
    /// The new parent is a descendant of the category.
    #[error("category {parent} is a descendant of {id}")]
    Cycle {
        /// Category being moved.
        id: CategoryId,
        /// Requested parent.
        parent: CategoryId,
    },
    /// The requested parent does not exist.
    #[error("parent category {0} does not exist")]
    ParentNotFound(CategoryId),
}

fn sort_siblings<T: TreeNode>(items: &mut [&T]) {
    items.sort_by(|a, b| {
        a.sort_order()
            .cmp(&b.sort_order())
            .then_with(|| a.name().cmp(b.name()))
    });
}

/// Build a forest from a flat list.
///
/// Nodes whose parent is missing from `nodes` are promoted to roots. Siblings
/// are ordered by `sort_order`, then by name. Nodes caught in a parent cycle
/// are unreachable from any root and are left out.
#[must_use]
pub fn build_forest<T: TreeNode + Clone>(nodes: &[T]) -> Vec<TreeEntry<T>> {
    let known: HashSet<CategoryId> = nodes.iter().map(TreeNode::id).collect();
    let mut children: HashMap<CategoryId, Vec<&T>> = HashMap::new();
    let mut roots: Vec<&T> = Vec::new();

    for node in nodes {
        match node.parent_id() {
            Some(parent) if known.contains(&parent) => {
                children.entry(parent).or_default().push(node);
            }
            _ => roots.push(node),
        }
    }

    sort_siblings(&mut roots);
    for list in children.values_mut() {
        sort_siblings(list);
    }

    fn attach<T: TreeNode + Clone>(
        node: &T,
        children: &HashMap<CategoryId, Vec<&T>>,
        seen: &mut HashSet<CategoryId>,
    ) -> TreeEntry<T> {
        seen.insert(node.id());
        let mut kids = Vec::new();
        for child in children.get(&node.id()).into_iter().flatten() {
            if !seen.contains(&child.id()) {
                kids.push(attach(*child, children, seen));
            }
        }
        TreeEntry {
            item: node.clone(),
            children: kids,
        }
    }

    let mut seen = HashSet::new();
    roots
        .into_iter()
        .map(|root| attach(root, &children, &mut seen))
        .collect()
}

/// IDs of `root` and every category below it, breadth-first.
///
/// Returns an empty list if `root` is not in `nodes`.
#[must_use]
pub fn descendant_ids<T: TreeNode>(nodes: &[T], root: CategoryId) -> Vec<CategoryId> {
    if !nodes.iter().any(|n| n.id() == root) {
        return Vec::new();
    }

    let mut children: HashMap<CategoryId, Vec<CategoryId>> = HashMap::new();
    for node in nodes {
        if let Some(parent) = node.parent_id() {
            children.entry(parent).or_default().push(node.id());
        }
    }

    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([root]);
    while let Some(id) = queue.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        out.push(id);
        if let Some(kids) = children.get(&id) {
            queue.extend(kids.iter().copied());
        }
    }
    out
}

/// Ancestors of `id`, ordered from the root down to the direct parent.
///
/// The node itself is not included. A dangling parent reference ends the
/// chain.
#[must_use]
pub fn ancestors<T: TreeNode>(nodes: &[T], id: CategoryId) -> Vec<&T> {
    let by_id: HashMap<CategoryId, &T> = nodes.iter().map(|n| (n.id(), n)).collect();

    let mut chain = Vec::new();
    let mut seen = HashSet::from([id]);
    let mut current = by_id.get(&id).and_then(|n| n.parent_id());
    while let Some(parent_id) = current {
        if !seen.insert(parent_id) {
            break;
        }
        let Some(parent) = by_id.get(&parent_id) else {
            break;
        };
        chain.push(*parent);
        current = parent.parent_id();
    }
    chain.reverse();
    chain
}

/// Check that `id` may be placed under `new_parent`.
///
/// # Errors
///
/// - [`TreeError::SelfParent`] if `new_parent == id`
/// - [`TreeError::ParentNotFound`] if the parent is not in `nodes`
/// - [`TreeError::Cycle`] if the parent sits inside `id`'s subtree
pub fn validate_parent<T: TreeNode>(
    nodes: &[T],
    id: CategoryId,
    new_parent: Option<CategoryId>,
) -> Result<(), TreeError> {
    let Some(parent) = new_parent else {
        return Ok(());
    };
    if parent == id {
        return Err(TreeError::SelfParent);
    }
    if !nodes.iter().any(|n| n.id() == parent) {
        return Err(TreeError::ParentNotFound(parent));
    }
    if descendant_ids(nodes, id).contains(&parent) {
        return Err(TreeError::Cycle { id, parent });
    }
    Ok(())
}

/// Materialized path for a category whose parent has `parent_path`.
#[must_use]
pub fn child_path(parent_path: Option<&str>, slug: &str) -> String {
    match parent_path {
        Some(parent) if !parent.is_empty() => format!("{parent}{PATH_SEPARATOR}{slug}"),
        _ => slug.to_owned(),
    }
}

/// Depth of a category whose parent sits at `parent_level` (roots are 0).
#[must_use]
pub fn child_level(parent_level: Option<i32>) -> i32 {
    parent_level.map_or(0, |level| level + 1)
}

/// Recompute `(id, path, level)` for `root` and its whole subtree.
///
/// Call this after a reparent or slug change, with `nodes` already reflecting
/// the new parent and slug.
#[must_use]
pub fn subtree_paths<T: TreeNode>(nodes: &[T], root: CategoryId) -> Vec<(CategoryId, String, i32)> {
    let by_id: HashMap<CategoryId, &T> = nodes.iter().map(|n| (n.id(), n)).collect();

    descendant_ids(nodes, root)
        .into_iter()
        .filter_map(|id| {
            let node = by_id.get(&id)?;
            let chain = ancestors(nodes, id);
            let path = chain
                .iter()
                .map(|a| a.slug())
                .chain(std::iter::once(node.slug()))
                .collect::<Vec<_>>()
                .join(PATH_SEPARATOR);
            let level = i32::try_from(chain.len()).unwrap_or(i32::MAX);
            Some((id, path, level))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Serialize)]
    struct Node {
        id: CategoryId,
        parent: Option<CategoryId>,
        slug: String,
        sort: i32,
    }

    impl TreeNode for Node {
        fn id(&self) -> CategoryId {
            self.id
        }
        fn parent_id(&self) -> Option<CategoryId> {
            self.parent
        }
        fn slug(&self) -> &str {
            &self.slug
        }
        fn name(&self) -> &str {
            &self.slug
        }
        fn sort_order(&self) -> i32 {
            self.sort
        }
    }

    fn node(id: i32, parent: Option<i32>, slug: &str, sort: i32) -> Node {
        Node {
            id: CategoryId::new(id),
            parent: parent.map(CategoryId::new),
            slug: slug.to_owned(),
            sort,
        }
    }

    /// electronics(1) ─┬─ phones(2) ── android(4)
    ///                 └─ laptops(3)
    /// fashion(5)
    fn sample() -> Vec<Node> {
        vec![
            node(4, Some(2), "android", 0),
            node(3, Some(1), "laptops", 1),
            node(5, None, "fashion", 2),
            node(1, None, "electronics", 1),
            node(2, Some(1), "phones", 0),
        ]
    }

    #[test]
    fn test_build_forest_orders_and_nests() {
        let forest = build_forest(&sample());
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].item.slug, "electronics");
        assert_eq!(forest[1].item.slug, "fashion");

        let kids: Vec<_> = forest[0].children.iter().map(|c| c.item.slug.as_str()).collect();
        assert_eq!(kids, ["phones", "laptops"]);
        assert_eq!(forest[0].children[0].children[0].item.slug, "android");
    }

    #[test]
    fn test_build_forest_promotes_orphans() {
        let nodes = vec![node(1, None, "a", 0), node(2, Some(99), "b", 0)];
        let forest = build_forest(&nodes);
        assert_eq!(forest.len(), 2);
    }

    #[test]
    fn test_build_forest_serializes_flat_with_children() {
        let forest = build_forest(&[node(1, None, "a", 0), node(2, Some(1), "b", 0)]);
        let json = serde_json::to_value(&forest).unwrap();
        assert_eq!(json[0]["slug"], "a");
        assert_eq!(json[0]["children"][0]["slug"], "b");
    }

    #[test]
    fn test_descendant_ids() {
        let ids = descendant_ids(&sample(), CategoryId::new(1));
        assert_eq!(ids[0], CategoryId::new(1));
        assert_eq!(ids.len(), 4);
        assert!(ids.contains(&CategoryId::new(4)));
        assert!(!ids.contains(&CategoryId::new(5)));

        assert!(descendant_ids(&sample(), CategoryId::new(42)).is_empty());
    }

    #[test]
    fn test_ancestors_root_first() {
        let nodes = sample();
        let chain: Vec<_> = ancestors(&nodes, CategoryId::new(4))
            .iter()
            .map(|n| n.slug.clone())
            .collect();
        assert_eq!(chain, ["electronics", "phones"]);
        assert!(ancestors(&nodes, CategoryId::new(1)).is_empty());
    }

    #[test]
    fn test_validate_parent() {
        let nodes = sample();
        let id = CategoryId::new(1);
        assert_eq!(validate_parent(&nodes, id, None), Ok(()));
        assert_eq!(
            validate_parent(&nodes, id, Some(id)),
            Err(TreeError::SelfParent)
        );
        assert_eq!(
            validate_parent(&nodes, id, Some(CategoryId::new(4))),
            Err(TreeError::Cycle {
                id,
                parent: CategoryId::new(4)
            })
        );
        assert_eq!(
            validate_parent(&nodes, id, Some(CategoryId::new(77))),
            Err(TreeError::ParentNotFound(CategoryId::new(77)))
        );
        assert_eq!(
            validate_parent(&nodes, CategoryId::new(3), Some(CategoryId::new(5))),
            Ok(())
        );
    }

    #[test]
    fn test_child_path_and_level() {
        assert_eq!(child_path(None, "phones"), "phones");
        assert_eq!(child_path(Some("electronics"), "phones"), "electronics/phones");
        assert_eq!(child_level(None), 0);
        assert_eq!(child_level(Some(1)), 2);
    }

    #[test]
    fn test_subtree_paths_after_reparent() {
        let mut nodes = sample();
        // Move phones (2) under fashion (5)
        for n in &mut nodes {
            if n.id == CategoryId::new(2) {
                n.parent = Some(CategoryId::new(5));
            }
        }
        let mut paths = subtree_paths(&nodes, CategoryId::new(2));
        paths.sort_by_key(|(id, _, _)| *id);
        assert_eq!(
            paths,
            vec![
                (CategoryId::new(2), "fashion/phones".to_owned(), 1),
                (CategoryId::new(4), "fashion/phones/android".to_owned(), 2),
            ]
        );
    }
}
