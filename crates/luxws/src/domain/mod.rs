//! Domain types for LuxWS replies.
//!
//! This module contains the typed trees a controller sends back and the
//! lookup rules callers use to navigate them.  Nothing in here performs I/O;
//! the trees are built by the protocol codec and handed to the caller by
//! value, immutable from then on.
//!
//! # Two tree shapes, one lookup
//!
//! Both the navigation menu and a content page are rooted, ordered,
//! recursive lists of named nodes.  [`TreeNode`] captures the part they have
//! in common so [`find_by_name`] can serve both.

pub mod config;
pub mod content;
pub mod navigation;

use thiserror::Error;

pub use config::ClientConfig;
pub use content::{ContentItem, ContentOption, ContentRoot};
pub use navigation::{NavigationItem, NavigationRoot};

/// A named node with ordered children.
pub trait TreeNode: Sized {
    /// Display name of the node, compared exactly by [`find_by_name`].
    fn name(&self) -> &str;

    /// Child nodes in document order.
    fn children(&self) -> &[Self];
}

/// Returned when a lookup by name finds nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("item with name {name:?} not found")]
pub struct NotFoundError {
    /// The name that was searched for.
    pub name: String,
}

/// Finds the first node called `name`, depth-first in pre-order.
///
/// A parent is compared before any of its children, and children are
/// visited in document order.  The comparison is exact and case-sensitive.
///
/// # Examples
///
/// ```rust
/// use luxws::domain::{find_by_name, NavigationItem};
///
/// let items = vec![NavigationItem {
///     id: "0x1".into(),
///     name: "Informationen".into(),
///     items: vec![NavigationItem {
///         id: "0x2".into(),
///         name: "Temperaturen".into(),
///         items: Vec::new(),
///     }],
/// }];
///
/// assert_eq!(find_by_name(&items, "Temperaturen").map(|i| i.id.as_str()), Some("0x2"));
/// assert!(find_by_name(&items, "temperaturen").is_none());
/// ```
pub fn find_by_name<'a, N: TreeNode>(nodes: &'a [N], name: &str) -> Option<&'a N> {
    nodes.iter().find_map(|node| {
        if node.name() == name {
            Some(node)
        } else {
            find_by_name(node.children(), name)
        }
    })
}

/// Like [`find_by_name`], but reports a missing node as a [`NotFoundError`].
pub fn lookup<'a, N: TreeNode>(nodes: &'a [N], name: &str) -> Result<&'a N, NotFoundError> {
    find_by_name(nodes, name).ok_or_else(|| NotFoundError {
        name: name.to_string(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, name: &str, items: Vec<NavigationItem>) -> NavigationItem {
        NavigationItem {
            id: id.to_string(),
            name: name.to_string(),
            items,
        }
    }

    #[test]
    fn test_find_by_name_prefers_parent_over_child_with_same_name() {
        // Arrange: the parent and its first child share a name
        let items = vec![item("0x1", "Dup", vec![item("0x2", "Dup", Vec::new())])];

        // Act
        let found = find_by_name(&items, "Dup").unwrap();

        // Assert
        assert_eq!(found.id, "0x1");
    }

    #[test]
    fn test_find_by_name_descends_before_moving_to_next_sibling() {
        // Arrange: a nested "Dup" under the first sibling precedes the second sibling
        let items = vec![
            item("0x1", "A", vec![item("0x2", "Dup", Vec::new())]),
            item("0x3", "Dup", Vec::new()),
        ];

        // Act
        let found = find_by_name(&items, "Dup").unwrap();

        // Assert: pre-order visits 0x1, 0x2, 0x3
        assert_eq!(found.id, "0x2");
    }

    #[test]
    fn test_find_by_name_is_case_sensitive() {
        let items = vec![item("0x1", "Informationen", Vec::new())];
        assert!(find_by_name(&items, "informationen").is_none());
    }

    #[test]
    fn test_find_by_name_on_empty_slice_returns_none() {
        let items: Vec<NavigationItem> = Vec::new();
        assert!(find_by_name(&items, "anything").is_none());
    }

    #[test]
    fn test_lookup_missing_name_reports_not_found() {
        // Arrange
        let items = vec![item("0x1", "A", Vec::new())];

        // Act
        let err = lookup(&items, "B").unwrap_err();

        // Assert
        assert_eq!(err.name, "B");
        assert_eq!(err.to_string(), "item with name \"B\" not found");
    }
}
