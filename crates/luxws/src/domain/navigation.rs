//! The navigation tree returned by a successful login.

use serde::Serialize;

use super::{find_by_name, lookup, NotFoundError, TreeNode};

/// Root of the controller's menu structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NavigationRoot {
    /// Root element name exactly as sent (e.g. `Navigation`).
    pub tag: String,
    /// Identifier of the root itself.
    pub id: String,
    pub items: Vec<NavigationItem>,
}

/// One menu entry.
///
/// `id` is only meaningful on the connection that produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NavigationItem {
    pub id: String,
    pub name: String,
    pub items: Vec<NavigationItem>,
}

impl TreeNode for NavigationItem {
    fn name(&self) -> &str {
        &self.name
    }

    fn children(&self) -> &[Self] {
        &self.items
    }
}

impl NavigationRoot {
    /// First entry called `name` in depth-first pre-order, if any.
    pub fn find_by_name(&self, name: &str) -> Option<&NavigationItem> {
        find_by_name(&self.items, name)
    }

    /// Same as [`find_by_name`](Self::find_by_name), failing with
    /// [`NotFoundError`] when no entry matches.
    pub fn lookup(&self, name: &str) -> Result<&NavigationItem, NotFoundError> {
        lookup(&self.items, name)
    }
}
