//! The content tree returned for a page request.
//!
//! Scalar fields are `Option<String>`: an element that was never sent is
//! `None`, while `<value></value>` is `Some("")`.  Text is kept exactly as
//! decoded, including surrounding whitespace (units such as `" h"` depend on
//! it).

use serde::Serialize;

use super::{find_by_name, lookup, NotFoundError, TreeNode};

/// Root of one content page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContentRoot {
    /// Root element name exactly as sent (e.g. `Content`).
    pub tag: String,
    pub items: Vec<ContentItem>,
}

/// One entry on a content page: a group, a reading, or a setting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContentItem {
    pub id: String,
    pub name: String,

    /// Lower bound of an editable setting, in raw units.
    pub min: Option<String>,
    /// Upper bound of an editable setting, in raw units.
    pub max: Option<String>,
    pub step: Option<String>,
    pub unit: Option<String>,
    /// Divisor turning `raw` into the displayed number.
    pub div: Option<String>,
    pub raw: Option<String>,
    /// Display value, handed verbatim to terminology parsers.
    pub value: Option<String>,

    /// Column keys of tabular content, one per `<columns>` element.
    pub columns: Vec<String>,
    /// Column headers of tabular content, one per `<headers>` element.
    pub headers: Vec<String>,
    /// Selectable choices of an enumerated setting.
    pub options: Vec<ContentOption>,

    pub items: Vec<ContentItem>,
}

/// A `(value, label)` pair from an `<option value="...">label</option>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContentOption {
    pub value: String,
    pub label: String,
}

impl TreeNode for ContentItem {
    fn name(&self) -> &str {
        &self.name
    }

    fn children(&self) -> &[Self] {
        &self.items
    }
}

impl ContentRoot {
    /// First item called `name` in depth-first pre-order, if any.
    pub fn find_by_name(&self, name: &str) -> Option<&ContentItem> {
        find_by_name(&self.items, name)
    }

    /// Same as [`find_by_name`](Self::find_by_name), failing with
    /// [`NotFoundError`] when no item matches.
    pub fn lookup(&self, name: &str) -> Result<&ContentItem, NotFoundError> {
        lookup(&self.items, name)
    }
}
