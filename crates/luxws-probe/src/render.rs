//! Output formatting for fetched content pages.

use clap::ValueEnum;
use luxws::{ContentItem, ContentRoot};
use serde::Deserialize;

/// How the probe prints a page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Indented `name: value` lines.
    #[default]
    Tree,
    /// The full content tree as pretty-printed JSON.
    Json,
}

/// Renders `content` in the requested format.
///
/// # Errors
///
/// Only JSON serialization can fail.
pub fn render(content: &ContentRoot, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Tree => Ok(render_tree(content)),
        OutputFormat::Json => serde_json::to_string_pretty(content),
    }
}

/// One line per item, indented two spaces per level.  Items with a value
/// print it after a colon; items with options list their labels.
pub fn render_tree(content: &ContentRoot) -> String {
    let mut out = String::new();
    for item in &content.items {
        write_item(&mut out, item, 0);
    }
    out
}

fn write_item(out: &mut String, item: &ContentItem, depth: usize) {
    out.push_str(&"  ".repeat(depth));
    out.push_str(&item.name);
    if let Some(value) = &item.value {
        out.push_str(": ");
        out.push_str(value);
    }
    if !item.options.is_empty() {
        let labels: Vec<&str> = item.options.iter().map(|o| o.label.as_str()).collect();
        out.push_str(&format!(" [{}]", labels.join(" | ")));
    }
    out.push('\n');

    for child in &item.items {
        write_item(out, child, depth + 1);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
