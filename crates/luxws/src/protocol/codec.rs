//! Envelope codec: raw reply frame → typed tree.
//!
//! A frame arriving while a request is outstanding is not necessarily the
//! answer to it.  [`decode_reply`] parses the frame and compares its root
//! tag, case-insensitively, with the kind the request expects:
//!
//! | Outcome                      | Result                        |
//! |------------------------------|-------------------------------|
//! | Root tag matches             | `Ok(Decision::Accept(tree))`  |
//! | Well-formed, other root tag  | `Ok(Decision::Ignore)`        |
//! | Malformed payload            | `Err(CodecError)`             |
//!
//! Malformed frames are never skipped: once a frame cannot be read, there is
//! no telling whether it was the answer.

use thiserror::Error;
use tracing::trace;

use crate::domain::{ContentItem, ContentOption, ContentRoot, NavigationItem, NavigationRoot};
use crate::protocol::command::Kind;
use crate::protocol::xml::{parse_document, Element};
use crate::transport::Decision;

/// Errors that can occur while decoding a reply frame.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The markup is not well-formed.
    #[error("XML syntax error at byte {position}: {source}")]
    Syntax {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    /// The payload declares an encoding that is not known.
    #[error("unsupported character encoding {0:?}")]
    UnsupportedEncoding(String),

    /// The payload is meant to be UTF-8 but is not.
    #[error("payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// The payload ended while an element was still open.
    #[error("unexpected end of document inside <{open}>")]
    UnexpectedEof { open: String },

    /// The payload contains no element at all.
    #[error("document has no root element")]
    NoRootElement,
}

/// A typed reply tree that can be built from a parsed document.
pub trait Envelope: Sized {
    /// The kind of reply this tree represents.
    const KIND: Kind;

    /// Builds the tree from a root element whose tag is already known to
    /// match [`Self::KIND`].
    fn from_element(root: &Element) -> Self;
}

/// Decodes `payload` as a reply of type `T`, or decides to ignore it.
///
/// # Errors
///
/// Returns [`CodecError`] if the payload cannot be parsed.  A parsed payload
/// with a different root tag is not an error.
///
/// # Examples
///
/// ```rust
/// use luxws::{decode_reply, Decision, NavigationRoot};
///
/// let reply = decode_reply::<NavigationRoot>(br#"<Navigation id="0x1"/>"#).unwrap();
/// assert!(matches!(reply, Decision::Accept(ref nav) if nav.id == "0x1"));
///
/// let other = decode_reply::<NavigationRoot>(b"<Content/>").unwrap();
/// assert!(matches!(other, Decision::Ignore));
/// ```
pub fn decode_reply<T: Envelope>(payload: &[u8]) -> Result<Decision<T>, CodecError> {
    let root = parse_document(payload)?;

    if !root.name.eq_ignore_ascii_case(T::KIND.root_tag()) {
        trace!(
            "ignoring <{}> reply while waiting for {}",
            root.name,
            T::KIND
        );
        return Ok(Decision::Ignore);
    }

    Ok(Decision::Accept(T::from_element(&root)))
}

// ── Navigation ────────────────────────────────────────────────────────────────

impl Envelope for NavigationRoot {
    const KIND: Kind = Kind::Navigation;

    fn from_element(root: &Element) -> Self {
        Self {
            tag: root.name.clone(),
            id: attribute(root, "id"),
            items: root.elements_named("item").map(navigation_item).collect(),
        }
    }
}

fn navigation_item(element: &Element) -> NavigationItem {
    NavigationItem {
        id: attribute(element, "id"),
        name: element.child_text("name").unwrap_or_default(),
        items: element.elements_named("item").map(navigation_item).collect(),
    }
}

// ── Content ───────────────────────────────────────────────────────────────────

impl Envelope for ContentRoot {
    const KIND: Kind = Kind::Content;

    fn from_element(root: &Element) -> Self {
        Self {
            tag: root.name.clone(),
            items: root.elements_named("item").map(content_item).collect(),
        }
    }
}

fn content_item(element: &Element) -> ContentItem {
    ContentItem {
        id: attribute(element, "id"),
        name: element.child_text("name").unwrap_or_default(),
        min: element.child_text("min"),
        max: element.child_text("max"),
        step: element.child_text("step"),
        unit: element.child_text("unit"),
        div: element.child_text("div"),
        raw: element.child_text("raw"),
        value: element.child_text("value"),
        columns: element.elements_named("columns").map(Element::text).collect(),
        headers: element.elements_named("headers").map(Element::text).collect(),
        options: element
            .elements_named("option")
            .map(|option| ContentOption {
                value: attribute(option, "value"),
                label: option.text(),
            })
            .collect(),
        items: element.elements_named("item").map(content_item).collect(),
    }
}

fn attribute(element: &Element, name: &str) -> String {
    element.attribute(name).unwrap_or_default().to_string()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
