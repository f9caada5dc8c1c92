//! Structural XML parsing of reply frames.
//!
//! Replies are small XML documents.  [`parse_document`] turns one into a
//! generic [`Element`] tree which the envelope codec then maps onto the typed
//! navigation and content trees.  Only structure is kept: element names
//! (namespace prefixes stripped), attributes, text and CDATA.  Comments,
//! processing instructions and anything outside the root element are
//! dropped.
//!
//! # Character encodings
//!
//! A payload may declare a non-UTF-8 encoding in its prolog, e.g.
//! `<?xml version="1.0" encoding="ISO-8859-1"?>`.  The encoding is resolved
//! in this order:
//!
//! 1. A byte-order mark, if present.
//! 2. The `encoding` label of the XML declaration (WHATWG labels, as
//!    understood by `encoding_rs`).
//! 3. UTF-8, validated strictly.
//!
//! The payload is transcoded to UTF-8 before structural parsing begins.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::codec::CodecError;

/// A parsed element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Local name, without any namespace prefix.
    pub name: String,
    /// Attributes in document order, values unescaped.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

/// Content of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Unescaped character data or CDATA, untrimmed.
    Text(String),
}

impl Element {
    /// Value of the attribute with the given local name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Child elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// Child elements called `name`, in document order.
    pub fn elements_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements().filter(move |element| element.name == name)
    }

    /// Direct character data of this element, concatenated.
    ///
    /// Text inside nested elements is not included.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) => Some(text.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Text of the last child element called `name`, or `None` when there is
    /// no such child.
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.elements_named(name).last().map(Element::text)
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parses `payload` and returns its root element.
///
/// Parsing stops as soon as the root element is closed.
///
/// # Errors
///
/// - [`CodecError::UnsupportedEncoding`] if the declared encoding is unknown.
/// - [`CodecError::InvalidUtf8`] if a UTF-8 payload contains invalid bytes.
/// - [`CodecError::Syntax`] for malformed markup, mismatched end tags or
///   unknown entity references.
/// - [`CodecError::UnexpectedEof`] if the input ends inside an element.
/// - [`CodecError::NoRootElement`] if there is no element at all.
///
/// # Examples
///
/// ```rust
/// use luxws::protocol::parse_document;
///
/// let root = parse_document(br#"<item id="1"><name>A &amp; B</name></item>"#).unwrap();
/// assert_eq!(root.attribute("id"), Some("1"));
/// assert_eq!(root.child_text("name").as_deref(), Some("A & B"));
/// ```
pub fn parse_document(payload: &[u8]) -> Result<Element, CodecError> {
    let text = decode_payload(payload)?;
    parse_str(&text)
}

fn parse_str(text: &str) -> Result<Element, CodecError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|source| syntax_error(&reader, source))?;

        match event {
            Event::Start(start) => {
                stack.push(start_element(&start).map_err(|e| syntax_error(&reader, e))?);
            }
            Event::Empty(start) => {
                let element = start_element(&start).map_err(|e| syntax_error(&reader, e))?;
                if let Some(root) = close_element(&mut stack, element) {
                    return Ok(root);
                }
            }
            Event::End(_) => {
                // quick-xml has already matched the end tag against the open one.
                if let Some(element) = stack.pop() {
                    if let Some(root) = close_element(&mut stack, element) {
                        return Ok(root);
                    }
                }
            }
            Event::Text(text) => {
                if let Some(parent) = stack.last_mut() {
                    let text = text.unescape().map_err(|e| syntax_error(&reader, e))?;
                    parent.children.push(Node::Text(text.into_owned()));
                }
            }
            Event::CData(data) => {
                if let Some(parent) = stack.last_mut() {
                    let text = String::from_utf8_lossy(&data).into_owned();
                    parent.children.push(Node::Text(text));
                }
            }
            Event::Eof => {
                return Err(match stack.pop() {
                    Some(open) => CodecError::UnexpectedEof { open: open.name },
                    None => CodecError::NoRootElement,
                });
            }
            _ => {}
        }
    }
}

/// Attaches a finished element to its parent, or returns it when it is the
/// root.
fn close_element(stack: &mut [Element], element: Element) -> Option<Element> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(element));
            None
        }
        None => Some(element),
    }
}

fn start_element(start: &BytesStart<'_>) -> Result<Element, quick_xml::Error> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attributes.push((key, value));
    }

    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn syntax_error(reader: &Reader<&[u8]>, source: quick_xml::Error) -> CodecError {
    CodecError::Syntax {
        position: reader.error_position() as u64,
        source,
    }
}

// ── Encoding detection ────────────────────────────────────────────────────────

fn decode_payload(payload: &[u8]) -> Result<Cow<'_, str>, CodecError> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(payload) {
        return transcode(encoding, &payload[bom_len..]);
    }

    let encoding = match declared_encoding(payload) {
        Some(label) => Encoding::for_label(label.trim().as_bytes())
            .ok_or(CodecError::UnsupportedEncoding(label))?
            // A readable declaration means the bytes are ASCII-compatible,
            // whatever UTF-16 label it carries.
            .output_encoding(),
        None => UTF_8,
    };

    transcode(encoding, payload)
}

fn transcode<'a>(encoding: &'static Encoding, bytes: &'a [u8]) -> Result<Cow<'a, str>, CodecError> {
    if encoding == UTF_8 {
        return Ok(Cow::Borrowed(std::str::from_utf8(bytes)?));
    }

    let (text, _had_errors) = encoding.decode_without_bom_handling(bytes);
    Ok(text)
}

/// Encoding label from the XML declaration, if the document starts with one.
///
/// Malformed prologs yield `None` and are reported by the structural parse.
fn declared_encoding(payload: &[u8]) -> Option<String> {
    let mut reader = Reader::from_reader(payload);

    loop {
        match reader.read_event() {
            Ok(Event::Text(text)) if text.iter().all(u8::is_ascii_whitespace) => continue,
            Ok(Event::Decl(decl)) => {
                let label = decl.encoding()?.map_err(quick_xml::Error::from).ok()?;
                return Some(String::from_utf8_lossy(&label).into_owned());
            }
            _ => return None,
        }
    }
}
