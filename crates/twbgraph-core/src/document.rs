//! Owned element tree for workbook markup.
//!
//! Workbooks are small enough to hold in memory and the parser needs random
//! access (a worksheet refers back to columns declared elsewhere), so the
//! `quick-xml` event stream is folded into a plain tree of [`Element`]s.
//! Comments, processing instructions and the XML declaration are skipped.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::FormatError;

/// One XML element with its attributes, children and concatenated text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

/// A parsed, well-formed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub root: Element,
}

impl Element {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Attribute value by name.
    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute value by name, ignoring values that are blank.
    #[must_use]
    pub fn non_empty_attr(&self, key: &str) -> Option<&str> {
        self.attr(key).map(str::trim).filter(|v| !v.is_empty())
    }

    /// First direct child with the given tag name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Self> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Direct children with the given tag name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Self> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// All descendants (not including `self`) in document order.
    #[must_use]
    pub fn descendants(&self) -> Vec<&Self> {
        let mut out = Vec::new();
        let mut stack: Vec<&Self> = self.children.iter().rev().collect();
        while let Some(el) = stack.pop() {
            out.push(el);
            stack.extend(el.children.iter().rev());
        }
        out
    }

    /// Descendants with the given tag name, in document order.
    #[must_use]
    pub fn descendants_named(&self, name: &str) -> Vec<&Self> {
        self.descendants()
            .into_iter()
            .filter(|el| el.name == name)
            .collect()
    }
}

/// Parse UTF-8 markup into a [`Document`].
///
/// # Errors
///
/// Returns [`FormatError::MalformedXml`] for syntax errors, mismatched or
/// unclosed tags, multiple root elements, or a document with no element.
pub fn parse(xml: &str) -> Result<Document, FormatError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let position = reader.buffer_position();
        let event = reader
            .read_event()
            .map_err(|e| FormatError::MalformedXml(format!("at byte {position}: {e}")))?;

        match event {
            Event::Start(start) => {
                stack.push(element_from_start(&start)?);
            }
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let Some(element) = stack.pop() else {
                    return Err(FormatError::MalformedXml(format!(
                        "unexpected closing tag at byte {position}"
                    )));
                };
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    let value = text
                        .unescape()
                        .map_err(|e| FormatError::MalformedXml(e.to_string()))?;
                    current.text.push_str(&value);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current
                        .text
                        .push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(FormatError::MalformedXml(format!(
            "unclosed element <{}> at end of document",
            open.name
        )));
    }

    root.map(|root| Document { root })
        .ok_or_else(|| FormatError::MalformedXml("document contains no root element".to_string()))
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), FormatError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(FormatError::MalformedXml(format!(
            "multiple root elements (second is <{}>)",
            element.name
        )));
    }
    *root = Some(element);
    Ok(())
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element, FormatError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = Element::new(name);

    for attr in start.attributes() {
        let attr = attr.map_err(|e| FormatError::MalformedXml(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| FormatError::MalformedXml(e.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }

    Ok(element)
}
