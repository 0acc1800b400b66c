/*
 * parser.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! XML parser that builds owned [`XmlDocument`] trees.

use crate::{Result, XmlAttribute, XmlChild, XmlDeclaration, XmlDocument, XmlElement, XmlError};
use crate::types::split_qname;
use quick_xml::Reader;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};

/// Parse XML from a string, producing an [`XmlDocument`].
///
/// # Example
///
/// ```rust
/// use docreport_xml::parse;
///
/// let doc = parse("<root><child/></root>").unwrap();
/// assert_eq!(doc.root.name, "root");
/// ```
///
/// # Errors
///
/// Returns an error if the XML is malformed.
pub fn parse(content: &str) -> Result<XmlDocument> {
    let mut parser = XmlParser::new(content);
    parser.parse()
}

/// Parse a part from raw bytes (UTF-8, optional byte order mark).
pub fn parse_bytes(bytes: &[u8]) -> Result<XmlDocument> {
    let content = std::str::from_utf8(bytes).map_err(|e| XmlError::Encoding(e.to_string()))?;
    parse(content.strip_prefix('\u{feff}').unwrap_or(content))
}

/// Internal parser state.
struct XmlParser<'a> {
    /// The quick-xml reader.
    reader: Reader<&'a [u8]>,

    /// Declaration seen before the root element.
    declaration: Option<XmlDeclaration>,

    /// Stack of elements being built.
    stack: Vec<BuildNode>,
}

/// A node being constructed during parsing.
struct BuildNode {
    element: XmlElement,
}

impl<'a> XmlParser<'a> {
    fn new(source: &'a str) -> Self {
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text_start = false;
        reader.config_mut().trim_text_end = false;

        Self {
            reader,
            declaration: None,
            stack: Vec::new(),
        }
    }

    fn parse(&mut self) -> Result<XmlDocument> {
        let mut root: Option<XmlElement> = None;

        loop {
            let event_start = self.reader.buffer_position() as u64;

            match self.reader.read_event() {
                Ok(Event::Start(e)) => {
                    let element = self.start_element(&e)?;
                    self.stack.push(BuildNode { element });
                }
                Ok(Event::End(e)) => {
                    let element = self.handle_end(e)?;
                    self.attach(element, &mut root)?;
                }
                Ok(Event::Empty(e)) => {
                    let element = self.start_element(&e)?;
                    self.attach(element, &mut root)?;
                }
                Ok(Event::Text(e)) => {
                    self.handle_text(e, event_start)?;
                }
                Ok(Event::CData(e)) => {
                    self.handle_cdata(e);
                }
                Ok(Event::Decl(e)) => {
                    self.declaration = Some(Self::parse_declaration(&e)?);
                }
                Ok(Event::Comment(_) | Event::PI(_) | Event::DocType(_)) => {
                    // Not carried through a rewrite
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(XmlError::XmlSyntax {
                        message: e.to_string(),
                        position: Some(self.reader.error_position()),
                    });
                }
            }
        }

        // Check for unclosed elements
        if let Some(node) = self.stack.last() {
            return Err(XmlError::UnexpectedEof {
                expected: format!("closing tag </{}>", node.element.qualified_name()),
            });
        }

        let root = root.ok_or(XmlError::EmptyDocument)?;

        Ok(XmlDocument {
            declaration: self.declaration.take(),
            root,
        })
    }

    /// Attach a finished element to its parent, or make it the root.
    fn attach(&mut self, element: XmlElement, root: &mut Option<XmlElement>) -> Result<()> {
        match self.stack.last_mut() {
            Some(parent) => {
                parent.element.children.push(XmlChild::Element(element));
                Ok(())
            }
            None if root.is_some() => Err(XmlError::MultipleRoots),
            None => {
                *root = Some(element);
                Ok(())
            }
        }
    }

    fn start_element(&self, e: &BytesStart<'_>) -> Result<XmlElement> {
        let full_name = String::from_utf8_lossy(e.name().as_ref()).to_string();
        let mut element = XmlElement::new(&full_name);
        element.attributes = self.parse_attributes(e)?;
        Ok(element)
    }

    fn handle_end(&mut self, e: BytesEnd<'_>) -> Result<XmlElement> {
        let end_name = String::from_utf8_lossy(e.name().as_ref()).to_string();

        let node = self.stack.pop().ok_or_else(|| XmlError::InvalidStructure {
            message: format!("Unexpected closing tag </{}>", end_name),
        })?;

        // Verify tag names match
        if node.element.qualified_name() != end_name {
            return Err(XmlError::MismatchedEndTag {
                expected: node.element.qualified_name(),
                found: end_name,
            });
        }

        let mut element = node.element;
        element.children = finalize_children(element.children);
        Ok(element)
    }

    fn handle_text(&mut self, e: BytesText<'_>, event_start: u64) -> Result<()> {
        let text = e.unescape().map_err(|err| XmlError::XmlSyntax {
            message: format!("Invalid text content: {}", err),
            position: Some(event_start),
        })?;

        if let Some(node) = self.stack.last_mut() {
            push_text(&mut node.element.children, &text);
        }
        Ok(())
    }

    fn handle_cdata(&mut self, e: BytesCData<'_>) {
        let text = String::from_utf8_lossy(e.as_ref()).to_string();
        if let Some(node) = self.stack.last_mut() {
            push_text(&mut node.element.children, &text);
        }
    }

    fn parse_declaration(e: &BytesDecl<'_>) -> Result<XmlDeclaration> {
        let text = |bytes: &[u8]| String::from_utf8_lossy(bytes).to_string();
        let version = text(e.version()?.as_ref());
        let encoding = match e.encoding() {
            Some(value) => Some(text(value?.as_ref())),
            None => None,
        };
        let standalone = match e.standalone() {
            Some(value) => Some(text(value?.as_ref())),
            None => None,
        };
        Ok(XmlDeclaration {
            version,
            encoding,
            standalone,
        })
    }

    fn parse_attributes(&self, e: &BytesStart<'_>) -> Result<Vec<XmlAttribute>> {
        let mut attributes = Vec::new();

        for attr_result in e.attributes() {
            let attr = attr_result?;

            let full_name = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let (prefix, name) = split_qname(&full_name);

            let value = attr.unescape_value().map_err(|err| XmlError::XmlSyntax {
                message: format!("Invalid attribute value: {}", err),
                position: None,
            })?;

            attributes.push(XmlAttribute {
                name: name.to_string(),
                prefix: prefix.map(str::to_string),
                value: value.into_owned(),
            });
        }

        Ok(attributes)
    }
}

/// Append text, merging with a preceding text child.
fn push_text(children: &mut Vec<XmlChild>, text: &str) {
    if let Some(XmlChild::Text(previous)) = children.last_mut() {
        previous.push_str(text);
    } else {
        children.push(XmlChild::Text(text.to_string()));
    }
}

/// Drop formatting whitespace from element-only content.
///
/// Whitespace that sits next to child elements is indentation, never
/// content; text-only elements (`w:t`, `w:instrText`) keep theirs untouched.
fn finalize_children(children: Vec<XmlChild>) -> Vec<XmlChild> {
    let has_elements = children.iter().any(|c| matches!(c, XmlChild::Element(_)));
    if !has_elements {
        return children;
    }
    children
        .into_iter()
        .filter(|c| match c {
            XmlChild::Text(t) => !t.trim().is_empty(),
            XmlChild::Element(_) => true,
        })
        .collect()
}
