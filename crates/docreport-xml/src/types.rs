/*
 * types.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Core types for part trees.

/// A parsed XML part.
///
/// Holds the optional `<?xml ...?>` declaration so that a rewritten part keeps
/// the same prolog it was read with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    /// The XML declaration, if the source had one.
    pub declaration: Option<XmlDeclaration>,

    /// The root element of the part.
    pub root: XmlElement,
}

/// The `<?xml version=... encoding=... standalone=...?>` prolog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDeclaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

/// An XML element.
///
/// Names are kept split into an optional namespace prefix and a local name,
/// exactly as written in the source. Namespace URIs are not resolved: package
/// parts use fixed, conventional prefixes (`w:`, `r:`, `wp:`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    /// The local name of the element (without namespace prefix).
    pub name: String,

    /// Namespace prefix, if any (e.g., "w" in `<w:p>`).
    pub prefix: Option<String>,

    /// Attributes of this element, in source order.
    pub attributes: Vec<XmlAttribute>,

    /// Child content of this element, in source order.
    pub children: Vec<XmlChild>,
}

/// An XML attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    /// The local name of the attribute (without namespace prefix).
    pub name: String,

    /// Namespace prefix, if any.
    pub prefix: Option<String>,

    /// The attribute value (after unescaping XML entities).
    pub value: String,
}

/// A single child of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlChild {
    /// A child element.
    Element(XmlElement),

    /// Text content (after unescaping XML entities).
    Text(String),
}

/// Split `prefix:local` into its parts.
pub(crate) fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.find(':') {
        Some(pos) => (Some(&qname[..pos]), &qname[pos + 1..]),
        None => (None, qname),
    }
}

fn name_matches(prefix: Option<&String>, name: &str, qname: &str) -> bool {
    let (want_prefix, want_name) = split_qname(qname);
    name == want_name && prefix.map(String::as_str) == want_prefix
}

impl XmlDocument {
    /// Create a new document without a declaration.
    pub fn new(root: XmlElement) -> Self {
        Self {
            declaration: None,
            root,
        }
    }
}

impl XmlDeclaration {
    /// The declaration every WordprocessingML part is written with.
    pub fn standalone_utf8() -> Self {
        Self {
            version: "1.0".to_string(),
            encoding: Some("UTF-8".to_string()),
            standalone: Some("yes".to_string()),
        }
    }
}

impl XmlElement {
    /// Create a new empty element from a qualified name such as `w:p`.
    pub fn new(qname: &str) -> Self {
        let (prefix, name) = split_qname(qname);
        Self {
            name: name.to_string(),
            prefix: prefix.map(str::to_string),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder: add an attribute.
    pub fn with_attribute(mut self, qname: &str, value: impl Into<String>) -> Self {
        self.set_attribute(qname, value);
        self
    }

    /// Builder: append a child element.
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlChild::Element(child));
        self
    }

    /// Builder: append a text child.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlChild::Text(text.into()));
        self
    }

    /// The qualified name (`prefix:name`, or just `name`).
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.name),
            None => self.name.clone(),
        }
    }

    /// Check whether this element has the given qualified name.
    pub fn is(&self, qname: &str) -> bool {
        name_matches(self.prefix.as_ref(), &self.name, qname)
    }

    /// Get an attribute value by qualified name.
    pub fn get_attribute(&self, qname: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.is(qname))
            .map(|a| a.value.as_str())
    }

    /// Set an attribute, replacing an existing one with the same name.
    pub fn set_attribute(&mut self, qname: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(existing) = self.attributes.iter_mut().find(|a| a.is(qname)) {
            existing.value = value;
        } else {
            self.attributes.push(XmlAttribute::new(qname, value));
        }
    }

    /// Remove an attribute, returning its value.
    pub fn remove_attribute(&mut self, qname: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|a| a.is(qname))?;
        Some(self.attributes.remove(pos).value)
    }

    /// Check if this element has child elements.
    pub fn has_elements(&self) -> bool {
        self.children
            .iter()
            .any(|c| matches!(c, XmlChild::Element(_)))
    }

    /// Check if this element is empty.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Iterate over child elements (ignoring text).
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlChild::Element(e) => Some(e),
            XmlChild::Text(_) => None,
        })
    }

    /// Iterate mutably over child elements (ignoring text).
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|c| match c {
            XmlChild::Element(e) => Some(e),
            XmlChild::Text(_) => None,
        })
    }

    /// First child element with the given qualified name.
    pub fn child(&self, qname: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.is(qname))
    }

    /// First child element with the given qualified name, mutably.
    pub fn child_mut(&mut self, qname: &str) -> Option<&mut XmlElement> {
        self.elements_mut().find(|e| e.is(qname))
    }

    /// Get child elements by qualified name.
    pub fn get_children(&self, qname: &str) -> Vec<&XmlElement> {
        self.elements().filter(|e| e.is(qname)).collect()
    }

    /// Pre-order iterator over all descendant elements (excluding `self`).
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: vec![self.children.iter()],
        }
    }

    /// Direct text content of this element.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|c| match c {
                XmlChild::Text(t) => Some(t.as_str()),
                XmlChild::Element(_) => None,
            })
            .collect()
    }

    /// Concatenated text of every descendant element named `qname`
    /// (and of `self`, if it has that name).
    pub fn descendant_text(&self, qname: &str) -> String {
        let mut out = String::new();
        if self.is(qname) {
            out.push_str(&self.text());
        }
        for element in self.descendants().filter(|e| e.is(qname)) {
            out.push_str(&element.text());
        }
        out
    }

    /// All text in this subtree, in document order.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

fn collect_text(element: &XmlElement, out: &mut String) {
    for child in &element.children {
        match child {
            XmlChild::Text(t) => out.push_str(t),
            XmlChild::Element(e) => collect_text(e, out),
        }
    }
}

impl XmlAttribute {
    /// Create a new attribute from a qualified name.
    pub fn new(qname: &str, value: impl Into<String>) -> Self {
        let (prefix, name) = split_qname(qname);
        Self {
            name: name.to_string(),
            prefix: prefix.map(str::to_string),
            value: value.into(),
        }
    }

    /// Check whether this attribute has the given qualified name.
    pub fn is(&self, qname: &str) -> bool {
        name_matches(self.prefix.as_ref(), &self.name, qname)
    }

    /// The qualified name (`prefix:name`, or just `name`).
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.name),
            None => self.name.clone(),
        }
    }
}

impl XmlChild {
    /// The element, if this child is one.
    pub fn as_element(&self) -> Option<&XmlElement> {
        match self {
            XmlChild::Element(e) => Some(e),
            XmlChild::Text(_) => None,
        }
    }

    /// The element, mutably, if this child is one.
    pub fn as_element_mut(&mut self) -> Option<&mut XmlElement> {
        match self {
            XmlChild::Element(e) => Some(e),
            XmlChild::Text(_) => None,
        }
    }
}

impl From<XmlElement> for XmlChild {
    fn from(element: XmlElement) -> Self {
        XmlChild::Element(element)
    }
}

/// Pre-order iterator returned by [`XmlElement::descendants`].
pub struct Descendants<'a> {
    stack: Vec<std::slice::Iter<'a, XmlChild>>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a XmlElement;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(iter) = self.stack.last_mut() {
            match iter.next() {
                Some(XmlChild::Element(e)) => {
                    self.stack.push(e.children.iter());
                    return Some(e);
                }
                Some(XmlChild::Text(_)) => {}
                None => {
                    self.stack.pop();
                }
            }
        }
        None
    }
}
