/*
 * writer.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Serialization of part trees back to XML text.
//!
//! Trees are emitted as `quick_xml` events. Output is compact (no
//! indentation is added) so that text inside `w:t` elements is reproduced
//! exactly, and childless elements are written in the `<x/>` form.

use crate::error::{Result, XmlError};
use crate::{XmlChild, XmlDeclaration, XmlDocument, XmlElement};
use quick_xml::Writer;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::Write;

impl XmlDocument {
    /// Write the whole part, declaration included.
    pub fn write_to<W: Write>(&self, out: W) -> Result<()> {
        let mut writer = Writer::new(out);
        if let Some(decl) = &self.declaration {
            write_declaration(decl, &mut writer)?;
        }
        write_element(&self.root, &mut writer)
    }

    /// Serialize the whole part as UTF-8 bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    pub fn to_xml_string(&self) -> Result<String> {
        into_string(self.to_bytes()?)
    }
}

impl XmlElement {
    /// Write this element and its subtree.
    pub fn write_to<W: Write>(&self, out: W) -> Result<()> {
        write_element(self, &mut Writer::new(out))
    }

    pub fn to_xml_string(&self) -> Result<String> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        into_string(out)
    }
}

fn into_string(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| XmlError::Encoding(e.to_string()))
}

fn write_failed(err: impl std::fmt::Display) -> XmlError {
    XmlError::Write(err.to_string())
}

fn write_declaration<W: Write>(decl: &XmlDeclaration, writer: &mut Writer<W>) -> Result<()> {
    let event = BytesDecl::new(
        &decl.version,
        decl.encoding.as_deref(),
        decl.standalone.as_deref(),
    );
    writer.write_event(Event::Decl(event)).map_err(write_failed)?;
    writer.get_mut().write_all(b"\r\n").map_err(write_failed)
}

fn write_element<W: Write>(element: &XmlElement, writer: &mut Writer<W>) -> Result<()> {
    let name = element.qualified_name();
    let mut start = BytesStart::new(name.as_str());
    for attr in &element.attributes {
        let key = attr.qualified_name();
        start.push_attribute((key.as_str(), attr.value.as_str()));
    }

    if element.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(write_failed);
    }

    writer.write_event(Event::Start(start)).map_err(write_failed)?;
    for child in &element.children {
        match child {
            XmlChild::Element(e) => write_element(e, writer)?,
            XmlChild::Text(t) => {
                let text = BytesText::from_escaped(partial_escape(t.as_str()));
                writer.write_event(Event::Text(text)).map_err(write_failed)?;
            }
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(name.as_str())))
        .map_err(write_failed)
}
