/*
 * relationships.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Open Packaging Conventions relationship parts (`_rels/*.rels`).

use docreport_xml::{XmlDocument, XmlElement};

pub const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// Relationship type URIs used by the package layer.
pub mod rel_type {
    const BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/";

    pub const OFFICE_DOCUMENT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
    pub const IMAGE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

    /// Full URI for a short type name such as `header`.
    pub fn uri(short: &str) -> String {
        format!("{BASE}{short}")
    }

    /// Last path segment of a type URI; transitional and strict URIs agree on it.
    pub fn short(uri: &str) -> &str {
        uri.rsplit('/').next().unwrap_or(uri)
    }
}

/// One `<Relationship>` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

impl Relationship {
    /// Whether the type URI ends with the given short name.
    pub fn is_type(&self, short: &str) -> bool {
        rel_type::short(&self.rel_type) == short
    }

    fn from_element(element: &XmlElement) -> Option<Self> {
        Some(Relationship {
            id: element.get_attribute("Id")?.to_string(),
            rel_type: element.get_attribute("Type")?.to_string(),
            target: element.get_attribute("Target")?.to_string(),
            external: element
                .get_attribute("TargetMode")
                .is_some_and(|mode| mode.eq_ignore_ascii_case("External")),
        })
    }

    fn to_element(&self) -> XmlElement {
        let mut element = XmlElement::new("Relationship")
            .with_attribute("Id", self.id.as_str())
            .with_attribute("Type", self.rel_type.as_str())
            .with_attribute("Target", self.target.as_str());
        if self.external {
            element.set_attribute("TargetMode", "External");
        }
        element
    }
}

/// Name of the relationship part belonging to `part` (`""` is the package root).
///
/// `word/document.xml` has its relationships in `word/_rels/document.xml.rels`.
pub fn rels_part_name(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolve a relationship target against the part that owns the relationship.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return normalize(absolute);
    }
    match source_part.rsplit_once('/') {
        Some((dir, _)) => normalize(&format!("{dir}/{target}")),
        None => normalize(target),
    }
}

/// Target string, relative to `source_part`, that points at `target_part`.
pub fn relative_target(source_part: &str, target_part: &str) -> String {
    let source_dir = source_part.rsplit_once('/').map_or("", |(dir, _)| dir);
    if source_dir.is_empty() {
        return target_part.to_string();
    }
    match target_part.strip_prefix(source_dir) {
        Some(rest) if rest.starts_with('/') => rest[1..].to_string(),
        _ => format!("/{target_part}"),
    }
}

fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Read every relationship of a `.rels` part, in document order.
pub fn read_relationships(rels: &XmlElement) -> Vec<Relationship> {
    rels.elements()
        .filter(|e| e.name == "Relationship")
        .filter_map(Relationship::from_element)
        .collect()
}

/// A fresh, empty relationship part.
pub fn empty_relationships() -> XmlDocument {
    let mut doc = XmlDocument::new(
        XmlElement::new("Relationships").with_attribute("xmlns", RELATIONSHIPS_NS),
    );
    doc.declaration = Some(docreport_xml::XmlDeclaration::standalone_utf8());
    doc
}

/// Append a relationship with a fresh `rIdN` and return that id.
pub fn add_relationship(rels: &mut XmlElement, rel_type: &str, target: &str, external: bool) -> String {
    let id = next_id(rels);
    let relationship = Relationship {
        id: id.clone(),
        rel_type: rel_type.to_string(),
        target: target.to_string(),
        external,
    };
    rels.children.push(relationship.to_element().into());
    id
}

fn next_id(rels: &XmlElement) -> String {
    let highest = read_relationships(rels)
        .iter()
        .filter_map(|r| r.id.strip_prefix("rId")?.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("rId{}", highest + 1)
}
