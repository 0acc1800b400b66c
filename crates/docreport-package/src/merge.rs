/*
 * merge.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Concatenating finished documents into one package.
//!
//! The first document is the base. Each further document's body is appended
//! after turning the previous final section properties into a
//! paragraph-level section break, so every document keeps its own page
//! setup, headers and footers. Relationships referenced from appended
//! content (`r:*` attributes) are re-created in the base: external targets
//! are copied as-is, internal parts are copied under fresh names together
//! with their own relationships.
//!
//! Styles, numbering and notes are taken from the base; documents built from
//! one template share them.

use crate::error::{PackageError, Result};
use crate::package::DocxPackage;
use crate::relationships::{self, Relationship};
use docreport_xml::{XmlChild, XmlElement};
use std::collections::{BTreeSet, HashMap};
use std::io::{Seek, Write};

/// Prefix of relationship-id attributes (`r:id`, `r:embed`, `r:link`, ...).
const RELATIONSHIP_PREFIX: &str = "r";

/// Merge documents into one package and write it.
pub fn merge<W: Write + Seek>(documents: Vec<DocxPackage>, writer: W) -> Result<()> {
    merge_packages(documents)?.write_to(writer)
}

/// Merge documents into one package.
pub fn merge_packages(documents: Vec<DocxPackage>) -> Result<DocxPackage> {
    let count = documents.len();
    let mut documents = documents.into_iter();
    let mut base = documents.next().ok_or(PackageError::NothingToMerge)?;
    for document in documents {
        append_document(&mut base, &document)?;
    }
    renumber_drawings(&mut base)?;
    tracing::debug!(documents = count, "Merged documents");
    Ok(base)
}

fn append_document(base: &mut DocxPackage, other: &DocxPackage) -> Result<()> {
    let other_main = other.main_part_name().to_string();
    let mut content: Vec<XmlChild> = body(other, &other_main)?.children.clone();

    let mut ids = BTreeSet::new();
    for child in &content {
        if let XmlChild::Element(element) = child {
            collect_relationship_ids(element, &mut ids);
        }
    }

    let other_rels = other.relationships(&other_main);
    let base_main = base.main_part_name().to_string();
    let mut copied: HashMap<String, String> = HashMap::new();
    let mut id_map: HashMap<String, String> = HashMap::new();
    for id in ids {
        let Some(rel) = other_rels.iter().find(|r| r.id == id) else {
            tracing::warn!(id = %id, "Appended content references an unknown relationship");
            continue;
        };
        let new_id = if rel.external {
            base.add_relationship(&base_main, &rel.rel_type, &rel.target, true)?
        } else {
            let source = relationships::resolve_target(&other_main, &rel.target);
            let copy = copy_part(base, other, &source, &mut copied)?;
            let target = relationships::relative_target(&base_main, &copy);
            base.add_relationship(&base_main, &rel.rel_type, &target, false)?
        };
        id_map.insert(id, new_id);
    }

    for child in &mut content {
        if let XmlChild::Element(element) = child {
            remap_relationship_ids(element, &id_map);
        }
    }

    let body = body_mut(base, &base_main)?;
    close_final_section(body);
    body.children.extend(content);
    Ok(())
}

/// Copy an internal part (and, recursively, the parts it relates to) from
/// `other` into `base`. Returns the part's name in `base`.
fn copy_part(
    base: &mut DocxPackage,
    other: &DocxPackage,
    source: &str,
    copied: &mut HashMap<String, String>,
) -> Result<String> {
    if let Some(existing) = copied.get(source) {
        return Ok(existing.clone());
    }
    let data = other
        .part_bytes(source)?
        .ok_or_else(|| PackageError::MissingPart(source.to_string()))?;

    let (stem, extension) = split_part_name(source);
    let name = base.unique_part_name(stem, extension);
    copied.insert(source.to_string(), name.clone());

    match other.part(source) {
        Some(document) => base.insert_xml(&name, document.clone()),
        None => base.insert_raw(&name, data),
    }
    if let Some(content_type) = other.content_type(source) {
        base.declare_content_type(&name, &content_type)?;
    }

    let part_rels: Vec<Relationship> = other.relationships(source);
    for rel in part_rels {
        let target = if rel.external {
            rel.target.clone()
        } else {
            let nested = relationships::resolve_target(source, &rel.target);
            let copy = copy_part(base, other, &nested, copied)?;
            relationships::relative_target(&name, &copy)
        };
        add_relationship_with_id(base, &name, &rel, &target)?;
    }

    tracing::trace!(from = %source, to = %name, "Copied part");
    Ok(name)
}

/// Re-create a relationship under its original id, so the copied part's
/// own `r:*` references stay valid.
fn add_relationship_with_id(
    base: &mut DocxPackage,
    part: &str,
    rel: &Relationship,
    target: &str,
) -> Result<()> {
    let rels_name = relationships::rels_part_name(part);
    if base.part(&rels_name).is_none() {
        base.insert_xml(&rels_name, relationships::empty_relationships());
    }
    let rels = base
        .part_mut(&rels_name)
        .ok_or_else(|| PackageError::MissingPart(rels_name.clone()))?;
    let mut element = XmlElement::new("Relationship")
        .with_attribute("Id", rel.id.as_str())
        .with_attribute("Type", rel.rel_type.as_str())
        .with_attribute("Target", target);
    if rel.external {
        element.set_attribute("TargetMode", "External");
    }
    rels.root.children.push(element.into());
    Ok(())
}

/// `word/header3.xml` -> (`word/header`, `xml`).
fn split_part_name(name: &str) -> (&str, &str) {
    let (base, extension) = name.rsplit_once('.').unwrap_or((name, "bin"));
    (base.trim_end_matches(|c: char| c.is_ascii_digit()), extension)
}

fn body<'a>(package: &'a DocxPackage, main: &str) -> Result<&'a XmlElement> {
    package
        .part(main)
        .and_then(|doc| doc.root.child("w:body"))
        .ok_or_else(|| PackageError::invalid(main, "document has no w:body"))
}

fn body_mut<'a>(package: &'a mut DocxPackage, main: &str) -> Result<&'a mut XmlElement> {
    package
        .part_mut(main)
        .and_then(|doc| doc.root.child_mut("w:body"))
        .ok_or_else(|| PackageError::invalid(main, "document has no w:body"))
}

/// Move the body's trailing `w:sectPr` into an empty paragraph's properties.
fn close_final_section(body: &mut XmlElement) {
    let last = body
        .children
        .iter()
        .rposition(|c| matches!(c, XmlChild::Element(_)));
    let Some(index) = last else {
        return;
    };
    if !body.children[index].as_element().is_some_and(|e| e.is("w:sectPr")) {
        return;
    }
    let XmlChild::Element(section) = body.children.remove(index) else {
        return;
    };
    let paragraph = XmlElement::new("w:p").with_child(XmlElement::new("w:pPr").with_child(section));
    body.children.insert(index, paragraph.into());
}

fn collect_relationship_ids(element: &XmlElement, ids: &mut BTreeSet<String>) {
    for attr in &element.attributes {
        if attr.prefix.as_deref() == Some(RELATIONSHIP_PREFIX) {
            ids.insert(attr.value.clone());
        }
    }
    for child in element.elements() {
        collect_relationship_ids(child, ids);
    }
}

fn remap_relationship_ids(element: &mut XmlElement, id_map: &HashMap<String, String>) {
    for attr in &mut element.attributes {
        if attr.prefix.as_deref() == Some(RELATIONSHIP_PREFIX)
            && let Some(new_id) = id_map.get(&attr.value)
        {
            attr.value = new_id.clone();
        }
    }
    for child in element.elements_mut() {
        remap_relationship_ids(child, id_map);
    }
}

/// Give every `wp:docPr` in the main document a distinct id.
fn renumber_drawings(package: &mut DocxPackage) -> Result<()> {
    let main = package.main_part_name().to_string();
    let document = package
        .part_mut(&main)
        .ok_or(PackageError::MissingMainDocument)?;
    let mut next_id = 1u32;
    renumber_in(&mut document.root, &mut next_id);
    Ok(())
}

fn renumber_in(element: &mut XmlElement, next_id: &mut u32) {
    if element.is("wp:docPr") {
        element.set_attribute("id", next_id.to_string());
        *next_id += 1;
    }
    for child in element.elements_mut() {
        renumber_in(child, next_id);
    }
}
