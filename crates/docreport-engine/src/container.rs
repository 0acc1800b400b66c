/*
 * container.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The document container seen by the engine.
//!
//! The engine edits part trees and asks the container for everything that
//! involves the package itself: which parts hold text, adding image parts,
//! and merging finished documents into one output.

use crate::error::ReportResult;
use docreport_package::DocxPackage;
use docreport_xml::XmlElement;
use image::ImageFormat;
use std::io::{Seek, Write};

/// A word-processing document the engine can fill in.
///
/// Builds work on clones of the template, so containers are `Clone`.
pub trait Container: Clone {
    /// Name of the main document part.
    fn main_part(&self) -> String;

    /// Parts whose paragraphs receive replacements: the main part first,
    /// then headers, footers, footnotes and endnotes.
    fn text_parts(&self) -> Vec<String>;

    fn part_root(&self, name: &str) -> Option<&XmlElement>;

    fn part_root_mut(&mut self, name: &str) -> Option<&mut XmlElement>;

    /// Store picture bytes as a new part related from the main part.
    /// Returns the relationship id a drawing embeds.
    fn add_image_part(&mut self, data: Vec<u8>, format: ImageFormat) -> ReportResult<String>;

    /// Whether change tracking is on or tracked revisions are present.
    fn has_revision_tracking(&self) -> bool;

    /// Write the concatenation of `documents` to `writer`.
    fn merge<W: Write + Seek>(documents: Vec<Self>, writer: W) -> ReportResult<()>;
}

impl Container for DocxPackage {
    fn main_part(&self) -> String {
        self.main_part_name().to_string()
    }

    fn text_parts(&self) -> Vec<String> {
        self.text_part_names()
    }

    fn part_root(&self, name: &str) -> Option<&XmlElement> {
        self.part(name).map(|document| &document.root)
    }

    fn part_root_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        self.part_mut(name).map(|document| &mut document.root)
    }

    fn add_image_part(&mut self, data: Vec<u8>, format: ImageFormat) -> ReportResult<String> {
        let extension = format.extensions_str().first().copied().unwrap_or("bin");
        let id = DocxPackage::add_image_part(self, data, extension, format.to_mime_type())?;
        Ok(id)
    }

    fn has_revision_tracking(&self) -> bool {
        DocxPackage::has_revision_tracking(self)
    }

    fn merge<W: Write + Seek>(documents: Vec<Self>, writer: W) -> ReportResult<()> {
        docreport_package::merge(documents, writer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BODY: &str = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p/></w:body></w:document>"#;

    #[test]
    fn test_docx_package_as_container() {
        let mut package = DocxPackage::from_document_xml(BODY).unwrap();
        assert_eq!(package.main_part(), "word/document.xml");
        assert_eq!(package.text_parts(), vec!["word/document.xml".to_string()]);
        assert!(package.part_root("word/document.xml").unwrap().is("w:document"));
        assert!(!Container::has_revision_tracking(&package));

        let id = Container::add_image_part(&mut package, vec![1, 2, 3], ImageFormat::Png).unwrap();
        assert!(id.starts_with("rId"));
        assert!(package.has_part("word/media/image1.png"));
        assert_eq!(
            package.content_type("word/media/image1.png").as_deref(),
            Some("image/png")
        );
    }
}
