/*
 * package.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The [`DocxPackage`] container.
//!
//! A package is kept as its ordered list of zip entries plus the parsed
//! XML trees of the parts that can be edited (the main document, its
//! headers, footers, footnotes, endnotes and settings). On write, parsed
//! parts are re-serialized and every other entry is copied byte for byte.

use crate::content_types::{self, CONTENT_TYPES_PART};
use crate::error::{PackageError, Result};
use crate::relationships::{self, Relationship, rel_type};
use docreport_xml::{XmlDeclaration, XmlDocument, XmlElement, parse, parse_bytes};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const DEFAULT_MAIN_PART: &str = "word/document.xml";

/// Elements whose presence means a part carries tracked changes.
const REVISION_ELEMENTS: &[&str] = &[
    "cellDel",
    "cellIns",
    "cellMerge",
    "customXmlDelRangeEnd",
    "customXmlDelRangeStart",
    "customXmlInsRangeEnd",
    "customXmlInsRangeStart",
    "customXmlMoveFromRangeEnd",
    "customXmlMoveFromRangeStart",
    "customXmlMoveToRangeEnd",
    "customXmlMoveToRangeStart",
    "del",
    "delInstrText",
    "delText",
    "ins",
    "moveFrom",
    "moveFromRangeEnd",
    "moveFromRangeStart",
    "moveTo",
    "moveToRangeEnd",
    "moveToRangeStart",
    "numberingChange",
    "pPrChange",
    "rPrChange",
    "sectPrChange",
    "tblGridChange",
    "tblPrChange",
    "tblPrExChange",
    "tcPrChange",
    "trPrChange",
];

/// Kinds of parts the package parses on open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartKind {
    MainDocument,
    Header,
    Footer,
    Footnotes,
    Endnotes,
    Settings,
}

impl PartKind {
    /// Parts whose paragraphs carry user-visible text.
    pub const TEXT_PARTS: [PartKind; 5] = [
        PartKind::MainDocument,
        PartKind::Header,
        PartKind::Footer,
        PartKind::Footnotes,
        PartKind::Endnotes,
    ];

    /// Short relationship type name pointing at this kind of part.
    pub fn relationship_type(self) -> &'static str {
        match self {
            PartKind::MainDocument => "officeDocument",
            PartKind::Header => "header",
            PartKind::Footer => "footer",
            PartKind::Footnotes => "footnotes",
            PartKind::Endnotes => "endnotes",
            PartKind::Settings => "settings",
        }
    }

    /// Content type declared for parts of this kind.
    pub fn content_type(self) -> &'static str {
        match self {
            PartKind::MainDocument => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"
            }
            PartKind::Header => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml"
            }
            PartKind::Footer => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.footer+xml"
            }
            PartKind::Footnotes => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.footnotes+xml"
            }
            PartKind::Endnotes => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.endnotes+xml"
            }
            PartKind::Settings => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.settings+xml"
            }
        }
    }

    fn file_stem(self) -> &'static str {
        match self {
            PartKind::MainDocument => "document",
            PartKind::Header => "header",
            PartKind::Footer => "footer",
            PartKind::Footnotes => "footnotes",
            PartKind::Endnotes => "endnotes",
            PartKind::Settings => "settings",
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    /// Raw bytes; stale once the part has a parsed tree.
    data: Vec<u8>,
}

/// A `.docx` package held in memory.
#[derive(Debug, Clone)]
pub struct DocxPackage {
    entries: Vec<Entry>,
    parts: BTreeMap<String, XmlDocument>,
    main_part: String,
}

impl DocxPackage {
    /// Open a package from a file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "Opening package");
        Self::from_reader(BufReader::new(file))
    }

    /// Read a package from an in-memory buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_reader(Cursor::new(bytes))
    }

    /// Read a package from any seekable stream.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            entries.push(Entry { name, data });
        }
        Self::from_entries(entries)
    }

    /// Build a minimal package around a complete `w:document` part.
    pub fn from_document_xml(document_xml: &str) -> Result<Self> {
        let document = parse(document_xml).map_err(|e| PackageError::xml(DEFAULT_MAIN_PART, e))?;

        let mut types = XmlDocument::new(
            XmlElement::new("Types").with_attribute(
                "xmlns",
                "http://schemas.openxmlformats.org/package/2006/content-types",
            ),
        );
        types.declaration = Some(XmlDeclaration::standalone_utf8());
        content_types::ensure_default(
            &mut types.root,
            "rels",
            "application/vnd.openxmlformats-package.relationships+xml",
        );
        content_types::ensure_default(&mut types.root, "xml", "application/xml");
        content_types::ensure_override(
            &mut types.root,
            DEFAULT_MAIN_PART,
            PartKind::MainDocument.content_type(),
        );

        let mut root_rels = relationships::empty_relationships();
        relationships::add_relationship(
            &mut root_rels.root,
            rel_type::OFFICE_DOCUMENT,
            DEFAULT_MAIN_PART,
            false,
        );

        let main_rels = relationships::rels_part_name(DEFAULT_MAIN_PART);
        let entries = vec![
            Entry {
                name: CONTENT_TYPES_PART.to_string(),
                data: serialize(CONTENT_TYPES_PART, &types)?,
            },
            Entry {
                name: "_rels/.rels".to_string(),
                data: serialize("_rels/.rels", &root_rels)?,
            },
            Entry {
                name: DEFAULT_MAIN_PART.to_string(),
                data: serialize(DEFAULT_MAIN_PART, &document)?,
            },
            Entry {
                data: serialize(&main_rels, &relationships::empty_relationships())?,
                name: main_rels,
            },
        ];
        Self::from_entries(entries)
    }

    fn from_entries(entries: Vec<Entry>) -> Result<Self> {
        let mut package = DocxPackage {
            entries,
            parts: BTreeMap::new(),
            main_part: String::new(),
        };

        package.load_part(CONTENT_TYPES_PART)?;
        let root_rels = relationships::rels_part_name("");
        package.main_part = if package.load_optional(&root_rels)? {
            package
                .relationships("")
                .into_iter()
                .find(|r| r.is_type(PartKind::MainDocument.relationship_type()) && !r.external)
                .map(|r| relationships::resolve_target("", &r.target))
                .unwrap_or_else(|| DEFAULT_MAIN_PART.to_string())
        } else {
            DEFAULT_MAIN_PART.to_string()
        };
        if !package.has_part(&package.main_part) {
            return Err(PackageError::MissingMainDocument);
        }

        let main = package.main_part.clone();
        package.load_part(&main)?;
        package.load_optional(&relationships::rels_part_name(&main))?;
        for kind in [
            PartKind::Header,
            PartKind::Footer,
            PartKind::Footnotes,
            PartKind::Endnotes,
            PartKind::Settings,
        ] {
            for name in package.part_names(kind) {
                package.load_part(&name)?;
            }
        }

        tracing::debug!(
            entries = package.entries.len(),
            parsed = package.parts.len(),
            main = %package.main_part,
            "Loaded package"
        );
        Ok(package)
    }

    fn load_part(&mut self, name: &str) -> Result<()> {
        if self.parts.contains_key(name) {
            return Ok(());
        }
        let entry = self
            .entries
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| PackageError::MissingPart(name.to_string()))?;
        let document = parse_bytes(&entry.data).map_err(|e| PackageError::xml(name, e))?;
        self.parts.insert(name.to_string(), document);
        Ok(())
    }

    fn load_optional(&mut self, name: &str) -> Result<bool> {
        if !self.has_part(name) {
            return Ok(false);
        }
        self.load_part(name)?;
        Ok(true)
    }

    /// Name of the main document part, normally `word/document.xml`.
    pub fn main_part_name(&self) -> &str {
        &self.main_part
    }

    /// Whether the package contains an entry with this name.
    pub fn has_part(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Names of every entry, in archive order.
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Parts of one kind, located through the main document's relationships.
    pub fn part_names(&self, kind: PartKind) -> Vec<String> {
        if kind == PartKind::MainDocument {
            return vec![self.main_part.clone()];
        }
        let mut names: Vec<String> = Vec::new();
        for rel in self.relationships(&self.main_part) {
            if rel.external || !rel.is_type(kind.relationship_type()) {
                continue;
            }
            let name = relationships::resolve_target(&self.main_part, &rel.target);
            if self.has_part(&name) && !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Main document, headers, footers, footnotes and endnotes, in that order.
    pub fn text_part_names(&self) -> Vec<String> {
        PartKind::TEXT_PARTS
            .iter()
            .flat_map(|&kind| self.part_names(kind))
            .collect()
    }

    /// Parsed tree of a part, if it was parsed on open or added since.
    pub fn part(&self, name: &str) -> Option<&XmlDocument> {
        self.parts.get(name)
    }

    /// Mutable parsed tree of a part.
    pub fn part_mut(&mut self, name: &str) -> Option<&mut XmlDocument> {
        self.parts.get_mut(name)
    }

    /// Current content of an entry; parsed parts are serialized.
    pub fn part_bytes(&self, name: &str) -> Result<Option<Vec<u8>>> {
        if let Some(document) = self.parts.get(name) {
            return serialize(name, document).map(Some);
        }
        Ok(self
            .entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.data.clone()))
    }

    /// Parse any XML entry, using the cached tree when there is one.
    pub fn read_xml(&self, name: &str) -> Result<XmlDocument> {
        if let Some(document) = self.parts.get(name) {
            return Ok(document.clone());
        }
        let entry = self
            .entries
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| PackageError::MissingPart(name.to_string()))?;
        parse_bytes(&entry.data).map_err(|e| PackageError::xml(name, e))
    }

    /// Relationships owned by `part` (`""` for the package root).
    ///
    /// A part without a relationship part, or with an unreadable one, has none.
    pub fn relationships(&self, part: &str) -> Vec<Relationship> {
        let rels_name = relationships::rels_part_name(part);
        match self.parts.get(&rels_name) {
            Some(rels) => relationships::read_relationships(&rels.root),
            None => self
                .read_xml(&rels_name)
                .map(|rels| relationships::read_relationships(&rels.root))
                .unwrap_or_default(),
        }
    }

    /// Content type declared for a part.
    pub fn content_type(&self, part: &str) -> Option<String> {
        let types = self.parts.get(CONTENT_TYPES_PART)?;
        content_types::content_type_for(&types.root, part)
    }

    /// Relationship from `source_part` to a target, created with a fresh id.
    pub fn add_relationship(
        &mut self,
        source_part: &str,
        rel_type: &str,
        target: &str,
        external: bool,
    ) -> Result<String> {
        let rels_name = relationships::rels_part_name(source_part);
        if !self.has_part(&rels_name) {
            self.insert_xml(&rels_name, relationships::empty_relationships());
        }
        self.load_part(&rels_name)?;
        let rels = self
            .parts
            .get_mut(&rels_name)
            .ok_or_else(|| PackageError::MissingPart(rels_name.clone()))?;
        Ok(relationships::add_relationship(&mut rels.root, rel_type, target, external))
    }

    /// First free name of the form `{stem}{N}.{extension}`, N from 1.
    pub fn unique_part_name(&self, stem: &str, extension: &str) -> String {
        (1..)
            .map(|n| format!("{stem}{n}.{extension}"))
            .find(|name| !self.has_part(name))
            .unwrap_or_else(|| format!("{stem}.{extension}"))
    }

    /// Store raw bytes as a new (or replaced) entry.
    pub fn insert_raw(&mut self, name: &str, data: Vec<u8>) {
        self.parts.remove(name);
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => entry.data = data,
            None => self.entries.push(Entry {
                name: name.to_string(),
                data,
            }),
        }
    }

    /// Store a parsed XML part as a new (or replaced) entry.
    pub fn insert_xml(&mut self, name: &str, document: XmlDocument) {
        if !self.has_part(name) {
            self.entries.push(Entry {
                name: name.to_string(),
                data: Vec::new(),
            });
        }
        self.parts.insert(name.to_string(), document);
    }

    /// Declare content types for a part: an override for XML parts, an
    /// extension default for everything else.
    pub fn declare_content_type(&mut self, part: &str, content_type: &str) -> Result<()> {
        let types = self
            .parts
            .get_mut(CONTENT_TYPES_PART)
            .ok_or_else(|| PackageError::MissingPart(CONTENT_TYPES_PART.to_string()))?;
        match part.rsplit_once('.') {
            Some((_, extension)) if !extension.eq_ignore_ascii_case("xml") => {
                content_types::ensure_default(&mut types.root, extension, content_type);
            }
            _ => content_types::ensure_override(&mut types.root, part, content_type),
        }
        Ok(())
    }

    /// Add an image part (`word/media/imageN.ext`) related from the main
    /// document, returning the relationship id to embed.
    pub fn add_image_part(
        &mut self,
        data: Vec<u8>,
        extension: &str,
        content_type: &str,
    ) -> Result<String> {
        let extension = extension.to_ascii_lowercase();
        let name = self.unique_part_name("word/media/image", &extension);
        self.insert_raw(&name, data);
        self.declare_content_type(&name, content_type)?;
        let main = self.main_part.clone();
        let target = relationships::relative_target(&main, &name);
        let id = self.add_relationship(&main, rel_type::IMAGE, &target, false)?;
        tracing::debug!(part = %name, rel = %id, "Added image part");
        Ok(id)
    }

    /// Add a header, footer, footnotes or endnotes part related from the main
    /// document. Returns the new part name.
    pub fn add_xml_part(&mut self, kind: PartKind, xml: &str) -> Result<String> {
        let dir = self.main_part.rsplit_once('/').map_or("", |(dir, _)| dir);
        let stem = if dir.is_empty() {
            kind.file_stem().to_string()
        } else {
            format!("{dir}/{}", kind.file_stem())
        };
        let name = self.unique_part_name(&stem, "xml");
        let document = parse(xml).map_err(|e| PackageError::xml(&name, e))?;
        self.insert_xml(&name, document);
        self.declare_content_type(&name, kind.content_type())?;
        let main = self.main_part.clone();
        let target = relationships::relative_target(&main, &name);
        self.add_relationship(
            &main,
            &rel_type::uri(kind.relationship_type()),
            &target,
            false,
        )?;
        Ok(name)
    }

    /// Whether the document has change tracking switched on or holds
    /// tracked revisions in any text part.
    pub fn has_revision_tracking(&self) -> bool {
        let tracking_on = self
            .part_names(PartKind::Settings)
            .iter()
            .filter_map(|name| self.parts.get(name))
            .any(|settings| settings.root.descendants().any(|e| e.is("w:trackRevisions")));
        if tracking_on {
            return true;
        }
        self.text_part_names()
            .iter()
            .filter_map(|name| self.parts.get(name))
            .any(|part| part.root.descendants().any(is_revision_element))
    }

    /// Write the package as a zip archive.
    ///
    /// XML parts are deflated; media and other binary entries are stored.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<()> {
        let mut zip = ZipWriter::new(writer);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        for entry in &self.entries {
            let options = if is_xml_entry(&entry.name) {
                deflated
            } else {
                stored
            };
            zip.start_file(entry.name.as_str(), options)?;
            match self.parts.get(&entry.name) {
                Some(document) => document
                    .write_to(&mut zip)
                    .map_err(|e| PackageError::xml(&entry.name, e))?,
                None => zip.write_all(&entry.data)?,
            }
        }
        zip.finish()?;
        tracing::debug!(entries = self.entries.len(), "Wrote package");
        Ok(())
    }

    /// Write the package to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Serialize the package into memory.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_to(&mut cursor)?;
        Ok(cursor.into_inner())
    }
}

fn serialize(name: &str, document: &XmlDocument) -> Result<Vec<u8>> {
    document.to_bytes().map_err(|e| PackageError::xml(name, e))
}

fn is_revision_element(element: &XmlElement) -> bool {
    element.prefix.as_deref() == Some("w") && REVISION_ELEMENTS.contains(&element.name.as_str())
}

fn is_xml_entry(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".xml") || lower.ends_with(".rels")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DOCUMENT: &str = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>Hello</w:t></w:r></w:p><w:sectPr/></w:body></w:document>"#;

    #[test]
    fn test_from_document_xml() {
        let package = DocxPackage::from_document_xml(DOCUMENT).unwrap();
        assert_eq!(package.main_part_name(), "word/document.xml");
        assert_eq!(package.text_part_names(), vec!["word/document.xml".to_string()]);
        let main = package.part("word/document.xml").unwrap();
        assert_eq!(main.root.descendant_text("w:t"), "Hello");
        assert_eq!(
            package.content_type("word/document.xml").as_deref(),
            Some(PartKind::MainDocument.content_type())
        );
    }

    #[test]
    fn test_add_xml_part_is_found_by_kind() {
        let mut package = DocxPackage::from_document_xml(DOCUMENT).unwrap();
        let name = package
            .add_xml_part(
                PartKind::Header,
                r#"<w:hdr xmlns:w="urn:w"><w:p><w:r><w:t>[Title]</w:t></w:r></w:p></w:hdr>"#,
            )
            .unwrap();
        assert_eq!(name, "word/header1.xml");
        assert_eq!(package.part_names(PartKind::Header), vec![name.clone()]);
        assert_eq!(
            package.text_part_names(),
            vec!["word/document.xml".to_string(), name]
        );
    }

    #[test]
    fn test_add_image_part() {
        let mut package = DocxPackage::from_document_xml(DOCUMENT).unwrap();
        let first = package.add_image_part(vec![1, 2, 3], "PNG", "image/png").unwrap();
        let second = package.add_image_part(vec![4], "png", "image/png").unwrap();
        assert_ne!(first, second);
        assert!(package.has_part("word/media/image1.png"));
        assert!(package.has_part("word/media/image2.png"));
        assert_eq!(package.content_type("word/media/image2.png").as_deref(), Some("image/png"));

        let rels = package.relationships("word/document.xml");
        let image = rels.iter().find(|r| r.id == second).unwrap();
        assert_eq!(image.target, "media/image2.png");
        assert!(image.is_type("image"));
    }

    #[test]
    fn test_revision_markup_is_detected() {
        let clean = DocxPackage::from_document_xml(DOCUMENT).unwrap();
        assert!(!clean.has_revision_tracking());

        let tracked = DocxPackage::from_document_xml(
            r#"<w:document xmlns:w="urn:w"><w:body><w:p><w:ins w:id="1"><w:r><w:t>x</w:t></w:r></w:ins></w:p></w:body></w:document>"#,
        )
        .unwrap();
        assert!(tracked.has_revision_tracking());
    }

    #[test]
    fn test_track_revisions_setting_is_detected() {
        let mut package = DocxPackage::from_document_xml(DOCUMENT).unwrap();
        package
            .add_xml_part(
                PartKind::Settings,
                r#"<w:settings xmlns:w="urn:w"><w:trackRevisions/></w:settings>"#,
            )
            .unwrap();
        assert!(package.has_revision_tracking());
    }

    #[test]
    fn test_round_trip_through_bytes() {
        let mut package = DocxPackage::from_document_xml(DOCUMENT).unwrap();
        package.add_image_part(vec![0x89, b'P', b'N', b'G'], "png", "image/png").unwrap();
        let main = package.part_mut("word/document.xml").unwrap();
        main.root.children.clear();

        let bytes = package.to_bytes().unwrap();
        let reopened = DocxPackage::from_bytes(&bytes).unwrap();
        assert_eq!(
            reopened.entry_names().collect::<Vec<_>>(),
            package.entry_names().collect::<Vec<_>>()
        );
        assert_eq!(
            reopened.part_bytes("word/media/image1.png").unwrap(),
            Some(vec![0x89, b'P', b'N', b'G'])
        );
        assert_eq!(
            reopened.part("word/document.xml"),
            package.part("word/document.xml")
        );
    }

    #[test]
    fn test_unique_part_name() {
        let package = DocxPackage::from_document_xml(DOCUMENT).unwrap();
        assert_eq!(package.unique_part_name("word/header", "xml"), "word/header1.xml");
    }

    #[test]
    fn test_not_a_zip_is_an_error() {
        let result = DocxPackage::from_bytes(b"not a zip");
        assert!(matches!(result, Err(PackageError::Zip(_))));
    }
}
