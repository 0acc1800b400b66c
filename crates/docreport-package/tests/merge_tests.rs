/*
 * merge_tests.rs
 * Copyright (c) 2025 Posit, PBC
 */

use docreport_package::{DocxPackage, PartKind, merge, merge_packages};
use pretty_assertions::assert_eq;
use std::io::Cursor;

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

fn document(text: &str, header_rel: Option<&str>, image_rel: Option<&str>) -> String {
    let drawing = image_rel
        .map(|id| {
            format!(
                r#"<w:p><w:r><w:drawing><wp:inline xmlns:wp="urn:wp"><wp:docPr id="1" name="Picture 1"/><a:blip xmlns:a="urn:a" r:embed="{id}"/></wp:inline></w:drawing></w:r></w:p>"#
            )
        })
        .unwrap_or_default();
    let header = header_rel
        .map(|id| format!(r#"<w:headerReference w:type="default" r:id="{id}"/>"#))
        .unwrap_or_default();
    format!(
        r#"<w:document xmlns:w="{W_NS}" xmlns:r="{R_NS}"><w:body><w:p><w:r><w:t>{text}</w:t></w:r></w:p>{drawing}<w:sectPr>{header}<w:pgSz w:w="11906" w:h="16838"/></w:sectPr></w:body></w:document>"#
    )
}

fn package_with_header_and_image(text: &str) -> DocxPackage {
    let mut package = DocxPackage::from_document_xml(&document(text, None, None)).unwrap();
    let image_id = package
        .add_image_part(vec![1, 2, 3, 4], "png", "image/png")
        .unwrap();
    package
        .add_xml_part(
            PartKind::Header,
            &format!(r#"<w:hdr xmlns:w="{W_NS}"><w:p><w:r><w:t>Header {text}</w:t></w:r></w:p></w:hdr>"#),
        )
        .unwrap();
    let header_id = package
        .relationships("word/document.xml")
        .into_iter()
        .find(|r| r.is_type("header"))
        .unwrap()
        .id;

    let rebuilt = document(text, Some(&header_id), Some(&image_id));
    let main = package.part_mut("word/document.xml").unwrap();
    *main = docreport_xml::parse(&rebuilt).unwrap();
    package
}

#[test]
fn merged_body_contains_every_document_in_order() {
    let first = DocxPackage::from_document_xml(&document("first", None, None)).unwrap();
    let second = DocxPackage::from_document_xml(&document("second", None, None)).unwrap();
    let merged = merge_packages(vec![first, second]).unwrap();

    let main = merged.part("word/document.xml").unwrap();
    assert_eq!(main.root.descendant_text("w:t"), "firstsecond");

    let body = main.root.child("w:body").unwrap();
    let names: Vec<String> = body.elements().map(|e| e.qualified_name()).collect();
    // first paragraph, section break paragraph, second paragraph, final section
    assert_eq!(names, vec!["w:p", "w:p", "w:p", "w:sectPr"]);
    assert_eq!(body.get_children("w:sectPr").len(), 1);
    assert!(
        body.element_at(&[1])
            .unwrap()
            .child("w:pPr")
            .unwrap()
            .child("w:sectPr")
            .is_some()
    );
}

#[test]
fn single_document_merge_is_unchanged() {
    let only = DocxPackage::from_document_xml(&document("only", None, None)).unwrap();
    let expected = only.part("word/document.xml").cloned();
    let merged = merge_packages(vec![only]).unwrap();
    assert_eq!(merged.part("word/document.xml").cloned(), expected);
}

#[test]
fn appended_relationships_point_at_copied_parts() {
    let first = package_with_header_and_image("one");
    let second = package_with_header_and_image("two");
    let merged = merge_packages(vec![first, second]).unwrap();

    assert!(merged.has_part("word/media/image1.png"));
    assert!(merged.has_part("word/media/image2.png"));
    assert!(merged.has_part("word/header1.xml"));
    assert!(merged.has_part("word/header2.xml"));

    let headers = merged.part_names(PartKind::Header);
    assert_eq!(headers.len(), 2);
    let second_header = merged.part("word/header2.xml").unwrap();
    assert_eq!(second_header.root.descendant_text("w:t"), "Header two");

    let main = merged.part("word/document.xml").unwrap();
    let rels = merged.relationships("word/document.xml");
    let embeds: Vec<&str> = main
        .root
        .descendants()
        .filter(|e| e.is("a:blip"))
        .filter_map(|e| e.get_attribute("r:embed"))
        .collect();
    assert_eq!(embeds.len(), 2);
    assert_ne!(embeds[0], embeds[1]);
    let second_target = &rels.iter().find(|r| r.id == embeds[1]).unwrap().target;
    assert_eq!(second_target, "media/image2.png");
    assert_eq!(
        merged.part_bytes("word/media/image2.png").unwrap(),
        Some(vec![1, 2, 3, 4])
    );
}

#[test]
fn drawing_ids_are_unique_after_merge() {
    let merged = merge_packages(vec![
        package_with_header_and_image("a"),
        package_with_header_and_image("b"),
        package_with_header_and_image("c"),
    ])
    .unwrap();
    let main = merged.part("word/document.xml").unwrap();
    let ids: Vec<&str> = main
        .root
        .descendants()
        .filter(|e| e.is("wp:docPr"))
        .filter_map(|e| e.get_attribute("id"))
        .collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
}

#[test]
fn merge_writes_a_readable_package() {
    let mut cursor = Cursor::new(Vec::new());
    merge(
        vec![
            package_with_header_and_image("x"),
            package_with_header_and_image("y"),
        ],
        &mut cursor,
    )
    .unwrap();

    let reopened = DocxPackage::from_bytes(cursor.get_ref()).unwrap();
    assert_eq!(reopened.part_names(PartKind::Header).len(), 2);
    let text = reopened
        .part("word/document.xml")
        .unwrap()
        .root
        .descendant_text("w:t");
    assert_eq!(text, "xy");
}

#[test]
fn package_survives_a_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.docx");
    let package = package_with_header_and_image("disk");
    package.save(&path).unwrap();

    let reopened = DocxPackage::open(&path).unwrap();
    assert_eq!(
        reopened.text_part_names(),
        vec!["word/document.xml".to_string(), "word/header1.xml".to_string()]
    );
    assert!(!reopened.has_revision_tracking());
}
