/*
 * content_types.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The `[Content_Types].xml` part.

use docreport_xml::XmlElement;

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Content type declared for a part: an `Override` wins over the extension `Default`.
pub fn content_type_for(types: &XmlElement, part: &str) -> Option<String> {
    let part_name = format!("/{part}");
    let overridden = types
        .elements()
        .filter(|e| e.name == "Override")
        .find(|e| e.get_attribute("PartName").is_some_and(|p| p.eq_ignore_ascii_case(&part_name)))
        .and_then(|e| e.get_attribute("ContentType"));
    if let Some(content_type) = overridden {
        return Some(content_type.to_string());
    }
    let extension = part.rsplit_once('.')?.1;
    types
        .elements()
        .filter(|e| e.name == "Default")
        .find(|e| e.get_attribute("Extension").is_some_and(|x| x.eq_ignore_ascii_case(extension)))
        .and_then(|e| e.get_attribute("ContentType"))
        .map(str::to_string)
}

/// Declare a `Default` for the extension unless one exists.
pub fn ensure_default(types: &mut XmlElement, extension: &str, content_type: &str) {
    let present = types.elements().any(|e| {
        e.name == "Default"
            && e.get_attribute("Extension").is_some_and(|x| x.eq_ignore_ascii_case(extension))
    });
    if !present {
        let default = XmlElement::new("Default")
            .with_attribute("Extension", extension)
            .with_attribute("ContentType", content_type);
        // Defaults precede overrides
        let position = types
            .children
            .iter()
            .position(|c| c.as_element().is_some_and(|e| e.name == "Override"))
            .unwrap_or(types.children.len());
        types.children.insert(position, default.into());
    }
}

/// Declare an `Override` for the part, replacing an existing one.
pub fn ensure_override(types: &mut XmlElement, part: &str, content_type: &str) {
    let part_name = format!("/{part}");
    if let Some(existing) = types
        .elements_mut()
        .find(|e| e.name == "Override" && e.get_attribute("PartName") == Some(part_name.as_str()))
    {
        existing.set_attribute("ContentType", content_type);
        return;
    }
    types.children.push(
        XmlElement::new("Override")
            .with_attribute("PartName", part_name)
            .with_attribute("ContentType", content_type)
            .into(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use docreport_xml::parse;

    const TYPES: &str = r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="main"/></Types>"#;

    #[test]
    fn test_override_wins_over_default() {
        let types = parse(TYPES).unwrap().root;
        assert_eq!(content_type_for(&types, "word/document.xml").as_deref(), Some("main"));
        assert_eq!(content_type_for(&types, "word/other.xml").as_deref(), Some("application/xml"));
        assert_eq!(content_type_for(&types, "word/media/a.png"), None);
    }

    #[test]
    fn test_ensure_default_inserts_before_overrides() {
        let mut types = parse(TYPES).unwrap().root;
        ensure_default(&mut types, "png", "image/png");
        ensure_default(&mut types, "PNG", "image/png");
        let names: Vec<_> = types.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Default", "Default", "Override"]);
        assert_eq!(content_type_for(&types, "word/media/a.png").as_deref(), Some("image/png"));
    }

    #[test]
    fn test_ensure_override_replaces() {
        let mut types = parse(TYPES).unwrap().root;
        ensure_override(&mut types, "word/document.xml", "other");
        ensure_override(&mut types, "word/header2.xml", "header");
        assert_eq!(content_type_for(&types, "word/document.xml").as_deref(), Some("other"));
        assert_eq!(content_type_for(&types, "word/header2.xml").as_deref(), Some("header"));
        assert_eq!(types.get_children("Override").len(), 2);
    }
}
