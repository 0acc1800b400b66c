/*
 * table.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Repeating table sections.
//!
//! A section is delimited in the template text by `<##Name` and `Name##>`;
//! its body holds `<#Field#>` tokens and, possibly, nested sections:
//!
//! ```text
//! <##Orders  <#Number#>  <#Date:dd.MM.yyyy#>
//!     <##Lines  <#Product#>  <#Price:N2#>  Lines##>
//! Orders##>
//! ```
//!
//! Expansion copies the template elements between the two markers once per
//! row, fills the field tokens and removes the original scaffold.

use crate::matcher::{TextReplacer, find_first};
use crate::options::ReportOptions;
use crate::parameter::ParameterSpec;
use crate::value::{ParamValue, Row};
use crate::warnings::Warnings;
use docreport_xml::{XmlChild, XmlElement, common_prefix_len};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static SECTION_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<##([\w\d]+)").unwrap());
static FIELD_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<#(.+?)#>").unwrap());

/// A repeating section of the template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSection {
    /// Section name; also the parameter key holding its rows.
    pub name: String,
    /// Field tokens owned by this section, in order of appearance.
    pub inner_params: Vec<ParameterSpec>,
    /// Sections nested in this one's body.
    pub inner_tables: Vec<TableSection>,
}

impl TableSection {
    /// Find every top-level section in a template's text.
    ///
    /// Closing tokens are located by literal search for `Name##>`, so a
    /// section name must not reappear as the tail of another section's
    /// closing token.
    pub fn parse_all(text: &str) -> Vec<TableSection> {
        let (Some(first), Some(last)) = (text.find("<##"), text.rfind("##>")) else {
            return Vec::new();
        };
        let Some(window) = text.get(first..last + 3) else {
            return Vec::new();
        };

        let mut sections: Vec<TableSection> = Vec::new();
        let mut cursor = 0;
        while let Some(captures) = SECTION_OPEN.captures_at(window, cursor) {
            let (Some(opener), Some(name)) = (captures.get(0), captures.get(1)) else {
                break;
            };
            let name = name.as_str();
            let open = format!("<##{name}");
            let close = format!("{name}##>");

            let mut next = opener.end();
            if let (Some(start), Some(end)) = (window.find(&open), window.find(&close)) {
                if start <= end && sections.iter().all(|s| s.name != name) {
                    let body = window[start..end].replace(&open, "");
                    sections.push(TableSection::from_body(name, &body));
                }
                if end > opener.start() {
                    next = end;
                }
            }
            cursor = next;
        }
        sections
    }

    fn from_body(name: &str, body: &str) -> TableSection {
        let mut section = TableSection {
            name: name.to_string(),
            inner_params: Vec::new(),
            inner_tables: TableSection::parse_all(body),
        };
        for captures in FIELD_TOKEN.captures_iter(body) {
            let raw = &captures[1];
            let plain = match (raw.find('#'), raw.find(':')) {
                (None, _) => true,
                (Some(hash), Some(colon)) => colon > 0 && hash > colon,
                (Some(_), None) => false,
            };
            if plain
                && section.inner_params.iter().all(|p| p.name != raw)
                && !section.owned_by_inner(raw)
            {
                section.inner_params.push(ParameterSpec::parse(raw));
            }
        }
        section
    }

    fn owned_by_inner(&self, full_name: &str) -> bool {
        self.inner_tables.iter().any(|table| {
            table.inner_params.iter().any(|p| p.full_name == full_name)
                || table.owned_by_inner(full_name)
        })
    }

    pub fn start_marker(&self) -> String {
        format!("<##{}", self.name)
    }

    pub fn end_marker(&self) -> String {
        format!("{}##>", self.name)
    }

    /// Expand the section found in `scope` once per row.
    ///
    /// Does nothing when either marker is missing. Nested sections are
    /// expanded right after each row copy, with that row's nested rows.
    pub fn expand(&self, scope: &mut XmlElement, rows: &[Row], options: &ReportOptions) {
        let start_marker = self.start_marker();
        let end_marker = self.end_marker();
        let (Some(start_path), Some(end_path)) = (
            find_first(scope, &start_marker, "w:p", false),
            find_first(scope, &end_marker, "w:p", false),
        ) else {
            tracing::debug!(section = %self.name, "Section markers not found");
            return;
        };
        if start_path.is_empty() || end_path.is_empty() {
            return;
        }

        // Deepest element that strictly contains both markers.
        let depth = common_prefix_len(&start_path, &end_path)
            .min(start_path.len() - 1)
            .min(end_path.len() - 1);
        let (start, end) = (start_path[depth], end_path[depth]);
        if end < start {
            tracing::warn!(section = %self.name, "Section end marker precedes its start");
            return;
        }
        let Some(ancestor) = scope.element_at_mut(&start_path[..depth]) else {
            return;
        };

        let template: Vec<XmlChild> = if start == end {
            vec![ancestor.children[start].clone()]
        } else {
            ancestor.children[start..end].to_vec()
        };
        let closing = ancestor.children[end].clone();
        let span = end - start + 1;
        let tail = ancestor.children.len() - end - 1;

        for row in rows {
            let copies: Vec<XmlChild> = template
                .iter()
                .map(|child| self.instantiate(child.clone(), Some(row), options))
                .collect();
            let at = ancestor.children.len() - tail - span;
            ancestor.children.splice(at..at, copies);

            for inner in &self.inner_tables {
                let inner_rows = row
                    .get(&inner.name)
                    .and_then(ParamValue::as_rows)
                    .unwrap_or(&[]);
                inner.expand(ancestor, inner_rows, options);
            }
        }

        let trailing = self.instantiate(closing, None, options);
        let keep_trailing = trailing
            .as_element()
            .is_some_and(|e| !e.descendant_text("w:t").trim().is_empty());
        let at = ancestor.children.len() - tail - span;
        if keep_trailing {
            ancestor.children.insert(at, trailing);
            ancestor.children.drain(at + 1..at + 1 + span);
        } else {
            ancestor.children.drain(at..at + span);
        }

        tracing::debug!(section = %self.name, rows = rows.len(), "Expanded section");
    }

    /// Fill one copy of template content. Without a row every field is
    /// blanked.
    fn instantiate(&self, child: XmlChild, row: Option<&Row>, options: &ReportOptions) -> XmlChild {
        let mut element = match child {
            XmlChild::Element(element) => element,
            other => return other,
        };

        for param in &self.inner_params {
            let value = row
                .and_then(|row| row.get(&param.name))
                .map(|value| param.format(value))
                .unwrap_or_default();
            TextReplacer::new(&param.field_token(), &value)
                .match_case(true)
                .apply(&mut element);
        }
        TextReplacer::new(&self.start_marker(), "")
            .match_case(true)
            .apply(&mut element);
        TextReplacer::new(&self.end_marker(), "")
            .match_case(true)
            .apply(&mut element);

        // Bookmarks do not survive copying, so row images are attached to
        // the placeholder hyperlink carrying the image key.
        let images = row.into_iter().flatten().filter(|(key, _)| key.starts_with(&options.image_prefix));
        for (key, value) in images {
            let Some(image) = value.as_images().and_then(<[_]>::first) else {
                continue;
            };
            if let Some(path) = find_first(&element, key, "w:hyperlink", true)
                && let Some(link) = element.element_at_mut(&path)
            {
                link.set_attribute("imgPath", image.path.display().to_string());
                link.set_attribute("imgWidth", image.width.to_string());
                link.set_attribute("imgHeight", image.height.to_string());
            }
        }
        // Rows without a picture leave an explicitly empty placeholder.
        let unbound = element.find_all_paths(|e| {
            e.is("w:hyperlink")
                && e.get_attribute("imgPath").is_none()
                && e.descendant_text("w:t").starts_with(&options.image_prefix)
        });
        for path in unbound {
            if let Some(link) = element.element_at_mut(&path) {
                link.set_attribute("imgPath", "");
            }
        }

        element.into()
    }

    /// Report missing rows and fields for this section under `params`.
    pub fn validate(&self, params: &Row, warnings: &mut Warnings) {
        let rows = match params.get(&self.name) {
            None => {
                warnings.push(format!("Table parameter {} not found", self.name));
                return;
            }
            Some(value) => match value.as_rows() {
                Some(rows) => rows,
                None => {
                    warnings.push(format!(
                        "Table parameter {} is not a list of rows",
                        self.name
                    ));
                    return;
                }
            },
        };

        for param in &self.inner_params {
            if rows.iter().any(|row| !row.contains_key(&param.name)) {
                warnings.push(format!(
                    "Parameter {} of table parameter {} not found",
                    param.name, self.name
                ));
            }
        }
        for inner in &self.inner_tables {
            for row in rows {
                inner.validate(row, warnings);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docreport_xml::parse;
    use pretty_assertions::assert_eq;

    fn names(params: &[ParameterSpec]) -> Vec<&str> {
        params.iter().map(|p| p.full_name.as_str()).collect()
    }

    fn row(pairs: &[(&str, ParamValue)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_parse_without_markers() {
        assert!(TableSection::parse_all("plain [Name] text").is_empty());
        assert!(TableSection::parse_all("<##Open but never closed").is_empty());
    }

    #[test]
    fn test_parse_flat_section() {
        let sections =
            TableSection::parse_all("Intro\n<##Items <#Name#> <#Price:N2#> <#Name#>\nItems##> end");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].name, "Items");
        assert_eq!(names(&sections[0].inner_params), vec!["Name", "Price:N2"]);
        assert_eq!(sections[0].inner_params[1].format_spec.as_deref(), Some("N2"));
        assert!(sections[0].inner_tables.is_empty());
    }

    #[test]
    fn test_parse_nested_sections_own_their_fields() {
        let text = "<##Orders <#Number#>\n<##Lines <#Product#> <#Qty#> Lines##>\n<#Total#> Orders##>\n\
                    <##Notes <#Text#> Notes##>";
        let sections = TableSection::parse_all(text);
        let section_names: Vec<&str> = sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(section_names, vec!["Orders", "Notes"]);

        let orders = &sections[0];
        assert_eq!(names(&orders.inner_params), vec!["Number", "Total"]);
        assert_eq!(orders.inner_tables.len(), 1);
        assert_eq!(orders.inner_tables[0].name, "Lines");
        assert_eq!(names(&orders.inner_tables[0].inner_params), vec!["Product", "Qty"]);
        assert_eq!(names(&sections[1].inner_params), vec!["Text"]);
    }

    #[test]
    fn test_parse_skips_hash_tokens_without_format() {
        let sections = TableSection::parse_all("<##T <#a#b#> <#n:#0#> T##>");
        assert_eq!(names(&sections[0].inner_params), vec!["n:#0"]);
    }

    #[test]
    fn test_parse_snapshot() {
        let sections = TableSection::parse_all("<##Rows <#Date:dd.MM.yyyy#> Rows##>");
        insta::assert_snapshot!(
            serde_json::to_string(&sections).unwrap(),
            @r#"[{"name":"Rows","inner_params":[{"name":"Date","full_name":"Date:dd.MM.yyyy","format_spec":"dd.MM.yyyy"}],"inner_tables":[]}]"#
        );
    }

    fn table_body() -> XmlElement {
        parse(
            "<w:body><w:p><w:r><w:t>Before</w:t></w:r></w:p>\
             <w:tbl>\
               <w:tr><w:tc><w:p><w:r><w:t>Name</w:t></w:r></w:p></w:tc></w:tr>\
               <w:tr><w:tc><w:p><w:r><w:t>&lt;##Items&lt;#Name#&gt;</w:t></w:r></w:p></w:tc>\
                     <w:tc><w:p><w:r><w:t>&lt;#Price:N2#&gt;</w:t></w:r></w:p></w:tc></w:tr>\
               <w:tr><w:tc><w:p><w:r><w:t>Items##&gt;</w:t></w:r></w:p></w:tc></w:tr>\
             </w:tbl></w:body>",
        )
        .unwrap()
        .root
    }

    fn row_texts(body: &XmlElement) -> Vec<String> {
        body.element_at(&[1])
            .unwrap()
            .elements()
            .map(|tr| tr.descendant_text("w:t"))
            .collect()
    }

    #[test]
    fn test_expand_copies_row_per_item() {
        let mut body = table_body();
        let section = &TableSection::parse_all(&crate::matcher::visible_text(&body))[0];
        let rows = vec![
            row(&[("Name", "Pen".into()), ("Price", 1.5.into())]),
            row(&[("Name", "Ink".into()), ("Price", 12.into())]),
        ];
        section.expand(&mut body, &rows, &ReportOptions::default());
        assert_eq!(row_texts(&body), vec!["Name", "Pen1.50", "Ink12.00"]);
    }

    #[test]
    fn test_expand_without_rows_removes_scaffold() {
        let mut body = table_body();
        let section = &TableSection::parse_all(&crate::matcher::visible_text(&body))[0];
        section.expand(&mut body, &[], &ReportOptions::default());
        assert_eq!(row_texts(&body), vec!["Name"]);
    }

    #[test]
    fn test_expand_across_paragraphs_keeps_trailing_text() {
        let mut body = parse(
            "<w:body><w:p><w:r><w:t>&lt;##Lines</w:t></w:r></w:p>\
             <w:p><w:r><w:t>- &lt;#Item#&gt;</w:t></w:r></w:p>\
             <w:p><w:r><w:t>Lines##&gt; Total</w:t></w:r></w:p>\
             <w:p><w:r><w:t>After</w:t></w:r></w:p></w:body>",
        )
        .unwrap()
        .root;
        let section = &TableSection::parse_all(&crate::matcher::visible_text(&body))[0];
        let rows = vec![row(&[("Item", "a".into())]), row(&[("Item", "b".into())])];
        section.expand(&mut body, &rows, &ReportOptions::default());

        let texts: Vec<String> = body.elements().map(|p| p.descendant_text("w:t")).collect();
        assert_eq!(texts, vec!["", "- a", "", "- b", " Total", "After"]);
    }

    #[test]
    fn test_missing_marker_is_a_no_op() {
        let mut body = table_body();
        let before = body.clone();
        let section = TableSection {
            name: "Other".to_string(),
            inner_params: Vec::new(),
            inner_tables: Vec::new(),
        };
        section.expand(&mut body, &[Row::new()], &ReportOptions::default());
        assert_eq!(body, before);
    }

    #[test]
    fn test_row_images_tag_the_placeholder_hyperlink() {
        let mut body = parse(
            "<w:body><w:p><w:r><w:t xml:space=\"preserve\">&lt;##Photos </w:t></w:r>\
             <w:hyperlink><w:r><w:t>imgTemplatePhoto</w:t></w:r></w:hyperlink>\
             <w:r><w:t xml:space=\"preserve\"> Photos##&gt;</w:t></w:r></w:p></w:body>",
        )
        .unwrap()
        .root;
        let section = &TableSection::parse_all(&crate::matcher::visible_text(&body))[0];
        let image = crate::value::ImageValue::new("/tmp/photo.png", 40, 30);
        let rows = vec![row(&[("imgTemplatePhoto", vec![image].into())])];
        section.expand(&mut body, &rows, &ReportOptions::default());

        let link = body
            .descendants()
            .find(|e| e.is("w:hyperlink"))
            .unwrap();
        assert_eq!(link.get_attribute("imgPath"), Some("/tmp/photo.png"));
        assert_eq!(link.get_attribute("imgWidth"), Some("40"));
        assert_eq!(link.get_attribute("imgHeight"), Some("30"));
    }

    #[test]
    fn test_validate_reports_missing_pieces() {
        let sections = TableSection::parse_all(
            "<##Orders <#Number#> <##Lines <#Product#> Lines##> Orders##>",
        );
        let orders = &sections[0];

        let mut warnings = Warnings::new();
        orders.validate(&Row::new(), &mut warnings);
        assert_eq!(warnings.to_string(), "Table parameter Orders not found; ");

        let lines = vec![row(&[("Sku", "x".into())])];
        let params = row(&[(
            "Orders",
            vec![
                row(&[("Number", 1.into()), ("Lines", lines.into())]),
                row(&[]),
            ]
            .into(),
        )]);
        let mut warnings = Warnings::new();
        orders.validate(&params, &mut warnings);
        assert_eq!(
            warnings.into_vec(),
            vec![
                "Parameter Number of table parameter Orders not found",
                "Parameter Product of table parameter Lines not found",
                "Table parameter Lines not found",
            ]
        );
    }

    #[test]
    fn test_validate_non_rows_value() {
        let section = &TableSection::parse_all("<##Items <#A#> Items##>")[0];
        let mut warnings = Warnings::new();
        section.validate(&row(&[("Items", "oops".into())]), &mut warnings);
        assert_eq!(
            warnings.into_vec(),
            vec!["Table parameter Items is not a list of rows"]
        );
    }
}
