/*
 * matcher.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Search and replace across run boundaries.
//!
//! Word splits paragraph text into runs wherever formatting, spell-check
//! state or editing history changes, so a placeholder such as `[Name]` is
//! often spread over several `w:r` elements. Replacement therefore works on
//! a flattened paragraph:
//!
//! 1. Every direct run holding text is split into one run per character,
//!    and one run per other content item (`w:br`, `w:tab`, ...), each with a
//!    copy of the original `w:rPr`.
//! 2. Matches are claimed left to right over those runs, greedy and
//!    non-overlapping.
//! 3. Each match collapses into one run carrying the formatting of its first
//!    character, optionally merged with override properties.
//! 4. Adjacent plain text runs with identical formatting are joined again.
//!
//! Paths into a tree are invalidated by every replace; callers search again
//! after each one.

use crate::container::Container;
use crate::error::{ReportError, ReportResult};
use docreport_xml::{NodePath, XmlChild, XmlElement};
use std::mem;

/// Run content that makes a run a single flattened item.
const SUB_RUN_CONTENT: &[&str] = &[
    "w:annotationRef",
    "w:br",
    "w:commentReference",
    "w:continuationSeparator",
    "w:cr",
    "w:dayLong",
    "w:dayShort",
    "w:delInstrText",
    "w:delText",
    "w:drawing",
    "w:endnoteRef",
    "w:endnoteReference",
    "w:fldChar",
    "w:footnoteRef",
    "w:footnoteReference",
    "w:instrText",
    "w:lastRenderedPageBreak",
    "w:monthLong",
    "w:monthShort",
    "w:noBreakHyphen",
    "w:object",
    "w:pgNum",
    "w:pict",
    "w:ptab",
    "w:separator",
    "w:softHyphen",
    "w:sym",
    "w:t",
    "w:tab",
    "w:yearLong",
    "w:yearShort",
    "mc:AlternateContent",
];

/// Child order of `w:rPr`; overrides are inserted at their schema position.
const RUN_PROPERTY_ORDER: &[&str] = &[
    "w:rStyle",
    "w:rFonts",
    "w:b",
    "w:bCs",
    "w:i",
    "w:iCs",
    "w:caps",
    "w:smallCaps",
    "w:strike",
    "w:dstrike",
    "w:outline",
    "w:shadow",
    "w:emboss",
    "w:imprint",
    "w:noProof",
    "w:snapToGrid",
    "w:vanish",
    "w:webHidden",
    "w:color",
    "w:spacing",
    "w:w",
    "w:kern",
    "w:position",
    "w:sz",
    "w:szCs",
    "w:highlight",
    "w:u",
    "w:effect",
    "w:bdr",
    "w:shd",
    "w:fitText",
    "w:vertAlign",
    "w:rtl",
    "w:cs",
    "w:em",
    "w:lang",
    "w:eastAsianLayout",
    "w:specVanish",
    "w:oMath",
    "w:rPrChange",
];

/// One search/replace pair with its matching rules.
#[derive(Debug, Clone, Copy)]
pub struct TextReplacer<'a> {
    search: &'a str,
    replace: &'a str,
    match_case: bool,
    run_properties: Option<&'a XmlElement>,
}

impl<'a> TextReplacer<'a> {
    /// A case-insensitive replacer without formatting override.
    pub fn new(search: &'a str, replace: &'a str) -> Self {
        Self {
            search,
            replace,
            match_case: false,
            run_properties: None,
        }
    }

    pub fn match_case(mut self, match_case: bool) -> Self {
        self.match_case = match_case;
        self
    }

    /// Merge these `w:rPr` children into each replacement run.
    pub fn with_run_properties(mut self, run_properties: &'a XmlElement) -> Self {
        self.run_properties = Some(run_properties);
        self
    }

    /// Replace in every paragraph of `root` (which may itself be one).
    /// Returns the number of matches replaced.
    pub fn apply(&self, root: &mut XmlElement) -> usize {
        if self.search.is_empty() {
            return 0;
        }
        if root.is("w:p") {
            return self.replace_in_paragraph(root);
        }
        root.elements_mut().map(|child| self.apply(child)).sum()
    }

    /// Replace within one paragraph.
    ///
    /// A paragraph whose text does not contain the search string is left
    /// untouched.
    pub fn replace_in_paragraph(&self, paragraph: &mut XmlElement) -> usize {
        if self.search.is_empty()
            || !text_contains(&paragraph.descendant_text("w:t"), self.search, self.match_case)
        {
            return 0;
        }

        // Paragraphs nested in text boxes or content controls are handled on
        // their own.
        let mut nested = 0;
        for child in paragraph.elements_mut() {
            if !is_text_run(child) {
                nested += self.apply(child);
            }
        }

        let items = flatten_children(mem::take(&mut paragraph.children));
        let (claims, count) = self.claim_matches(&items);

        let mut first_seen = vec![false; count];
        let mut rebuilt = Vec::with_capacity(items.len());
        for (item, claim) in items.into_iter().zip(&claims) {
            match claim {
                Some(id) if !first_seen[*id] => {
                    first_seen[*id] = true;
                    rebuilt.push(self.replacement_run(item.as_element()).into());
                }
                Some(_) => {}
                None => rebuilt.push(item),
            }
        }
        paragraph.children = consolidate(rebuilt);

        if count > 0 {
            tracing::trace!(search = self.search, count, "Replaced in paragraph");
        }
        nested + count
    }

    /// Match ids aligned with `items` (`None` for unclaimed items) and the
    /// number of matches.
    fn claim_matches(&self, items: &[XmlChild]) -> (Vec<Option<usize>>, usize) {
        let search: Vec<char> = self.search.chars().collect();
        let sequence: Vec<(usize, Option<char>)> = items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| {
                let run = item.as_element().filter(|e| is_sub_run(e))?;
                Some((index, single_char(run)))
            })
            .collect();

        let mut claims = vec![None; items.len()];
        let mut next_id = 0;
        let width = search.len();
        let mut start = 0;
        while start + width <= sequence.len() {
            let window = &sequence[start..start + width];
            let hit = window.iter().zip(&search).all(|((index, c), wanted)| {
                claims[*index].is_none()
                    && c.is_some_and(|c| chars_equal(c, *wanted, self.match_case))
            });
            if hit {
                for (index, _) in window {
                    claims[*index] = Some(next_id);
                }
                next_id += 1;
                start += width;
            } else {
                start += 1;
            }
        }
        (claims, next_id)
    }

    fn replacement_run(&self, first: Option<&XmlElement>) -> XmlElement {
        let mut properties = first.and_then(|run| run.child("w:rPr")).cloned();
        if let Some(overrides) = self.run_properties {
            let target = properties.get_or_insert_with(|| XmlElement::new("w:rPr"));
            merge_run_properties(target, overrides);
        }

        let mut run = XmlElement::new("w:r");
        if let Some(properties) = properties {
            run.children.push(properties.into());
        }
        for (index, line) in self.replace.split('\n').enumerate() {
            if index > 0 {
                run.children.push(XmlElement::new("w:br").into());
            }
            let line = line.strip_suffix('\r').unwrap_or(line);
            run.children.push(text_element(line).into());
        }
        run
    }
}

/// Path of the first `kind` element (pre-order) whose `w:t` text contains
/// `search`.
pub fn find_first(
    root: &XmlElement,
    search: &str,
    kind: &str,
    match_case: bool,
) -> Option<NodePath> {
    root.find_path(|e| e.is(kind) && text_contains(&e.descendant_text("w:t"), search, match_case))
}

/// Substring test under the matcher's case rule.
pub fn text_contains(haystack: &str, needle: &str, match_case: bool) -> bool {
    if match_case {
        haystack.contains(needle)
    } else {
        haystack.to_uppercase().contains(&needle.to_uppercase())
    }
}

/// Text of the paragraph's own runs. Paragraphs nested in text boxes or
/// content controls do not contribute.
pub fn own_text(paragraph: &XmlElement) -> String {
    paragraph
        .elements()
        .filter(|e| e.is("w:r"))
        .flat_map(|run| run.elements().filter(|e| e.is("w:t")))
        .map(XmlElement::text)
        .collect()
}

/// Text of the outermost paragraphs under `root`, one line per paragraph.
pub fn visible_text(root: &XmlElement) -> String {
    root.find_all_paths(|e| e.is("w:p"))
        .iter()
        .filter_map(|path| root.element_at(path))
        .map(|p| p.descendant_text("w:t"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Apply ordered pairs to every paragraph of every text part.
///
/// All pairs are applied to one paragraph before moving to the next. Fails
/// before touching anything when the document tracks revisions.
pub fn replace_in_document<C: Container>(
    container: &mut C,
    pairs: &[(String, String)],
    match_case: bool,
    run_properties: Option<&XmlElement>,
) -> ReportResult<usize> {
    if container.has_revision_tracking() {
        return Err(ReportError::RevisionTracking);
    }
    let replacers: Vec<TextReplacer<'_>> = pairs
        .iter()
        .filter(|(search, _)| !search.is_empty())
        .map(|(search, replace)| {
            let replacer = TextReplacer::new(search, replace).match_case(match_case);
            match run_properties {
                Some(properties) => replacer.with_run_properties(properties),
                None => replacer,
            }
        })
        .collect();
    if replacers.is_empty() {
        return Ok(0);
    }

    let mut count = 0;
    for part in container.text_parts() {
        let root = container
            .part_root_mut(&part)
            .ok_or_else(|| ReportError::MissingPart(part.clone()))?;
        count += replace_batch(root, &replacers);
    }
    Ok(count)
}

fn replace_batch(element: &mut XmlElement, replacers: &[TextReplacer<'_>]) -> usize {
    if element.is("w:p") {
        return replacers
            .iter()
            .map(|replacer| replacer.replace_in_paragraph(element))
            .sum();
    }
    element
        .elements_mut()
        .map(|child| replace_batch(child, replacers))
        .sum()
}

/// Merge override properties into `target`: same-named children are
/// replaced, new ones inserted in schema order.
pub fn merge_run_properties(target: &mut XmlElement, overrides: &XmlElement) {
    for property in overrides.elements() {
        target
            .children
            .retain(|c| !c.as_element().is_some_and(|e| e.is(&property.qualified_name())));
        let rank = property_rank(property);
        let position = target
            .children
            .iter()
            .position(|c| c.as_element().is_some_and(|e| property_rank(e) > rank))
            .unwrap_or(target.children.len());
        target.children.insert(position, property.clone().into());
    }
}

fn property_rank(element: &XmlElement) -> usize {
    RUN_PROPERTY_ORDER
        .iter()
        .position(|name| element.is(name))
        .unwrap_or(RUN_PROPERTY_ORDER.len())
}

fn is_text_run(element: &XmlElement) -> bool {
    element.is("w:r") && element.child("w:t").is_some()
}

fn is_sub_run(element: &XmlElement) -> bool {
    element.is("w:r")
        && element
            .elements()
            .find(|e| !e.is("w:rPr"))
            .is_some_and(|content| SUB_RUN_CONTENT.iter().any(|name| content.is(name)))
}

/// The character of a flattened one-character text run.
fn single_char(run: &XmlElement) -> Option<char> {
    let content = run.elements().find(|e| !e.is("w:rPr"))?;
    if !content.is("w:t") {
        return None;
    }
    let text = content.text();
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

fn chars_equal(a: char, b: char, match_case: bool) -> bool {
    a == b || (!match_case && a.to_uppercase().eq(b.to_uppercase()))
}

/// Split text runs into per-character runs; other children pass through.
fn flatten_children(children: Vec<XmlChild>) -> Vec<XmlChild> {
    let mut items = Vec::with_capacity(children.len());
    for child in children {
        match child {
            XmlChild::Element(run) if is_text_run(&run) => {
                let properties = run.child("w:rPr").cloned();
                for content in run.elements().filter(|e| !e.is("w:rPr")) {
                    if content.is("w:t") {
                        for c in content.text().chars() {
                            let mut t = XmlElement::new("w:t");
                            if c == ' ' {
                                t.set_attribute("xml:space", "preserve");
                            }
                            let t = t.with_text(c.to_string());
                            items.push(single_item_run(properties.as_ref(), t).into());
                        }
                    } else {
                        items.push(single_item_run(properties.as_ref(), content.clone()).into());
                    }
                }
            }
            other => items.push(other),
        }
    }
    items
}

fn single_item_run(properties: Option<&XmlElement>, content: XmlElement) -> XmlElement {
    let mut run = XmlElement::new("w:r");
    if let Some(properties) = properties {
        run.children.push(properties.clone().into());
    }
    run.with_child(content)
}

/// Properties and text of a run holding exactly one `w:t`.
fn simple_text_run(child: &XmlChild) -> Option<(Option<XmlElement>, String)> {
    let run = child.as_element().filter(|e| e.is("w:r"))?;
    let mut content = run.elements().filter(|e| !e.is("w:rPr"));
    let t = content.next().filter(|e| e.is("w:t"))?;
    if content.next().is_some() {
        return None;
    }
    Some((run.child("w:rPr").cloned(), t.text()))
}

/// Join adjacent plain text runs with identical properties.
fn consolidate(children: Vec<XmlChild>) -> Vec<XmlChild> {
    let mut out = Vec::with_capacity(children.len());
    let mut pending: Option<(Option<XmlElement>, String)> = None;
    for child in children {
        let Some((properties, text)) = simple_text_run(&child) else {
            flush_run(&mut out, pending.take());
            out.push(child);
            continue;
        };
        match &mut pending {
            Some((open, buffer)) if *open == properties => buffer.push_str(&text),
            _ => {
                flush_run(&mut out, pending.take());
                pending = Some((properties, text));
            }
        }
    }
    flush_run(&mut out, pending);
    out
}

fn flush_run(out: &mut Vec<XmlChild>, pending: Option<(Option<XmlElement>, String)>) {
    if let Some((properties, text)) = pending {
        out.push(single_item_run(properties.as_ref(), text_element(&text)).into());
    }
}

/// `w:t` holding `text`, whitespace-preserving when the text is padded.
pub(crate) fn text_element(text: &str) -> XmlElement {
    let padded = text.starts_with(' ') || (text.chars().count() > 1 && text.ends_with(' '));
    let mut t = XmlElement::new("w:t");
    if padded {
        t.set_attribute("xml:space", "preserve");
    }
    if text.is_empty() { t } else { t.with_text(text) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docreport_xml::parse;
    use pretty_assertions::assert_eq;

    fn paragraph(xml: &str) -> XmlElement {
        parse(xml).unwrap().root
    }

    fn texts(paragraph: &XmlElement) -> Vec<String> {
        paragraph
            .elements()
            .filter(|e| e.is("w:r"))
            .map(|r| r.descendant_text("w:t"))
            .collect()
    }

    #[test]
    fn test_replace_across_runs_keeps_first_char_formatting() {
        let mut p = paragraph(
            "<w:p><w:r><w:t>Dear </w:t></w:r>\
             <w:r><w:rPr><w:b/></w:rPr><w:t>[Na</w:t></w:r>\
             <w:r><w:rPr><w:i/></w:rPr><w:t>me],</w:t></w:r></w:p>",
        );
        let count = TextReplacer::new("[Name]", "Ada").apply(&mut p);
        assert_eq!(count, 1);
        insta::assert_snapshot!(
            p.to_xml_string().unwrap(),
            @r#"<w:p><w:r><w:t xml:space="preserve">Dear </w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>Ada</w:t></w:r><w:r><w:rPr><w:i/></w:rPr><w:t>,</w:t></w:r></w:p>"#
        );
    }

    #[test]
    fn test_paragraph_without_match_is_unchanged() {
        let source = "<w:p w:rsidR=\"00A1\"><w:r w:rsidR=\"00A1\"><w:t>Nothing</w:t></w:r>\
                      <w:r><w:t xml:space=\"preserve\"> here</w:t></w:r></w:p>";
        let mut p = paragraph(source);
        let before = p.clone();
        assert_eq!(TextReplacer::new("[Name]", "x").apply(&mut p), 0);
        assert_eq!(p, before);
    }

    #[test]
    fn test_matches_are_greedy_and_non_overlapping() {
        let mut p = paragraph("<w:p><w:r><w:t>aaaaa</w:t></w:r></w:p>");
        assert_eq!(TextReplacer::new("aa", "b").apply(&mut p), 2);
        assert_eq!(texts(&p), vec!["bba"]);
    }

    #[test]
    fn test_case_rule() {
        let mut p = paragraph("<w:p><w:r><w:t>[NAME] [name]</w:t></w:r></w:p>");
        let count = TextReplacer::new("[Name]", "x").match_case(true).apply(&mut p);
        assert_eq!(count, 0);
        let count = TextReplacer::new("[Name]", "x").apply(&mut p);
        assert_eq!(count, 2);
        assert_eq!(texts(&p), vec!["x x"]);
    }

    #[test]
    fn test_multiline_replacement_uses_breaks() {
        let mut p = paragraph("<w:p><w:r><w:t>[Address]</w:t></w:r></w:p>");
        TextReplacer::new("[Address]", "1 Main St\r\nSpringfield").apply(&mut p);
        insta::assert_snapshot!(
            p.to_xml_string().unwrap(),
            @"<w:p><w:r><w:t>1 Main St</w:t><w:br/><w:t>Springfield</w:t></w:r></w:p>"
        );
    }

    #[test]
    fn test_non_text_items_stay_in_place() {
        let mut p = paragraph("<w:p><w:r><w:t>a</w:t><w:tab/><w:t>[X]</w:t></w:r></w:p>");
        TextReplacer::new("[X]", "b").apply(&mut p);
        insta::assert_snapshot!(
            p.to_xml_string().unwrap(),
            @"<w:p><w:r><w:t>a</w:t></w:r><w:r><w:tab/></w:r><w:r><w:t>b</w:t></w:r></w:p>"
        );
    }

    #[test]
    fn test_match_spans_bookmark_between_runs() {
        let mut p = paragraph(
            "<w:p><w:r><w:t>[Na</w:t></w:r><w:bookmarkStart w:id=\"0\" w:name=\"x\"/>\
             <w:r><w:t>me]</w:t></w:r></w:p>",
        );
        assert_eq!(TextReplacer::new("[Name]", "Bob").apply(&mut p), 1);
        insta::assert_snapshot!(
            p.to_xml_string().unwrap(),
            @r#"<w:p><w:r><w:t>Bob</w:t></w:r><w:bookmarkStart w:id="0" w:name="x"/></w:p>"#
        );
    }

    #[test]
    fn test_override_is_merged_in_schema_order() {
        let mut p = paragraph(
            "<w:p><w:r><w:rPr><w:b w:val=\"false\"/><w:sz w:val=\"20\"/></w:rPr>\
             <w:t>&lt;b&gt;Hi&lt;/b&gt;</w:t></w:r></w:p>",
        );
        let bold = XmlElement::new("w:rPr")
            .with_child(XmlElement::new("w:color").with_attribute("w:val", "FF0000"))
            .with_child(XmlElement::new("w:b"));
        TextReplacer::new("<b>Hi</b>", "Hi")
            .match_case(true)
            .with_run_properties(&bold)
            .apply(&mut p);
        insta::assert_snapshot!(
            p.to_xml_string().unwrap(),
            @r#"<w:p><w:r><w:rPr><w:b/><w:color w:val="FF0000"/><w:sz w:val="20"/></w:rPr><w:t>Hi</w:t></w:r></w:p>"#
        );
    }

    #[test]
    fn test_override_creates_missing_properties() {
        let mut p = paragraph("<w:p><w:r><w:t>x</w:t></w:r></w:p>");
        let italic = XmlElement::new("w:rPr").with_child(XmlElement::new("w:i"));
        TextReplacer::new("x", "y").with_run_properties(&italic).apply(&mut p);
        assert_eq!(
            p.to_xml_string().unwrap(),
            "<w:p><w:r><w:rPr><w:i/></w:rPr><w:t>y</w:t></w:r></w:p>"
        );
    }

    #[test]
    fn test_paragraph_attributes_and_properties_survive() {
        let mut p = paragraph(
            "<w:p w:rsidR=\"1\"><w:pPr><w:jc w:val=\"center\"/></w:pPr><w:r><w:t>[A]</w:t></w:r></w:p>",
        );
        TextReplacer::new("[A]", "z").apply(&mut p);
        assert_eq!(p.get_attribute("w:rsidR"), Some("1"));
        assert!(p.child("w:pPr").is_some());
    }

    #[test]
    fn test_find_first_returns_path() {
        let body = parse(
            "<w:body><w:p><w:r><w:t>intro</w:t></w:r></w:p>\
             <w:tbl><w:tr><w:tc><w:p><w:r><w:t>&lt;##Items</w:t></w:r></w:p></w:tc></w:tr></w:tbl></w:body>",
        )
        .unwrap()
        .root;
        assert_eq!(find_first(&body, "<##items", "w:p", false), Some(vec![1, 0, 0, 0]));
        assert_eq!(find_first(&body, "<##items", "w:p", true), None);
        assert_eq!(find_first(&body, "<##Items", "w:tr", true), Some(vec![1, 0]));
    }

    #[test]
    fn test_visible_text_joins_paragraphs() {
        let body = parse(
            "<w:body><w:p><w:r><w:t>one</w:t></w:r></w:p><w:p/>\
             <w:tbl><w:tr><w:tc><w:p><w:r><w:t>two</w:t></w:r></w:p></w:tc></w:tr></w:tbl></w:body>",
        )
        .unwrap()
        .root;
        assert_eq!(visible_text(&body), "one\n\ntwo");
    }

    #[test]
    fn test_consolidate_marks_padded_text() {
        let children = vec![
            single_item_run(None, text_element(" ")).into(),
            single_item_run(None, text_element("a")).into(),
        ];
        let merged = consolidate(children);
        assert_eq!(merged.len(), 1);
        assert_eq!(
            merged[0].as_element().unwrap().to_xml_string().unwrap(),
            r#"<w:r><w:t xml:space="preserve"> a</w:t></w:r>"#
        );
    }
}
