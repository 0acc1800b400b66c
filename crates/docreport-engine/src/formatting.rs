/*
 * formatting.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Inline formatting tags in substituted text.
//!
//! Parameter values may carry pseudo-tags that take effect once the
//! document is otherwise finished:
//!
//! | Tag | Effect |
//! |---|---|
//! | `<b>…</b>` | bold |
//! | `<nb>…</nb>` | explicitly not bold |
//! | `<red>…</red>` | red text |
//! | `<sN>…</sN>` | font size N points |
//! | `<i>…</i>` | italic |
//! | `<Pr>…</Pr>` | payload becomes its own paragraph(s), one per `<p>…</p>` |
//! | `<d>…</d>` | empty payload deletes the paragraph |
//!
//! Inline tags are applied through the regular replace, so a tag may span
//! runs. Tags never span paragraphs.

use crate::container::Container;
use crate::error::ReportResult;
use crate::matcher::{TextReplacer, own_text, replace_in_document, text_element, visible_text};
use docreport_xml::{XmlChild, XmlElement};
use once_cell::sync::Lazy;
use regex::Regex;

static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"<b>(.*?)</b>").unwrap());
static NON_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"<nb>(.*?)</nb>").unwrap());
static RED: Lazy<Regex> = Lazy::new(|| Regex::new(r"<red>(.*?)</red>").unwrap());
static ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"<i>(.*?)</i>").unwrap());
static SIZE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<s(\d+)>").unwrap());
static PARAGRAPH: Lazy<Regex> = Lazy::new(|| Regex::new(r"<Pr>(.*?)</Pr>").unwrap());
static SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"<p>(.*?)</p>").unwrap());
static DELETE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<d>(.*?)</d>").unwrap());

/// Apply every formatting tag found in the document's text parts.
pub fn apply_formatting_tags<C: Container>(container: &mut C) -> ReportResult<()> {
    let parts = container.text_parts();
    let text: String = parts
        .iter()
        .filter_map(|part| container.part_root(part))
        .map(|root| visible_text(root) + "\n")
        .collect();

    let families = [
        ("b", payloads(&BOLD, &text), run_properties([XmlElement::new("w:b")])),
        (
            "nb",
            payloads(&NON_BOLD, &text),
            run_properties([XmlElement::new("w:b").with_attribute("w:val", "false")]),
        ),
        (
            "red",
            payloads(&RED, &text),
            run_properties([XmlElement::new("w:color").with_attribute("w:val", "FF0000")]),
        ),
    ];
    for (tag, found, properties) in &families {
        apply_inline(container, tag, found, properties)?;
    }

    for (size, found) in size_tags(&text) {
        let Some(half_points) = size
            .parse::<u32>()
            .ok()
            .and_then(|points| points.checked_mul(2))
            .map(|half| half.to_string())
        else {
            tracing::debug!(size = %size, "Font size out of range");
            continue;
        };
        let properties = run_properties([
            XmlElement::new("w:sz").with_attribute("w:val", half_points.as_str()),
            XmlElement::new("w:szCs").with_attribute("w:val", half_points.as_str()),
        ]);
        apply_inline(container, &format!("s{size}"), &found, &properties)?;
    }

    let italic = payloads(&ITALIC, &text);
    apply_inline(container, "i", &italic, &run_properties([XmlElement::new("w:i")]))?;

    for part in &parts {
        if let Some(root) = container.part_root_mut(part) {
            let split = split_paragraph_tags(root);
            let deleted = apply_delete_tags(root);
            if split + deleted > 0 {
                tracing::debug!(part = %part, split, deleted, "Applied paragraph tags");
            }
        }
    }
    Ok(())
}

fn run_properties<const N: usize>(properties: [XmlElement; N]) -> XmlElement {
    properties
        .into_iter()
        .fold(XmlElement::new("w:rPr"), XmlElement::with_child)
}

/// Distinct payloads of one tag family, in order of appearance.
fn payloads(pattern: &Regex, text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for captures in pattern.captures_iter(text) {
        let payload = captures[1].to_string();
        if !found.contains(&payload) {
            found.push(payload);
        }
    }
    found
}

/// `<sN>…</sN>` payloads grouped by size. The closing tag must carry the
/// same number and sit on the same line.
fn size_tags(text: &str) -> Vec<(String, Vec<String>)> {
    let mut sizes: Vec<(String, Vec<String>)> = Vec::new();
    let mut cursor = 0;
    while let Some(captures) = SIZE_OPEN.captures_at(text, cursor) {
        let (Some(open), Some(size)) = (captures.get(0), captures.get(1)) else {
            break;
        };
        cursor = open.end();
        let closer = format!("</s{}>", size.as_str());
        let line_end = text[open.end()..]
            .find('\n')
            .map_or(text.len(), |i| open.end() + i);
        let Some(close) = text[open.end()..line_end].find(&closer) else {
            continue;
        };
        let payload = text[open.end()..open.end() + close].to_string();
        cursor = open.end() + close + closer.len();

        match sizes.iter_mut().find(|(s, _)| s == size.as_str()) {
            Some((_, found)) if found.contains(&payload) => {}
            Some((_, found)) => found.push(payload),
            None => sizes.push((size.as_str().to_string(), vec![payload])),
        }
    }
    sizes
}

fn apply_inline<C: Container>(
    container: &mut C,
    tag: &str,
    found: &[String],
    properties: &XmlElement,
) -> ReportResult<()> {
    if found.is_empty() {
        return Ok(());
    }
    let pairs: Vec<(String, String)> = found
        .iter()
        .map(|payload| (format!("<{tag}>{payload}</{tag}>"), payload.clone()))
        .collect();
    let count = replace_in_document(container, &pairs, true, Some(properties))?;
    tracing::trace!(tag, count, "Applied formatting tag");
    Ok(())
}

/// Replace each paragraph holding `<Pr>…</Pr>` by the paragraphs of its
/// payload.
fn split_paragraph_tags(root: &mut XmlElement) -> usize {
    let mut count = 0;
    while let Some(path) =
        root.find_path(|e| e.is("w:p") && PARAGRAPH.is_match(&own_text(e)))
    {
        let Some((&index, parent_path)) = path.split_last() else {
            break;
        };
        let Some(host) = root.element_at(&path) else {
            break;
        };
        let text = own_text(host);
        let payload = PARAGRAPH
            .captures(&text)
            .and_then(|c| c.get(1))
            .map_or("", |m| m.as_str());
        let mut segments: Vec<&str> = SEGMENT
            .captures_iter(payload)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
            .collect();
        if segments.is_empty() {
            segments.push(payload);
        }

        let paragraph_properties = host.child("w:pPr");
        let first_run_properties = host.child("w:r").and_then(|r| r.child("w:rPr"));
        let replacements: Vec<XmlChild> = segments
            .iter()
            .map(|segment| {
                let mut run = XmlElement::new("w:r");
                if let Some(properties) = first_run_properties {
                    run.children.push(properties.clone().into());
                }
                let mut paragraph = XmlElement::new("w:p");
                if let Some(properties) = paragraph_properties {
                    paragraph.children.push(properties.clone().into());
                }
                paragraph.with_child(run.with_child(text_element(segment))).into()
            })
            .collect();

        let Some(parent) = root.element_at_mut(parent_path) else {
            break;
        };
        parent.children.splice(index..=index, replacements);
        count += 1;
    }
    count
}

/// Delete paragraphs holding an empty `<d></d>`; unwrap non-empty ones.
fn apply_delete_tags(root: &mut XmlElement) -> usize {
    let mut count = 0;
    let mut skipped = 0;
    loop {
        let paths =
            root.find_all_paths(|e| e.is("w:p") && DELETE.is_match(&own_text(e)));
        let Some(path) = paths.into_iter().nth(skipped) else {
            break;
        };
        let Some((&index, parent_path)) = path.split_last() else {
            break;
        };
        let Some(text) = root.element_at(&path).map(own_text) else {
            break;
        };
        let payload = DELETE
            .captures(&text)
            .and_then(|c| c.get(1))
            .map_or(String::new(), |m| m.as_str().to_string());

        if payload.trim().is_empty() {
            let Some(parent) = root.element_at_mut(parent_path) else {
                break;
            };
            // A cell must keep one paragraph.
            let last_in_cell =
                parent.is("w:tc") && parent.elements().filter(|e| e.is("w:p")).count() == 1;
            if last_in_cell {
                if let Some(paragraph) = parent.children.get_mut(index).and_then(XmlChild::as_element_mut) {
                    paragraph
                        .children
                        .retain(|c| c.as_element().is_some_and(|e| e.is("w:pPr")));
                }
            } else {
                parent.children.remove(index);
            }
        } else {
            let literal = format!("<d>{payload}</d>");
            let replaced = root.element_at_mut(&path).map_or(0, |paragraph| {
                TextReplacer::new(&literal, &payload)
                    .match_case(true)
                    .apply(paragraph)
            });
            if replaced == 0 {
                skipped += 1;
                continue;
            }
        }
        count += 1;
    }
    count
}
