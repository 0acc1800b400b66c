/*
 * images.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Pictures bound to image anchors.
//!
//! Two kinds of anchors exist. Bookmarks named `imgTemplate<Name>` are found
//! when the template is loaded and take the images supplied under `<Name>`.
//! Hyperlinks whose text starts with `imgTemplate` are produced by table
//! expansion, which records the row's image in `imgPath`, `imgWidth` and
//! `imgHeight` attributes; each is replaced by its picture.

use crate::container::Container;
use crate::error::{ReportError, ReportResult};
use crate::options::ReportOptions;
use crate::value::{ImageValue, Parameters};
use crate::warnings::Warnings;
use docreport_xml::XmlElement;
use image::ImageFormat;
use serde::Serialize;
use std::fs;

const WP_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const A_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const PIC_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const LOCAL_DPI_EXTENSION: &str = "{28A0092B-C50C-407E-A947-70E740481C1C}";

/// A bookmark that receives pictures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageAnchor {
    /// Parameter key: the bookmark name without the image prefix.
    pub name: String,
    /// The bookmark name.
    pub full_name: String,
}

/// Bookmarks under `root` whose names start with `prefix`, in document
/// order, without repeats.
pub fn collect_bookmark_anchors(root: &XmlElement, prefix: &str) -> Vec<ImageAnchor> {
    let mut anchors: Vec<ImageAnchor> = Vec::new();
    for bookmark in root.descendants().filter(|e| e.is("w:bookmarkStart")) {
        let Some(full_name) = bookmark.get_attribute("w:name") else {
            continue;
        };
        let Some(name) = full_name.strip_prefix(prefix) else {
            continue;
        };
        if anchors.iter().all(|a| a.full_name != full_name) {
            anchors.push(ImageAnchor {
                name: name.to_string(),
                full_name: full_name.to_string(),
            });
        }
    }
    anchors
}

/// Insert the pictures supplied for each bookmark anchor after the
/// bookmark's enclosing element, in the order given.
pub(crate) fn bind_bookmark_images<C: Container>(
    container: &mut C,
    anchors: &[ImageAnchor],
    params: &Parameters,
    options: &ReportOptions,
    warnings: &mut Warnings,
) -> ReportResult<()> {
    let main = container.main_part();
    for anchor in anchors {
        let Some(value) = params.get(&anchor.name) else {
            continue;
        };
        let Some(images) = value.as_images() else {
            warnings.push(format!("Parameter {} is not a list of images", anchor.name));
            continue;
        };

        let root = container
            .part_root(&main)
            .ok_or_else(|| ReportError::MissingPart(main.clone()))?;
        let found = root.find_path(|e| {
            e.is("w:bookmarkStart") && e.get_attribute("w:name") == Some(anchor.full_name.as_str())
        });
        let Some(mut host) = found.filter(|path| path.len() >= 2) else {
            continue;
        };
        host.pop();

        for (offset, image) in images.iter().enumerate() {
            let rel_id = embed(container, image, options)?;
            let root = container
                .part_root_mut(&main)
                .ok_or_else(|| ReportError::MissingPart(main.clone()))?;
            let paragraph =
                image_paragraph(&anchor.full_name, image, &rel_id, next_drawing_id(root), options);
            let mut at = host.clone();
            if let Some(last) = at.last_mut() {
                *last += 1 + offset;
            }
            root.insert_at(&at, paragraph.into());
        }
        tracing::debug!(anchor = %anchor.full_name, images = images.len(), "Bound bookmark images");
    }
    Ok(())
}

/// Replace every placeholder hyperlink in the main part by its picture.
///
/// Hyperlinks with an empty or missing `imgPath` are left alone. Once a
/// path is present, missing or unreadable geometry is an error.
pub(crate) fn bind_placeholder_images<C: Container>(
    container: &mut C,
    options: &ReportOptions,
) -> ReportResult<()> {
    let main = container.main_part();
    let mut skipped = 0;
    loop {
        let root = container
            .part_root(&main)
            .ok_or_else(|| ReportError::MissingPart(main.clone()))?;
        let links = root.find_all_paths(|e| {
            e.is("w:hyperlink") && e.descendant_text("w:t").starts_with(&options.image_prefix)
        });
        let Some(path) = links.into_iter().nth(skipped) else {
            break;
        };
        let Some(link) = root.element_at(&path) else {
            break;
        };

        let anchor = link.descendant_text("w:t");
        let image_path = link.get_attribute("imgPath").unwrap_or_default().to_string();
        if image_path.is_empty() {
            skipped += 1;
            continue;
        }
        let width = placeholder_dimension(link, &anchor, "imgWidth")?;
        let height = placeholder_dimension(link, &anchor, "imgHeight")?;
        let image = ImageValue::new(image_path, width, height);

        let rel_id = embed(container, &image, options)?;
        let root = container
            .part_root_mut(&main)
            .ok_or_else(|| ReportError::MissingPart(main.clone()))?;
        let paragraph = image_paragraph(&anchor, &image, &rel_id, next_drawing_id(root), options);

        let mut after = if path.len() >= 2 {
            path[..path.len() - 1].to_vec()
        } else {
            path.clone()
        };
        if let Some(last) = after.last_mut() {
            *last += 1;
        }
        root.insert_at(&after, paragraph.into());
        root.remove_at(&path);
        tracing::debug!(anchor = %anchor, "Bound placeholder image");
    }
    Ok(())
}

fn placeholder_attribute(link: &XmlElement, anchor: &str, name: &str) -> ReportResult<String> {
    link.get_attribute(name)
        .map(str::to_string)
        .ok_or_else(|| ReportError::ImageAnchor {
            anchor: anchor.to_string(),
            message: format!("missing {name} attribute"),
        })
}

fn placeholder_dimension(link: &XmlElement, anchor: &str, name: &str) -> ReportResult<u32> {
    let raw = placeholder_attribute(link, anchor, name)?;
    raw.trim().parse().map_err(|_| ReportError::ImageAnchor {
        anchor: anchor.to_string(),
        message: format!("{name} is not a pixel count: '{raw}'"),
    })
}

/// Store the picture in the container and return its relationship id.
fn embed<C: Container>(
    container: &mut C,
    image: &ImageValue,
    options: &ReportOptions,
) -> ReportResult<String> {
    let data = fs::read(&image.path).map_err(|source| ReportError::ImageRead {
        path: image.path.clone(),
        source,
    })?;
    let format = image::guess_format(&data)
        .or_else(|_| ImageFormat::from_path(&image.path))
        .unwrap_or(ImageFormat::Jpeg);
    let rel_id = container.add_image_part(data, format)?;

    if options.delete_consumed_images
        && let Err(err) = fs::remove_file(&image.path)
    {
        tracing::warn!(path = %image.path.display(), error = %err, "Could not delete embedded image");
    }
    Ok(rel_id)
}

/// One past the largest drawing id in use.
fn next_drawing_id(root: &XmlElement) -> u32 {
    root.descendants()
        .filter(|e| e.is("wp:docPr"))
        .filter_map(|e| e.get_attribute("id")?.parse::<u32>().ok())
        .max()
        .unwrap_or(0)
        + 1
}

/// A paragraph holding one inline picture.
fn image_paragraph(
    name: &str,
    image: &ImageValue,
    rel_id: &str,
    drawing_id: u32,
    options: &ReportOptions,
) -> XmlElement {
    let cx = (i64::from(image.width) * options.emu_per_pixel).to_string();
    let cy = (i64::from(image.height) * options.emu_per_pixel).to_string();

    let picture = XmlElement::new("pic:pic")
        .with_attribute("xmlns:pic", PIC_NS)
        .with_child(
            XmlElement::new("pic:nvPicPr")
                .with_child(
                    XmlElement::new("pic:cNvPr")
                        .with_attribute("id", "0")
                        .with_attribute("name", name),
                )
                .with_child(XmlElement::new("pic:cNvPicPr")),
        )
        .with_child(
            XmlElement::new("pic:blipFill")
                .with_child(
                    XmlElement::new("a:blip")
                        .with_attribute("xmlns:r", R_NS)
                        .with_attribute("r:embed", rel_id)
                        .with_attribute("cstate", "print")
                        .with_child(XmlElement::new("a:extLst").with_child(
                            XmlElement::new("a:ext").with_attribute("uri", LOCAL_DPI_EXTENSION),
                        )),
                )
                .with_child(XmlElement::new("a:stretch").with_child(XmlElement::new("a:fillRect"))),
        )
        .with_child(
            XmlElement::new("pic:spPr")
                .with_child(
                    XmlElement::new("a:xfrm")
                        .with_child(
                            XmlElement::new("a:off")
                                .with_attribute("x", "0")
                                .with_attribute("y", "0"),
                        )
                        .with_child(
                            XmlElement::new("a:ext")
                                .with_attribute("cx", cx.as_str())
                                .with_attribute("cy", cy.as_str()),
                        ),
                )
                .with_child(
                    XmlElement::new("a:prstGeom")
                        .with_attribute("prst", "rect")
                        .with_child(XmlElement::new("a:avLst")),
                ),
        );

    let inline = XmlElement::new("wp:inline")
        .with_attribute("xmlns:wp", WP_NS)
        .with_attribute("distT", "0")
        .with_attribute("distB", "0")
        .with_attribute("distL", "0")
        .with_attribute("distR", "0")
        .with_child(
            XmlElement::new("wp:extent")
                .with_attribute("cx", cx.as_str())
                .with_attribute("cy", cy.as_str()),
        )
        .with_child(
            XmlElement::new("wp:effectExtent")
                .with_attribute("l", "0")
                .with_attribute("t", "0")
                .with_attribute("r", "0")
                .with_attribute("b", "0"),
        )
        .with_child(
            XmlElement::new("wp:docPr")
                .with_attribute("id", drawing_id.to_string())
                .with_attribute("name", name),
        )
        .with_child(
            XmlElement::new("wp:cNvGraphicFramePr").with_child(
                XmlElement::new("a:graphicFrameLocks")
                    .with_attribute("xmlns:a", A_NS)
                    .with_attribute("noChangeAspect", "1"),
            ),
        )
        .with_child(
            XmlElement::new("a:graphic")
                .with_attribute("xmlns:a", A_NS)
                .with_child(
                    XmlElement::new("a:graphicData")
                        .with_attribute("uri", PIC_NS)
                        .with_child(picture),
                ),
        );

    XmlElement::new("w:p").with_child(
        XmlElement::new("w:r").with_child(XmlElement::new("w:drawing").with_child(inline)),
    )
}
