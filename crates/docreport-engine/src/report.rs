/*
 * report.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The report engine.
//!
//! A [`TemplateEngine`] scans its template once, then builds any number of
//! documents from parameter maps. Finished documents accumulate in the
//! engine until [`TemplateEngine::save`] merges them into one output.
//!
//! ```no_run
//! use docreport_engine::{ParamValue, Parameters, TemplateEngine};
//!
//! let mut engine = TemplateEngine::open("invoice.docx")?;
//! let mut params = Parameters::new();
//! params.insert("Customer".to_string(), ParamValue::from("ACME"));
//! let warnings = engine.build(&params)?;
//! if !warnings.is_empty() {
//!     eprintln!("{warnings}");
//! }
//! engine.save("invoices.docx")?;
//! # Ok::<(), docreport_engine::ReportError>(())
//! ```

use crate::container::Container;
use crate::error::{ReportError, ReportResult};
use crate::formatting::apply_formatting_tags;
use crate::images::{ImageAnchor, bind_bookmark_images, bind_placeholder_images, collect_bookmark_anchors};
use crate::matcher::{replace_in_document, visible_text};
use crate::options::ReportOptions;
use crate::parameter::ParameterSpec;
use crate::table::TableSection;
use crate::value::{ParamValue, Parameters};
use crate::warnings::Warnings;
use docreport_package::DocxPackage;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::mem;
use std::path::Path;

static SCALAR_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(.+?)\]").unwrap());

/// Builds documents from one template.
pub struct TemplateEngine<C: Container = DocxPackage> {
    template: C,
    options: ReportOptions,
    parameters: Vec<ParameterSpec>,
    tables: Vec<TableSection>,
    images: Vec<ImageAnchor>,
    documents: Vec<C>,
}

impl TemplateEngine<DocxPackage> {
    /// Open a `.docx` template from disk.
    pub fn open(path: impl AsRef<Path>) -> ReportResult<Self> {
        Self::open_with_options(path, ReportOptions::default())
    }

    pub fn open_with_options(path: impl AsRef<Path>, options: ReportOptions) -> ReportResult<Self> {
        let package = DocxPackage::open(path)?;
        Self::load_with_options(package, options)
    }
}

impl<C: Container> TemplateEngine<C> {
    pub fn load(template: C) -> ReportResult<Self> {
        Self::load_with_options(template, ReportOptions::default())
    }

    /// Scan `template` for placeholders.
    ///
    /// Table sections are read from the main part only; scalar placeholders
    /// from every text part. Templates with revision tracking are refused.
    pub fn load_with_options(template: C, options: ReportOptions) -> ReportResult<Self> {
        if template.has_revision_tracking() {
            return Err(ReportError::RevisionTracking);
        }

        let main = template.main_part();
        let main_root = template
            .part_root(&main)
            .ok_or_else(|| ReportError::MissingPart(main.clone()))?;
        let tables = TableSection::parse_all(&visible_text(main_root));
        let images = collect_bookmark_anchors(main_root, &options.image_prefix);

        let mut parameters: Vec<ParameterSpec> = Vec::new();
        for part in template.text_parts() {
            let Some(root) = template.part_root(&part) else {
                continue;
            };
            let text = visible_text(root);
            for captures in SCALAR_TOKEN.captures_iter(&text) {
                let raw = &captures[1];
                if parameters.iter().all(|p| p.full_name != raw) {
                    parameters.push(ParameterSpec::parse(raw));
                }
            }
        }

        tracing::debug!(
            parameters = parameters.len(),
            tables = tables.len(),
            images = images.len(),
            "Loaded template"
        );
        Ok(Self {
            template,
            options,
            parameters,
            tables,
            images,
            documents: Vec::new(),
        })
    }

    /// Scalar placeholders, in order of discovery.
    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    /// Top-level table sections of the main part.
    pub fn tables(&self) -> &[TableSection] {
        &self.tables
    }

    /// Bookmark image anchors of the main part.
    pub fn images(&self) -> &[ImageAnchor] {
        &self.images
    }

    /// Documents built and not yet saved.
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn options(&self) -> &ReportOptions {
        &self.options
    }

    /// Build one document from `params` and keep it for [`save`](Self::save).
    ///
    /// Missing values do not fail the build; they are reported in the
    /// returned warnings and the document is produced regardless.
    pub fn build(&mut self, params: &Parameters) -> ReportResult<Warnings> {
        let mut document = self.template.clone();
        if document.has_revision_tracking() {
            return Err(ReportError::RevisionTracking);
        }

        let mut warnings = Warnings::new();
        let pairs = self.scalar_pairs(params, &mut warnings);
        for table in &self.tables {
            table.validate(params, &mut warnings);
        }

        let main = document.main_part();
        let root = document
            .part_root_mut(&main)
            .ok_or_else(|| ReportError::MissingPart(main.clone()))?;
        for table in &self.tables {
            let rows = params
                .get(&table.name)
                .and_then(ParamValue::as_rows)
                .unwrap_or(&[]);
            table.expand(root, rows, &self.options);
        }

        replace_in_document(&mut document, &pairs, self.options.scalar_match_case, None)?;
        bind_bookmark_images(&mut document, &self.images, params, &self.options, &mut warnings)?;
        bind_placeholder_images(&mut document, &self.options)?;
        apply_formatting_tags(&mut document)?;

        self.documents.push(document);
        tracing::debug!(
            document = self.documents.len(),
            warnings = warnings.len(),
            "Built document"
        );
        Ok(warnings)
    }

    /// Replacement pairs for every scalar with a candidate value.
    fn scalar_pairs(&self, params: &Parameters, warnings: &mut Warnings) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for spec in &self.parameters {
            let value = match params.get(&spec.name) {
                Some(value) => value.clone(),
                None => match spec.path() {
                    Some((root, rest)) if params.contains_key(root) => params[root]
                        .get_path(&rest)
                        .unwrap_or(ParamValue::Null),
                    _ => {
                        warnings.push(format!("Parameter {} not found", spec.name));
                        continue;
                    }
                },
            };
            pairs.push((spec.placeholder(), spec.format(&value)));
        }
        pairs
    }

    /// Merge every built document into one `.docx` at `path`.
    pub fn save(&mut self, path: impl AsRef<Path>) -> ReportResult<()> {
        if self.documents.is_empty() {
            return Err(ReportError::NothingToSave);
        }
        let path = path.as_ref();
        let file = File::create(path)?;
        self.save_to_writer(BufWriter::new(file))?;
        tracing::debug!(path = %path.display(), "Saved report");
        Ok(())
    }

    /// Merge every built document into `writer`, emptying the accumulator.
    pub fn save_to_writer<W: Write + Seek>(&mut self, writer: W) -> ReportResult<()> {
        if self.documents.is_empty() {
            return Err(ReportError::NothingToSave);
        }
        C::merge(mem::take(&mut self.documents), writer)
    }
}
