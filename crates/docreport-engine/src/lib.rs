/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Word report generation from templates.
//!
//! A template is an ordinary `.docx` file whose text carries placeholders:
//!
//! - `[Name]`, `[Name:Format]` and `[Object.Field]` scalars
//! - `<##Section ... Section##>` repeating sections with `<#Field#>` tokens
//! - bookmarks named `imgTemplate<Name>` marking where pictures go
//! - inline formatting tags such as `<b>…</b>` inside substituted values
//!
//! Placeholders may be split across any number of runs; matching works on
//! the visible text of a paragraph. See [`TemplateEngine`] for the entry
//! point.

pub mod container;
pub mod error;
pub mod format;
pub mod formatting;
pub mod images;
pub mod matcher;
pub mod options;
pub mod parameter;
pub mod report;
pub mod table;
pub mod value;
pub mod warnings;

pub use container::Container;
pub use error::{ReportError, ReportResult};
pub use format::format_value;
pub use images::ImageAnchor;
pub use matcher::TextReplacer;
pub use options::ReportOptions;
pub use parameter::ParameterSpec;
pub use report::TemplateEngine;
pub use table::TableSection;
pub use value::{FieldAccess, ImageValue, ParamValue, Parameters, Row};
pub use warnings::Warnings;
