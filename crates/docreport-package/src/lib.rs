/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! WordprocessingML package access.
//!
//! [`DocxPackage`] holds a `.docx` zip package in memory with the editable
//! parts parsed into [`docreport_xml`] trees. It locates parts through
//! relationships, adds image parts, detects tracked revisions and writes the
//! package back. [`merge`] concatenates finished documents into one package.
//!
//! # Example
//!
//! ```rust,no_run
//! use docreport_package::{DocxPackage, PartKind};
//!
//! let package = DocxPackage::open("template.docx")?;
//! for name in package.part_names(PartKind::Header) {
//!     println!("header part: {name}");
//! }
//! # Ok::<(), docreport_package::PackageError>(())
//! ```

pub mod content_types;
pub mod error;
pub mod merge;
pub mod package;
pub mod relationships;

pub use error::{PackageError, Result};
pub use merge::{merge, merge_packages};
pub use package::{DocxPackage, PartKind};
pub use relationships::Relationship;
