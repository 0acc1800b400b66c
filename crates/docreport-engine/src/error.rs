/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for report generation.
//!
//! Only conditions that make a document impossible to produce are errors.
//! Missing parameters are reported through [`crate::Warnings`] instead.

use docreport_package::PackageError;
use docreport_xml::XmlError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading a template or building documents.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The template contains tracked revisions or has change tracking on.
    #[error("Search and replace will not work with documents that contain revision tracking")]
    RevisionTracking,

    /// A placeholder hyperlink for an image lacks a usable path or geometry.
    #[error("Malformed image placeholder '{anchor}': {message}")]
    ImageAnchor { anchor: String, message: String },

    /// An image file could not be read.
    #[error("Cannot read image '{}': {source}", path.display())]
    ImageRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A part the engine needs is missing from the container.
    #[error("Document part not found: {0}")]
    MissingPart(String),

    /// `save` was called before any document was built.
    #[error("No documents have been built")]
    NothingToSave,

    /// Container failure.
    #[error(transparent)]
    Package(#[from] PackageError),

    /// Malformed part XML.
    #[error(transparent)]
    Xml(#[from] XmlError),

    /// I/O error (e.g., creating the output file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for report operations.
pub type ReportResult<T> = Result<T, ReportError>;
