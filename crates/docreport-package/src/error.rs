/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for package access.

use docreport_xml::XmlError;
use thiserror::Error;

/// Result type alias for package operations.
pub type Result<T> = std::result::Result<T, PackageError>;

/// Errors raised while reading, modifying or writing a `.docx` package.
#[derive(Debug, Error)]
pub enum PackageError {
    /// Filesystem or stream failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The zip container could not be read or written.
    #[error("Zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A part holds malformed XML.
    #[error("Malformed XML in part '{part}': {source}")]
    Xml {
        part: String,
        #[source]
        source: XmlError,
    },

    /// A part referenced by name or relationship does not exist.
    #[error("Package part not found: {0}")]
    MissingPart(String),

    /// The package has no main document part.
    #[error("Package has no main document part")]
    MissingMainDocument,

    /// A part does not have the structure its kind requires.
    #[error("Invalid part '{part}': {message}")]
    InvalidPart { part: String, message: String },

    /// `merge` was called without any documents.
    #[error("No documents to merge")]
    NothingToMerge,
}

impl PackageError {
    pub(crate) fn xml(part: &str, source: XmlError) -> Self {
        PackageError::Xml {
            part: part.to_string(),
            source,
        }
    }

    pub(crate) fn invalid(part: &str, message: impl Into<String>) -> Self {
        PackageError::InvalidPart {
            part: part.to_string(),
            message: message.into(),
        }
    }
}
