/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for XML parsing and serialization.

use thiserror::Error;

/// Result type alias for docreport-xml operations.
pub type Result<T> = std::result::Result<T, XmlError>;

/// Errors that can occur while reading or writing a part.
#[derive(Debug, Clone, Error)]
pub enum XmlError {
    /// XML syntax error from quick-xml.
    #[error("XML syntax error: {message}{}", .position.map(|p| format!(" at byte {p}")).unwrap_or_default())]
    XmlSyntax {
        message: String,
        /// Byte offset where the error occurred.
        position: Option<u64>,
    },

    /// Unexpected end of input.
    #[error("Unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String },

    /// Mismatched end tag.
    #[error("Mismatched end tag: expected </{expected}>, found </{found}>")]
    MismatchedEndTag { expected: String, found: String },

    /// Invalid XML structure.
    #[error("Invalid XML structure: {message}")]
    InvalidStructure { message: String },

    /// Part content is not valid UTF-8.
    #[error("Part content is not valid UTF-8: {0}")]
    Encoding(String),

    /// Empty document (no root element).
    #[error("Empty XML document: no root element found")]
    EmptyDocument,

    /// Multiple root elements.
    #[error("Invalid XML: multiple root elements")]
    MultipleRoots,

    /// Failure while writing serialized output.
    #[error("Failed to write XML: {0}")]
    Write(String),
}

impl From<quick_xml::Error> for XmlError {
    fn from(err: quick_xml::Error) -> Self {
        XmlError::XmlSyntax {
            message: err.to_string(),
            position: None,
        }
    }
}

impl From<quick_xml::events::attributes::AttrError> for XmlError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        XmlError::XmlSyntax {
            message: format!("Attribute error: {}", err),
            position: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_display_with_position() {
        let err = XmlError::XmlSyntax {
            message: "bad tag".to_string(),
            position: Some(12),
        };
        assert_eq!(err.to_string(), "XML syntax error: bad tag at byte 12");
    }

    #[test]
    fn test_syntax_error_display_without_position() {
        let err = XmlError::XmlSyntax {
            message: "bad tag".to_string(),
            position: None,
        };
        assert_eq!(err.to_string(), "XML syntax error: bad tag");
    }
}
