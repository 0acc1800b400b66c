/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Owned, mutable XML trees for WordprocessingML package parts.
//!
//! This crate wraps [`quick-xml`] to provide a tree of [`XmlElement`]s that can
//! be parsed from a package part, rewritten in place, and serialized back.
//! Unlike a read-only document model, every element owns its children, so
//! whole subtrees can be cloned, spliced and removed freely.
//!
//! # Overview
//!
//! The main types are:
//! - [`XmlDocument`]: a parsed part (declaration plus root element)
//! - [`XmlElement`]: an element with prefix, local name, attributes and children
//! - [`XmlAttribute`]: a single attribute
//! - [`XmlChild`]: element content (child element or text)
//! - [`NodePath`]: the address of an element as child indices from a root
//!
//! # Example
//!
//! ```rust
//! use docreport_xml::parse;
//!
//! let doc = parse(r#"<w:p xmlns:w="urn:w"><w:r><w:t>Hello</w:t></w:r></w:p>"#).unwrap();
//!
//! assert!(doc.root.is("w:p"));
//! assert_eq!(doc.root.descendant_text("w:t"), "Hello");
//!
//! let path = doc.root.find_path(|e| e.is("w:t")).unwrap();
//! assert_eq!(path, vec![0, 0]);
//! ```

pub mod error;
pub mod parser;
pub mod path;
pub mod types;
pub mod writer;

// Re-export main types
pub use error::{Result, XmlError};
pub use parser::{parse, parse_bytes};
pub use path::{NodePath, common_prefix_len};
pub use types::{Descendants, XmlAttribute, XmlChild, XmlDeclaration, XmlDocument, XmlElement};
