/*
 * value.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Parameter values supplied by the caller.
//!
//! A build receives a [`Parameters`] map. Scalars fill `[Name]` tokens,
//! [`ParamValue::Rows`] fill table sections, [`ParamValue::Images`] fill image
//! anchors, and [`ParamValue::Map`] / [`ParamValue::Object`] are walked by
//! dotted paths such as `[Contract.Customer.Name]`.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

/// One table row: field name to value.
pub type Row = BTreeMap<String, ParamValue>;

/// The top-level values handed to a build.
pub type Parameters = Row;

/// Field lookup for caller-defined objects reached through dotted paths.
///
/// Returning `None` means the field does not exist; the placeholder then
/// renders as an empty string.
pub trait FieldAccess: fmt::Debug {
    fn get_field(&self, name: &str) -> Option<ParamValue>;
}

/// A picture to embed: source file and size in pixels.
///
/// The file is deleted once embedded (unless disabled in the options).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageValue {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl ImageValue {
    pub fn new(path: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            path: path.into(),
            width,
            height,
        }
    }
}

/// A value bound to a parameter name.
#[derive(Debug, Clone, Default)]
pub enum ParamValue {
    #[default]
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// Rows of a table section.
    Rows(Vec<Row>),
    /// Pictures for an image anchor.
    Images(Vec<ImageValue>),
    /// Nested named values, reachable by dotted paths.
    Map(BTreeMap<String, ParamValue>),
    /// Caller-defined object, reachable by dotted paths.
    Object(Rc<dyn FieldAccess>),
}

impl ParamValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }

    /// Rows of a table section, if this value is one.
    pub fn as_rows(&self) -> Option<&[Row]> {
        match self {
            ParamValue::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    /// Pictures, if this value holds any.
    pub fn as_images(&self) -> Option<&[ImageValue]> {
        match self {
            ParamValue::Images(images) => Some(images),
            _ => None,
        }
    }

    /// Look up one field of a `Map` or `Object`; other values have no fields.
    pub fn get_field(&self, name: &str) -> Option<ParamValue> {
        match self {
            ParamValue::Map(map) => map.get(name).cloned(),
            ParamValue::Object(object) => object.get_field(name),
            _ => None,
        }
    }

    /// Follow a dotted path of field names.
    ///
    /// Stops with `None` at the first missing link.
    pub fn get_path(&self, path: &[&str]) -> Option<ParamValue> {
        let Some((first, rest)) = path.split_first() else {
            return Some(self.clone());
        };
        self.get_field(first)?.get_path(rest)
    }

    /// Default string form, used when a placeholder has no format specifier.
    ///
    /// - Text: as-is
    /// - Integer, Float: shortest decimal form
    /// - Bool: "true" or "false"
    /// - Date: `yyyy-MM-dd`; DateTime: `yyyy-MM-dd HH:mm:ss`
    /// - Null and container values: ""
    pub fn render(&self) -> String {
        match self {
            ParamValue::Text(s) => s.clone(),
            ParamValue::Integer(i) => i.to_string(),
            ParamValue::Float(f) => f.to_string(),
            ParamValue::Bool(b) => b.to_string(),
            ParamValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            ParamValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            ParamValue::Null
            | ParamValue::Rows(_)
            | ParamValue::Images(_)
            | ParamValue::Map(_)
            | ParamValue::Object(_) => String::new(),
        }
    }
}

impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ParamValue::Null, ParamValue::Null) => true,
            (ParamValue::Text(a), ParamValue::Text(b)) => a == b,
            (ParamValue::Integer(a), ParamValue::Integer(b)) => a == b,
            (ParamValue::Float(a), ParamValue::Float(b)) => a == b,
            (ParamValue::Bool(a), ParamValue::Bool(b)) => a == b,
            (ParamValue::Date(a), ParamValue::Date(b)) => a == b,
            (ParamValue::DateTime(a), ParamValue::DateTime(b)) => a == b,
            (ParamValue::Rows(a), ParamValue::Rows(b)) => a == b,
            (ParamValue::Images(a), ParamValue::Images(b)) => a == b,
            (ParamValue::Map(a), ParamValue::Map(b)) => a == b,
            (ParamValue::Object(a), ParamValue::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Integer(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Integer(i64::from(value))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<NaiveDate> for ParamValue {
    fn from(value: NaiveDate) -> Self {
        ParamValue::Date(value)
    }
}

impl From<NaiveDateTime> for ParamValue {
    fn from(value: NaiveDateTime) -> Self {
        ParamValue::DateTime(value)
    }
}

impl From<Vec<Row>> for ParamValue {
    fn from(value: Vec<Row>) -> Self {
        ParamValue::Rows(value)
    }
}

impl From<Vec<ImageValue>> for ParamValue {
    fn from(value: Vec<ImageValue>) -> Self {
        ParamValue::Images(value)
    }
}

impl<T: FieldAccess + 'static> From<Rc<T>> for ParamValue {
    fn from(value: Rc<T>) -> Self {
        ParamValue::Object(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug)]
    struct Customer;

    impl FieldAccess for Customer {
        fn get_field(&self, name: &str) -> Option<ParamValue> {
            match name {
                "Name" => Some("ACME".into()),
                "Since" => Some(ParamValue::Null),
                _ => None,
            }
        }
    }

    #[test]
    fn test_render_defaults() {
        assert_eq!(ParamValue::Null.render(), "");
        assert_eq!(ParamValue::from(42).render(), "42");
        assert_eq!(ParamValue::from(1.5).render(), "1.5");
        assert_eq!(ParamValue::from(true).render(), "true");
        let date = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        assert_eq!(ParamValue::from(date).render(), "2021-01-01");
        assert_eq!(ParamValue::Rows(vec![]).render(), "");
    }

    #[test]
    fn test_get_path_through_map_and_object() {
        let mut contract = BTreeMap::new();
        contract.insert("Number".to_string(), ParamValue::from("A-17"));
        contract.insert(
            "Customer".to_string(),
            ParamValue::from(Rc::new(Customer)),
        );
        let value = ParamValue::Map(contract);

        assert_eq!(value.get_path(&["Number"]), Some("A-17".into()));
        assert_eq!(value.get_path(&["Customer", "Name"]), Some("ACME".into()));
        assert_eq!(value.get_path(&["Customer", "Since"]), Some(ParamValue::Null));
        assert_eq!(value.get_path(&["Customer", "Missing"]), None);
        assert_eq!(value.get_path(&["Number", "Length"]), None);
    }

    #[test]
    fn test_as_rows_and_images() {
        let rows = ParamValue::Rows(vec![Row::new()]);
        assert_eq!(rows.as_rows().map(<[Row]>::len), Some(1));
        assert!(rows.as_images().is_none());
        let images = ParamValue::from(vec![ImageValue::new("a.png", 10, 20)]);
        assert_eq!(images.as_images().unwrap()[0].height, 20);
    }
}
