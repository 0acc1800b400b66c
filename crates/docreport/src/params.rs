/*
 * params.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! JSON parameter files.
//!
//! A file holds one object (one document) or an array of objects (one
//! document each). Values map onto [`ParamValue`]:
//!
//! - strings, numbers, booleans and null become scalars
//! - arrays of `{"path", "width", "height"}` objects become pictures
//! - other arrays of objects become table rows
//! - objects become nested maps, reachable by dotted placeholders
//! - arrays of scalars are joined into one comma-separated text

use std::path::Path;

use anyhow::{Context, Result, bail};
use docreport_engine::{ImageValue, ParamValue, Parameters, Row};
use serde_json::{Map, Value};

pub fn read_parameter_file(path: &Path) -> Result<Vec<Parameters>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read parameter file {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    documents(&value).with_context(|| format!("Unusable parameter file {}", path.display()))
}

/// Parameter maps for every document described by `value`.
pub fn documents(value: &Value) -> Result<Vec<Parameters>> {
    match value {
        Value::Object(object) => Ok(vec![row(object)]),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(object) => Ok(row(object)),
                _ => bail!("Entry {} is not an object", index + 1),
            })
            .collect(),
        _ => bail!("Expected an object or an array of objects"),
    }
}

fn row(object: &Map<String, Value>) -> Row {
    object
        .iter()
        .map(|(key, value)| (key.clone(), param_value(value)))
        .collect()
}

pub fn param_value(value: &Value) -> ParamValue {
    match value {
        Value::Null => ParamValue::Null,
        Value::Bool(b) => ParamValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => ParamValue::Integer(i),
            None => n.as_f64().map_or(ParamValue::Null, ParamValue::Float),
        },
        Value::String(s) => ParamValue::Text(s.clone()),
        Value::Object(object) => ParamValue::Map(
            object
                .iter()
                .map(|(key, value)| (key.clone(), param_value(value)))
                .collect(),
        ),
        Value::Array(items) => array_value(items),
    }
}

fn array_value(items: &[Value]) -> ParamValue {
    if !items.is_empty()
        && let Some(images) = items.iter().map(image_value).collect::<Option<Vec<_>>>()
    {
        return ParamValue::Images(images);
    }
    if items.iter().all(Value::is_object) {
        return ParamValue::Rows(items.iter().filter_map(Value::as_object).map(row).collect());
    }
    let parts: Vec<String> = items.iter().map(|item| param_value(item).render()).collect();
    ParamValue::Text(parts.join(", "))
}

fn image_value(item: &Value) -> Option<ImageValue> {
    let object = item.as_object()?;
    if object.len() != 3 {
        return None;
    }
    let path = object.get("path")?.as_str()?;
    let width = u32::try_from(object.get("width")?.as_u64()?).ok()?;
    let height = u32::try_from(object.get("height")?.as_u64()?).ok()?;
    Some(ImageValue::new(path, width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_scalars() {
        assert!(matches!(param_value(&json!(null)), ParamValue::Null));
        assert!(matches!(param_value(&json!(true)), ParamValue::Bool(true)));
        assert!(matches!(param_value(&json!(42)), ParamValue::Integer(42)));
        assert!(matches!(param_value(&json!(2.5)), ParamValue::Float(f) if f == 2.5));
        assert_eq!(param_value(&json!("x")).render(), "x");
    }

    #[test]
    fn test_image_arrays() {
        let value = param_value(&json!([{"path": "a.png", "width": 10, "height": 20}]));
        let images = value.as_images().unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].path, Path::new("a.png"));
        assert_eq!((images[0].width, images[0].height), (10, 20));
    }

    #[test]
    fn test_extra_keys_make_rows_not_images() {
        let value = param_value(&json!([
            {"path": "a.png", "width": 10, "height": 20, "caption": "A"}
        ]));
        assert!(value.as_images().is_none());
        let rows = value.as_rows().unwrap();
        assert_eq!(rows[0]["caption"].render(), "A");
    }

    #[test]
    fn test_rows_and_maps() {
        let value = param_value(&json!([
            {"Name": "Pen", "Lines": [{"Qty": 1}]},
            {"Name": "Ink", "Lines": []}
        ]));
        let rows = value.as_rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Lines"].as_rows().unwrap().len(), 1);
        assert_eq!(rows[1]["Lines"].as_rows().unwrap().len(), 0);

        let client = param_value(&json!({"Address": {"City": "Oslo"}}));
        assert_eq!(
            client.get_path(&["Address", "City"]).unwrap().render(),
            "Oslo"
        );
    }

    #[test]
    fn test_scalar_arrays_join() {
        assert_eq!(param_value(&json!(["a", 1, true])).render(), "a, 1, true");
    }

    #[test]
    fn test_documents() {
        assert_eq!(documents(&json!({"A": 1})).unwrap().len(), 1);
        assert_eq!(documents(&json!([{"A": 1}, {"A": 2}])).unwrap().len(), 2);
        assert!(documents(&json!([{"A": 1}, 3])).is_err());
        assert!(documents(&json!("nope")).is_err());
    }

    #[test]
    fn test_read_parameter_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        std::fs::write(&path, r#"[{"Name": "Ann"}, {"Name": "Bo"}]"#).unwrap();

        let documents = read_parameter_file(&path).unwrap();
        let names: Vec<String> = documents.iter().map(|d| d["Name"].render()).collect();
        assert_eq!(names, vec!["Ann", "Bo"]);
    }
}
