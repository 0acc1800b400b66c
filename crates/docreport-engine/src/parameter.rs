/*
 * parameter.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Placeholder parameters such as `[Contract.Date:dd.MM.yyyy]`.

use crate::format::format_value;
use crate::value::ParamValue;
use serde::Serialize;

/// A parameter named by a placeholder in the template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterSpec {
    /// Lookup name, possibly a dotted path.
    pub name: String,
    /// Placeholder text as written, format specifier included.
    pub full_name: String,
    /// Format specifier after the first colon.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_spec: Option<String>,
}

impl ParameterSpec {
    /// Parse the text between the placeholder brackets.
    ///
    /// The first `:` separates name and format specifier, unless it is the
    /// very first character.
    pub fn parse(raw: &str) -> Self {
        let (name, format_spec) = match raw.find(':') {
            Some(colon) if colon > 0 => {
                let spec = &raw[colon + 1..];
                (&raw[..colon], (!spec.is_empty()).then(|| spec.to_string()))
            }
            _ => (raw, None),
        };
        Self {
            name: name.to_string(),
            full_name: raw.to_string(),
            format_spec,
        }
    }

    /// Render a value for this placeholder.
    pub fn format(&self, value: &ParamValue) -> String {
        match &self.format_spec {
            Some(spec) => format_value(value, spec),
            None => value.render(),
        }
    }

    /// The scalar token, `[FullName]`.
    pub fn placeholder(&self) -> String {
        format!("[{}]", self.full_name)
    }

    /// The table field token, `<#FullName#>`.
    pub fn field_token(&self) -> String {
        format!("<#{}#>", self.full_name)
    }

    /// Root object and remaining path of a dotted name.
    pub fn path(&self) -> Option<(&str, Vec<&str>)> {
        let (root, rest) = self.name.split_once('.')?;
        Some((root, rest.split('.').collect()))
    }
}
