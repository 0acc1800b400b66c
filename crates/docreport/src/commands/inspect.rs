/*
 * inspect.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Inspect command implementation

use std::path::Path;

use anyhow::{Context, Result};
use docreport_engine::{ImageAnchor, ParameterSpec, TableSection, TemplateEngine};
use serde::Serialize;

#[derive(Serialize)]
struct Catalog<'a> {
    parameters: &'a [ParameterSpec],
    tables: &'a [TableSection],
    images: &'a [ImageAnchor],
}

pub fn execute(template: &Path, config: Option<&Path>) -> Result<()> {
    let options = super::load_options(config)?;
    let engine = TemplateEngine::open_with_options(template, options)
        .with_context(|| format!("Failed to load template {}", template.display()))?;
    println!("{}", catalog_json(&engine)?);
    Ok(())
}

fn catalog_json(engine: &TemplateEngine) -> Result<String> {
    let catalog = Catalog {
        parameters: engine.parameters(),
        tables: engine.tables(),
        images: engine.images(),
    };
    Ok(serde_json::to_string_pretty(&catalog)?)
}
