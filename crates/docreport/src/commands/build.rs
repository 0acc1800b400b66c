/*
 * build.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Build command implementation.
//!
//! Every parameter object becomes one document; all documents are merged
//! into the single output file. Missing values are logged as warnings and
//! do not change the exit status.

use std::path::PathBuf;

use anyhow::{Context, Result};
use docreport_engine::TemplateEngine;
use tracing::{info, warn};

use crate::params::read_parameter_file;

/// Arguments for the build command
#[derive(Debug)]
pub struct BuildArgs {
    pub template: PathBuf,
    pub params: Vec<PathBuf>,
    pub output: PathBuf,
    pub config: Option<PathBuf>,
}

/// Execute the build command
pub fn execute(args: BuildArgs) -> Result<()> {
    let options = super::load_options(args.config.as_deref())?;
    let mut engine = TemplateEngine::open_with_options(&args.template, options)
        .with_context(|| format!("Failed to load template {}", args.template.display()))?;

    for file in &args.params {
        let documents = read_parameter_file(file)?;
        for (index, params) in documents.iter().enumerate() {
            let warnings = engine.build(params).with_context(|| {
                format!("Failed to build document {} of {}", index + 1, file.display())
            })?;
            for message in warnings.iter() {
                warn!(params = %file.display(), document = index + 1, "{message}");
            }
        }
    }

    let count = engine.document_count();
    engine
        .save(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    info!(output = %args.output.display(), documents = count, "Wrote report");
    Ok(())
}
