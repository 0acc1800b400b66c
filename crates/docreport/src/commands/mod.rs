/*
 * mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Command implementations for the docreport CLI
//!
//! Each command module handles the CLI interface and delegates to
//! docreport-engine for the actual work.

pub mod build;
pub mod inspect;

use std::path::Path;

use anyhow::{Context, Result};
use docreport_engine::ReportOptions;

/// Read engine options from a TOML file, or use the defaults.
pub fn load_options(path: Option<&Path>) -> Result<ReportOptions> {
    let Some(path) = path else {
        return Ok(ReportOptions::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Invalid config file {}", path.display()))
}
