/*
 * main.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! docreport CLI - Main entry point

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod params;

#[derive(Parser)]
#[command(name = "docreport")]
#[command(version)]
#[command(about = "Build Word reports from .docx templates", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill a template with parameter files and write the merged report
    Build {
        /// Template document (.docx)
        #[arg(short, long)]
        template: PathBuf,

        /// JSON parameter file: an object for one document, or an array of
        /// objects for several (repeatable)
        #[arg(short, long, required = true)]
        params: Vec<PathBuf>,

        /// Write the report to FILE
        #[arg(short, long)]
        output: PathBuf,

        /// TOML file with engine options
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the placeholders a template declares, as JSON
    Inspect {
        /// Template document (.docx)
        #[arg(short, long)]
        template: PathBuf,

        /// TOML file with engine options
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docreport=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            template,
            params,
            output,
            config,
        } => commands::build::execute(commands::build::BuildArgs {
            template,
            params,
            output,
            config,
        }),
        Commands::Inspect { template, config } => {
            commands::inspect::execute(&template, config.as_deref())
        }
    }
}
