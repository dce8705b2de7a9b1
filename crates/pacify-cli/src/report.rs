// Copyright (c) Contributors to the Pacify project.
// SPDX-License-Identifier: Apache-2.0

//! Printing defect sets.

use clap::ValueEnum;
use colored::Colorize;
use miette::{IntoDiagnostic, Result};
use pacify::DefectSet;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Yaml,
    Json,
}

/// Print the defects of a run and map them to the process exit code.
pub fn report(defects: &DefectSet, format: OutputFormat) -> Result<i32> {
    match format {
        OutputFormat::Table => {
            for defect in defects {
                eprintln!("{:?}", miette::Report::new(defect.clone()));
            }
            if defects.is_empty() {
                println!("{}", "✓ No defects found".green());
            } else {
                let fatal = if defects.has_fatal() { " (fatal)" } else { "" };
                eprintln!("{}", format!("✗ {} defect(s){fatal}", defects.len()).red().bold());
            }
        }
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(defects).into_diagnostic()?),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(defects).into_diagnostic()?)
        }
    }
    Ok(exit_code(defects))
}

pub fn exit_code(defects: &DefectSet) -> i32 {
    if defects.is_empty() { 0 } else { 1 }
}
