// Copyright (c) Contributors to the Pacify project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `pacify show` command.

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use miette::{IntoDiagnostic, Result};
use pacify::{ArchiveId, EntityGraph, FileId, MarkerId};
use serde::Serialize;

use crate::report::OutputFormat;

/// Display the markers, files and archives of a package
#[derive(Debug, Args)]
pub struct CmdShow {
    #[clap(flatten)]
    package: crate::PackageFlags,

    /// Output format
    #[clap(long, value_enum, default_value_t)]
    format: OutputFormat,
}

#[derive(Serialize)]
struct MarkerView {
    path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    begin_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_token: Option<String>,
    files: Vec<FileView>,
    archives: Vec<ArchiveView>,
}

#[derive(Serialize)]
struct FileView {
    uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<String>,
    properties: Vec<String>,
}

#[derive(Serialize)]
struct ArchiveView {
    uri: String,
    #[serde(rename = "type")]
    archive_type: String,
}

impl CmdShow {
    pub fn run(&mut self) -> Result<i32> {
        let manager = self.package.load()?;
        let graph = manager.graph();
        let markers: Vec<MarkerView> = graph
            .markers()
            .map(|(id, _)| marker_view(graph, id))
            .collect();

        match self.format {
            OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&markers).into_diagnostic()?),
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&markers).into_diagnostic()?)
            }
            OutputFormat::Table => self.show_table(manager.root(), &markers),
        }

        for defect in manager.defects() {
            eprintln!("{:?}", miette::Report::new(defect.clone()));
        }
        Ok(crate::report::exit_code(manager.defects()))
    }

    fn show_table(&self, root: &std::path::Path, markers: &[MarkerView]) {
        println!("{} {}", "Package:".bold(), root.display().to_string().cyan());
        println!();

        for (i, marker) in markers.iter().enumerate() {
            let path = marker.path.strip_prefix(root).unwrap_or(&marker.path);
            let tokens = match (&marker.begin_token, &marker.end_token) {
                (Some(begin), Some(end)) => format!(" [{begin}name{end}]"),
                _ => String::new(),
            };
            println!("  {}. {}{}", i + 1, path.display().to_string().cyan(), tokens.yellow());

            if marker.files.is_empty() && marker.archives.is_empty() {
                println!("     {}", "(nothing declared)".dimmed());
            }
            for archive in &marker.archives {
                println!("     {} {}", archive.uri.green(), format!("({})", archive.archive_type).dimmed());
            }
            for file in &marker.files {
                let filter = file
                    .filter
                    .as_ref()
                    .map(|f| format!(" [{f}]"))
                    .unwrap_or_default();
                println!("     {}{}", file.uri, filter.blue());
                if !file.properties.is_empty() {
                    println!("       {}", file.properties.join(", ").dimmed());
                }
            }
        }

        println!();
        println!("Total: {} marker file(s)", markers.len());
    }
}

fn marker_view(graph: &EntityGraph, id: MarkerId) -> MarkerView {
    let marker = graph.marker(id);
    MarkerView {
        path: marker.path().to_path_buf(),
        begin_token: marker.begin_token().map(String::from),
        end_token: marker.end_token().map(String::from),
        files: graph
            .files_of(id)
            .into_iter()
            .map(|file| file_view(graph, file))
            .collect(),
        archives: graph
            .archives_of(id)
            .into_iter()
            .map(|archive| archive_view(graph, archive))
            .collect(),
    }
}

fn file_view(graph: &EntityGraph, id: FileId) -> FileView {
    let file = graph.file(id);
    FileView {
        uri: graph.file_uri(id),
        filter: file.filter().map(String::from),
        properties: file.properties().iter().map(|p| p.name.clone()).collect(),
    }
}

fn archive_view(graph: &EntityGraph, id: ArchiveId) -> ArchiveView {
    ArchiveView {
        uri: graph.archive_uri(id),
        archive_type: graph.archive(id).declared_type().to_string(),
    }
}
