// Copyright (c) Contributors to the Pacify project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for pacify operations.
//!
//! Only fatal conditions are errors. Anything a package author can fix is
//! reported as a [`crate::Defect`] instead.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience Result type with pacify Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during pacify operations.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// The package root does not exist or is not a directory
    #[error("Package directory not found: {0:?}")]
    #[diagnostic(
        code(pacify::package_not_found),
        help("Pass the root directory of the unpacked deployment package")
    )]
    PackageNotFound(PathBuf),

    /// No marker descriptor found below the package root
    #[error("No marker file (*{suffix}) found in {path:?}")]
    #[diagnostic(
        code(pacify::no_marker_found),
        help("Create a marker file with 'pacify init' or pass --allow-empty")
    )]
    NoMarkerFound { path: PathBuf, suffix: &'static str },

    /// Invalid YAML in a marker descriptor
    #[error("Invalid marker file: {error}")]
    #[diagnostic(
        code(pacify::invalid_yaml),
        help("Check YAML syntax and ensure 'api: pacify/v0' is present")
    )]
    InvalidYaml {
        #[source]
        error: serde_yaml::Error,
        yaml_content: String,
    },

    /// Failed to read file
    #[error("Failed to read file: {path:?}")]
    #[diagnostic(code(pacify::read_failed))]
    ReadFailed {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Failed to write file
    #[error("Failed to write file: {path:?}")]
    #[diagnostic(code(pacify::write_failed))]
    WriteFailed {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Archive type not one of the supported container kinds
    #[error("Archive type not supported: {0}")]
    #[diagnostic(
        code(pacify::unsupported_archive_type),
        help("Supported archive types are jar, war, ear, zip and tar")
    )]
    UnsupportedArchiveType(String),

    /// Content is not valid for the configured encoding
    #[error("Content of {0} is not valid UTF-8")]
    #[diagnostic(code(pacify::invalid_encoding))]
    InvalidEncoding(String),

    /// Unknown resolver requested
    #[error("Unknown resolver: {name}")]
    #[diagnostic(
        code(pacify::unknown_resolver),
        help("{}", resolver_suggestion(known))
    )]
    UnknownResolver {
        name: String,
        known: Vec<&'static str>,
    },

    /// Resolver configuration could not be applied
    #[error("Invalid resolver configuration: {0}")]
    #[diagnostic(
        code(pacify::invalid_resolver_config),
        help("Resolver options are passed as -D<resolver>.<key>=<value>")
    )]
    InvalidResolverConfig(String),

    /// Worker pool could not be created
    #[error("Failed to create worker pool")]
    #[diagnostic(code(pacify::thread_pool))]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Zip codec error passthrough
    #[error(transparent)]
    #[diagnostic(code(pacify::zip_error))]
    Zip(#[from] zip::result::ZipError),

    /// IO error passthrough
    #[error(transparent)]
    #[diagnostic(code(pacify::io_error))]
    Io(#[from] std::io::Error),
}

fn resolver_suggestion(known: &[&'static str]) -> String {
    if known.is_empty() {
        "No resolvers are available".to_string()
    } else {
        format!("Available resolvers: {}", known.join(", "))
    }
}
