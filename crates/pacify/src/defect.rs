// Copyright (c) Contributors to the Pacify project.
// SPDX-License-Identifier: Apache-2.0

//! Recoverable problems found while loading, validating or replacing.
//!
//! A [`Defect`] is plain data. Defects are accumulated into a [`DefectSet`]
//! and never abort a run on their own; they implement
//! [`miette::Diagnostic`] only so the command line can render them.

use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

#[cfg(test)]
#[path = "./defect_test.rs"]
mod defect_test;

/// One detected inconsistency.
///
/// `marker` is the absolute path of the descriptor the problem belongs to.
/// File and archive fields hold display locations such as
/// `lib/app.jar!conf/app.properties`.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Defect {
    #[error("Marker {} could not be parsed: {reason}", marker.display())]
    #[diagnostic(
        code(pacify::marker_not_parsable),
        help("Check YAML syntax and the field names of the marker file")
    )]
    MarkerNotParsable { marker: PathBuf, reason: String },

    #[error(
        "File {file} is declared by {} and {}",
        other_marker.display(),
        marker.display()
    )]
    #[diagnostic(
        code(pacify::file_duplicate_defined_in_marker),
        help("Declare every physical file exactly once across all markers")
    )]
    FileDuplicateDefinedInMarker {
        marker: PathBuf,
        other_marker: PathBuf,
        archive: Option<String>,
        file: String,
    },

    #[error(
        "Archive {archive} is declared by {} and {}",
        other_marker.display(),
        marker.display()
    )]
    #[diagnostic(
        code(pacify::archive_duplicate_defined_in_marker),
        help("Merge both declarations of the archive into one")
    )]
    ArchiveDuplicateDefinedInMarker {
        marker: PathBuf,
        other_marker: PathBuf,
        archive: String,
    },

    #[error("Property {property} is declared more than once for {file} in {}", marker.display())]
    #[diagnostic(code(pacify::property_duplicate_defined_in_marker))]
    PropertyDuplicateDefinedInMarker {
        marker: PathBuf,
        file: String,
        property: String,
    },

    #[error("Archive {archive} has unsupported type '{declared_type}' in {}", marker.display())]
    #[diagnostic(
        code(pacify::archive_type_not_implemented),
        help("Supported archive types are jar, war, ear, zip and tar")
    )]
    ArchiveTypeNotImplemented {
        marker: PathBuf,
        archive: String,
        declared_type: String,
    },

    #[error("{file} declared in {} does not exist", marker.display())]
    #[diagnostic(code(pacify::file_does_not_exist))]
    FileDoesNotExist { marker: PathBuf, file: String },

    #[error("Filter '{filter}' used by {file} in {} is not registered", marker.display())]
    #[diagnostic(
        code(pacify::filter_not_found),
        help("Built-in filters are 'default' and 'properties'")
    )]
    FilterNotFound {
        marker: PathBuf,
        file: String,
        filter: String,
    },

    #[error("No begin/end token defined for {file} in {}", marker.display())]
    #[diagnostic(
        code(pacify::token_not_defined),
        help("Set beginToken and endToken on the marker, the archive or the file")
    )]
    TokenNotDefined { marker: PathBuf, file: String },

    #[error("Placeholder {placeholder} found in {file} is not declared in {}", marker.display())]
    #[diagnostic(
        code(pacify::placeholder_not_defined),
        help("Add the property to the file declaration or remove the placeholder")
    )]
    PlaceholderNotDefined {
        marker: PathBuf,
        file: String,
        placeholder: String,
    },

    #[error("Property {property} declared in {} does not occur in {file}", marker.display())]
    #[diagnostic(code(pacify::no_placeholder_in_target_file))]
    NoPlaceholderInTargetFile {
        marker: PathBuf,
        file: String,
        property: String,
    },

    #[error("Property {property} used in {file} cannot be resolved")]
    #[diagnostic(
        code(pacify::property_not_found),
        help("Provide a value through one of the configured resolvers or declare a default")
    )]
    PropertyNotFound {
        marker: PathBuf,
        file: String,
        property: String,
    },

    #[error("Property {property} was not replaced in {file}")]
    #[diagnostic(code(pacify::not_replaced_property))]
    NotReplacedProperty {
        marker: PathBuf,
        file: String,
        property: String,
    },

    #[error("Property {property} is defined in both {first} and {second}")]
    #[diagnostic(
        code(pacify::property_duplicate_in_property_file),
        help("The first definition is used; remove the other one")
    )]
    PropertyDuplicateInPropertyFile {
        property: String,
        resolver: String,
        first: String,
        second: String,
    },

    #[error("Cyclic reference while resolving {property} for {file}: {}", chain.join(" -> "))]
    #[diagnostic(code(pacify::cyclic_property_reference))]
    CyclicPropertyReference {
        marker: PathBuf,
        file: String,
        property: String,
        chain: Vec<String>,
    },

    #[error("Pattern '{pattern}' of property {property} in {file} is invalid: {reason}")]
    #[diagnostic(code(pacify::invalid_property_pattern))]
    InvalidPropertyPattern {
        marker: PathBuf,
        file: String,
        property: String,
        pattern: String,
        reason: String,
    },

    #[error("Failed to process {artifact}: {reason}")]
    #[diagnostic(code(pacify::artifact_io))]
    ArtifactIo {
        marker: PathBuf,
        artifact: String,
        reason: String,
    },

    #[error("Skipped {artifact} after a fatal defect")]
    #[diagnostic(
        code(pacify::artifact_skipped),
        help("Fix the fatal defect and run again to process this artifact")
    )]
    ArtifactSkipped { marker: PathBuf, artifact: String },
}

impl Defect {
    /// Stable name of the defect kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MarkerNotParsable { .. } => "MarkerNotParsable",
            Self::FileDuplicateDefinedInMarker { .. } => "FileDuplicateDefinedInMarker",
            Self::ArchiveDuplicateDefinedInMarker { .. } => "ArchiveDuplicateDefinedInMarker",
            Self::PropertyDuplicateDefinedInMarker { .. } => "PropertyDuplicateDefinedInMarker",
            Self::ArchiveTypeNotImplemented { .. } => "ArchiveTypeNotImplemented",
            Self::FileDoesNotExist { .. } => "FileDoesNotExist",
            Self::FilterNotFound { .. } => "FilterNotFound",
            Self::TokenNotDefined { .. } => "TokenNotDefined",
            Self::PlaceholderNotDefined { .. } => "PlaceholderNotDefined",
            Self::NoPlaceholderInTargetFile { .. } => "NoPlaceholderInTargetFile",
            Self::PropertyNotFound { .. } => "PropertyNotFound",
            Self::NotReplacedProperty { .. } => "NotReplacedProperty",
            Self::PropertyDuplicateInPropertyFile { .. } => "PropertyDuplicateInPropertyFile",
            Self::CyclicPropertyReference { .. } => "CyclicPropertyReference",
            Self::InvalidPropertyPattern { .. } => "InvalidPropertyPattern",
            Self::ArtifactIo { .. } => "ArtifactIo",
            Self::ArtifactSkipped { .. } => "ArtifactSkipped",
        }
    }

    /// The descriptor the defect belongs to, if it is tied to one.
    pub fn marker(&self) -> Option<&Path> {
        match self {
            Self::PropertyDuplicateInPropertyFile { .. } => None,
            Self::MarkerNotParsable { marker, .. }
            | Self::FileDuplicateDefinedInMarker { marker, .. }
            | Self::ArchiveDuplicateDefinedInMarker { marker, .. }
            | Self::PropertyDuplicateDefinedInMarker { marker, .. }
            | Self::ArchiveTypeNotImplemented { marker, .. }
            | Self::FileDoesNotExist { marker, .. }
            | Self::FilterNotFound { marker, .. }
            | Self::TokenNotDefined { marker, .. }
            | Self::PlaceholderNotDefined { marker, .. }
            | Self::NoPlaceholderInTargetFile { marker, .. }
            | Self::PropertyNotFound { marker, .. }
            | Self::NotReplacedProperty { marker, .. }
            | Self::CyclicPropertyReference { marker, .. }
            | Self::InvalidPropertyPattern { marker, .. }
            | Self::ArtifactIo { marker, .. }
            | Self::ArtifactSkipped { marker, .. } => Some(marker),
        }
    }

    /// The property identifier the defect is about, if any.
    pub fn property(&self) -> Option<&str> {
        match self {
            Self::PropertyDuplicateDefinedInMarker { property, .. }
            | Self::NoPlaceholderInTargetFile { property, .. }
            | Self::PropertyNotFound { property, .. }
            | Self::NotReplacedProperty { property, .. }
            | Self::PropertyDuplicateInPropertyFile { property, .. }
            | Self::CyclicPropertyReference { property, .. }
            | Self::InvalidPropertyPattern { property, .. } => Some(property),
            Self::PlaceholderNotDefined { placeholder, .. } => Some(placeholder),
            _ => None,
        }
    }

    /// Fatal defects stop the scheduling of further artifacts.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CyclicPropertyReference { .. })
    }
}

/// Insertion ordered set of defects, duplicates collapsed by value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DefectSet(IndexSet<Defect>);

impl DefectSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a defect, returning false if an equal one was already present.
    pub fn insert(&mut self, defect: Defect) -> bool {
        self.0.insert(defect)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, defect: &Defect) -> bool {
        self.0.contains(defect)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Defect> {
        self.0.iter()
    }

    /// Defects of the given kind, see [`Defect::kind`].
    pub fn of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Defect> {
        self.0.iter().filter(move |d| d.kind() == kind)
    }

    pub fn has_fatal(&self) -> bool {
        self.0.iter().any(Defect::is_fatal)
    }
}

impl Extend<Defect> for DefectSet {
    fn extend<T: IntoIterator<Item = Defect>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl FromIterator<Defect> for DefectSet {
    fn from_iter<T: IntoIterator<Item = Defect>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for DefectSet {
    type Item = Defect;
    type IntoIter = indexmap::set::IntoIter<Defect>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a DefectSet {
    type Item = &'a Defect;
    type IntoIter = indexmap::set::Iter<'a, Defect>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Render an error and its sources on one line.
pub(crate) fn describe(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
