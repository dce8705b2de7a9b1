// Copyright (c) Contributors to the Pacify project.
// SPDX-License-Identifier: Apache-2.0

//! In-memory entity graph of markers, archives, target files and properties.
//!
//! The graph is an arena: every node lives in a flat vector and refers to its
//! parent through a stable id. Children are built from their descriptor
//! values first and then attached to a parent with one of the `attach_*`
//! methods, so the graph never holds live references and is freely shared
//! between worker threads once loading is done.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;

use crate::spec::{ArchiveSpec, FileSpec, PropertySpec};
use crate::token::Tokens;

#[cfg(test)]
#[path = "./model_test.rs"]
mod model_test;

/// Identifies a [`Marker`] within an [`EntityGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerId(usize);

/// Identifies an [`Archive`] within an [`EntityGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchiveId(usize);

/// Identifies a [`TargetFile`] within an [`EntityGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(usize);

/// Supported container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveType {
    Jar,
    War,
    Ear,
    Zip,
    Tar,
}

impl ArchiveType {
    pub const ALL: [ArchiveType; 5] = [Self::Jar, Self::War, Self::Ear, Self::Zip, Self::Tar];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jar => "jar",
            Self::War => "war",
            Self::Ear => "ear",
            Self::Zip => "zip",
            Self::Tar => "tar",
        }
    }

    /// Java archives keep their manifest as the first entry.
    pub fn keeps_manifest_first(self) -> bool {
        matches!(self, Self::Jar | Self::War | Self::Ear)
    }

    /// Whether the container is read and written with the zip codec.
    pub fn is_zip_family(self) -> bool {
        !matches!(self, Self::Tar)
    }
}

impl FromStr for ArchiveType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| crate::Error::UnsupportedArchiveType(s.to_string()))
    }
}

impl fmt::Display for ArchiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named placeholder declared on a target file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub regex: bool,
    pub pattern: Option<String>,
    pub default: Option<String>,
}

impl Property {
    /// The expression matched against content in regex mode.
    pub fn pattern(&self) -> &str {
        self.pattern.as_deref().unwrap_or(&self.name)
    }
}

impl From<&PropertySpec> for Property {
    fn from(spec: &PropertySpec) -> Self {
        Self {
            name: spec.name.clone(),
            regex: spec.regex,
            pattern: spec.pattern.clone(),
            default: spec.default.clone(),
        }
    }
}

/// Root of one marker descriptor.
#[derive(Debug, Clone)]
pub struct Marker {
    path: PathBuf,
    begin_token: Option<String>,
    end_token: Option<String>,
    files: Vec<FileId>,
    archives: Vec<ArchiveId>,
}

impl Marker {
    /// Absolute path of the descriptor file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory that relative paths in the descriptor are resolved against.
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }

    pub fn begin_token(&self) -> Option<&str> {
        self.begin_token.as_deref()
    }

    pub fn end_token(&self) -> Option<&str> {
        self.end_token.as_deref()
    }

    /// Files declared directly on the filesystem.
    pub fn files(&self) -> &[FileId] {
        &self.files
    }

    /// Top-level archives.
    pub fn archives(&self) -> &[ArchiveId] {
        &self.archives
    }
}

/// Owner of an archive or file: a marker for filesystem paths, an archive
/// for entry paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parent {
    Marker(MarkerId),
    Archive(ArchiveId),
}

/// A packaged container that holds target files and other archives.
#[derive(Debug, Clone)]
pub struct Archive {
    relative_path: String,
    declared_type: String,
    begin_token: Option<String>,
    end_token: Option<String>,
    parent: Parent,
    files: Vec<FileId>,
    archives: Vec<ArchiveId>,
}

impl Archive {
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// The container type exactly as written in the descriptor.
    pub fn declared_type(&self) -> &str {
        &self.declared_type
    }

    /// The parsed container type, `None` when unsupported.
    pub fn archive_type(&self) -> Option<ArchiveType> {
        self.declared_type.parse().ok()
    }

    pub fn parent(&self) -> Parent {
        self.parent
    }

    pub fn files(&self) -> &[FileId] {
        &self.files
    }

    pub fn archives(&self) -> &[ArchiveId] {
        &self.archives
    }
}

/// Where a target file lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetLocation {
    /// A regular file; `path` is absolute.
    Filesystem { marker: MarkerId, path: PathBuf },
    /// An entry inside an archive.
    ArchiveEntry { archive: ArchiveId, entry: String },
}

/// A file that must be scanned for placeholders.
#[derive(Debug, Clone)]
pub struct TargetFile {
    relative_path: String,
    begin_token: Option<String>,
    end_token: Option<String>,
    filter: Option<String>,
    properties: Vec<Property>,
    location: TargetLocation,
}

impl TargetFile {
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Declared properties in descriptor order, duplicates included.
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// First declaration of the named property.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn location(&self) -> &TargetLocation {
        &self.location
    }

    /// Whether content must be scanned for delimited tokens.
    pub fn needs_tokens(&self) -> bool {
        self.properties.iter().any(|p| !p.regex)
    }
}

/// A unit of work for the replacement engine: a filesystem file or a
/// top-level archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    File(FileId),
    Archive(ArchiveId),
}

/// The loaded package.
#[derive(Debug, Clone, Default)]
pub struct EntityGraph {
    markers: Vec<Marker>,
    archives: Vec<Archive>,
    files: Vec<TargetFile>,
}

impl EntityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a marker descriptor.
    pub fn attach_marker(
        &mut self,
        path: PathBuf,
        begin_token: Option<String>,
        end_token: Option<String>,
    ) -> MarkerId {
        let id = MarkerId(self.markers.len());
        self.markers.push(Marker {
            path,
            begin_token,
            end_token,
            files: Vec::new(),
            archives: Vec::new(),
        });
        id
    }

    /// Attach an archive declaration to its owner. Nested files and archives
    /// of `spec` are not attached; the caller attaches them to the returned id.
    pub fn attach_archive(&mut self, spec: &ArchiveSpec, parent: Parent) -> ArchiveId {
        let id = ArchiveId(self.archives.len());
        let relative_path = match parent {
            Parent::Marker(_) => spec.path.clone(),
            Parent::Archive(_) => normalize_entry(&spec.path),
        };
        self.archives.push(Archive {
            relative_path,
            declared_type: spec.archive_type.clone(),
            begin_token: spec.begin_token.clone(),
            end_token: spec.end_token.clone(),
            parent,
            files: Vec::new(),
            archives: Vec::new(),
        });
        match parent {
            Parent::Marker(marker) => self.markers[marker.0].archives.push(id),
            Parent::Archive(archive) => self.archives[archive.0].archives.push(id),
        }
        id
    }

    /// Attach a file declaration to its owner.
    pub fn attach_file(&mut self, spec: &FileSpec, parent: Parent) -> FileId {
        let id = FileId(self.files.len());
        let location = match parent {
            Parent::Marker(marker) => TargetLocation::Filesystem {
                marker,
                path: normalize_path(&self.markers[marker.0].directory().join(&spec.path)),
            },
            Parent::Archive(archive) => TargetLocation::ArchiveEntry {
                archive,
                entry: normalize_entry(&spec.path),
            },
        };
        self.files.push(TargetFile {
            relative_path: spec.path.clone(),
            begin_token: spec.begin_token.clone(),
            end_token: spec.end_token.clone(),
            filter: spec.filter.clone(),
            properties: spec.properties.iter().map(Property::from).collect(),
            location,
        });
        match parent {
            Parent::Marker(marker) => self.markers[marker.0].files.push(id),
            Parent::Archive(archive) => self.archives[archive.0].files.push(id),
        }
        id
    }

    pub fn markers(&self) -> impl Iterator<Item = (MarkerId, &Marker)> {
        self.markers.iter().enumerate().map(|(i, m)| (MarkerId(i), m))
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn marker(&self, id: MarkerId) -> &Marker {
        &self.markers[id.0]
    }

    pub fn archive(&self, id: ArchiveId) -> &Archive {
        &self.archives[id.0]
    }

    pub fn file(&self, id: FileId) -> &TargetFile {
        &self.files[id.0]
    }

    /// Every file of a marker, including files inside (nested) archives.
    pub fn files_of(&self, marker: MarkerId) -> Vec<FileId> {
        let m = self.marker(marker);
        let mut files = m.files.clone();
        for archive in self.archives_of(marker) {
            files.extend_from_slice(&self.archive(archive).files);
        }
        files
    }

    /// Every archive of a marker, nested ones included, parents first.
    pub fn archives_of(&self, marker: MarkerId) -> Vec<ArchiveId> {
        let mut result = Vec::new();
        let mut stack: Vec<ArchiveId> = self.marker(marker).archives.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            result.push(id);
            stack.extend(self.archive(id).archives.iter().rev().copied());
        }
        result
    }

    /// Every archive contained in `archive`, at any depth.
    pub fn nested_archives(&self, archive: ArchiveId) -> Vec<ArchiveId> {
        let mut result = Vec::new();
        let mut stack: Vec<ArchiveId> = self.archive(archive).archives.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            result.push(id);
            stack.extend(self.archive(id).archives.iter().rev().copied());
        }
        result
    }

    /// The archive directly holding `file`, if any.
    pub fn parent_archive(&self, file: FileId) -> Option<ArchiveId> {
        match self.file(file).location {
            TargetLocation::Filesystem { .. } => None,
            TargetLocation::ArchiveEntry { archive, .. } => Some(archive),
        }
    }

    /// The marker owning `archive`, walking up through enclosing archives.
    pub fn archive_marker(&self, archive: ArchiveId) -> MarkerId {
        let mut current = archive;
        loop {
            match self.archive(current).parent {
                Parent::Marker(marker) => return marker,
                Parent::Archive(parent) => current = parent,
            }
        }
    }

    /// The marker owning `file`, walking up through its archive if present.
    pub fn file_marker(&self, file: FileId) -> MarkerId {
        match &self.file(file).location {
            TargetLocation::Filesystem { marker, .. } => *marker,
            TargetLocation::ArchiveEntry { archive, .. } => self.archive_marker(*archive),
        }
    }

    /// The outermost archive containing `archive` (possibly itself).
    pub fn top_level_archive(&self, archive: ArchiveId) -> ArchiveId {
        let mut current = archive;
        while let Parent::Archive(parent) = self.archive(current).parent {
            current = parent;
        }
        current
    }

    /// Absolute on-disk path of a top-level archive; for nested archives the
    /// path of the outermost archive that contains it.
    pub fn archive_disk_path(&self, archive: ArchiveId) -> PathBuf {
        let top = self.top_level_archive(archive);
        let marker = self.archive_marker(top);
        normalize_path(
            &self
                .marker(marker)
                .directory()
                .join(&self.archive(top).relative_path),
        )
    }

    /// Effective begin/end tokens for a file: file override, then the
    /// enclosing archives from the innermost outwards, then the marker.
    pub fn tokens_for(&self, file: FileId) -> Option<Tokens> {
        let target = self.file(file);
        let mut begin = target.begin_token.clone();
        let mut end = target.end_token.clone();

        let mut parent = match &target.location {
            TargetLocation::Filesystem { marker, .. } => Parent::Marker(*marker),
            TargetLocation::ArchiveEntry { archive, .. } => Parent::Archive(*archive),
        };
        while begin.is_none() || end.is_none() {
            match parent {
                Parent::Archive(id) => {
                    let archive = self.archive(id);
                    begin = begin.or_else(|| archive.begin_token.clone());
                    end = end.or_else(|| archive.end_token.clone());
                    parent = archive.parent;
                }
                Parent::Marker(id) => {
                    let marker = self.marker(id);
                    begin = begin.or_else(|| marker.begin_token.clone());
                    end = end.or_else(|| marker.end_token.clone());
                    break;
                }
            }
        }

        match (begin, end) {
            (Some(begin), Some(end)) if !begin.is_empty() && !end.is_empty() => {
                Some(Tokens { begin, end })
            }
            _ => None,
        }
    }

    /// Human readable location such as `lib/app.ear!lib/inner.jar`.
    pub fn archive_uri(&self, archive: ArchiveId) -> String {
        let a = self.archive(archive);
        match a.parent {
            Parent::Marker(_) => a.relative_path.clone(),
            Parent::Archive(parent) => format!("{}!{}", self.archive_uri(parent), a.relative_path),
        }
    }

    /// Human readable location such as `lib/app.jar!conf/app.properties`.
    pub fn file_uri(&self, file: FileId) -> String {
        let f = self.file(file);
        match &f.location {
            TargetLocation::Filesystem { .. } => f.relative_path.clone(),
            TargetLocation::ArchiveEntry { archive, entry } => {
                format!("{}!{}", self.archive_uri(*archive), entry)
            }
        }
    }

    /// Identity of the physical archive, used for duplicate detection.
    pub fn archive_key(&self, archive: ArchiveId) -> String {
        let a = self.archive(archive);
        match a.parent {
            Parent::Marker(_) => self.archive_disk_path(archive).display().to_string(),
            Parent::Archive(parent) => format!("{}!{}", self.archive_key(parent), a.relative_path),
        }
    }

    /// Identity of the physical file, used for duplicate detection.
    pub fn file_key(&self, file: FileId) -> String {
        match &self.file(file).location {
            TargetLocation::Filesystem { path, .. } => path.display().to_string(),
            TargetLocation::ArchiveEntry { archive, entry } => {
                format!("{}!{}", self.archive_key(*archive), entry)
            }
        }
    }

    /// Independent units of work: filesystem files and top-level archives of
    /// every marker, in marker order.
    pub fn artifacts(&self) -> Vec<Artifact> {
        let mut artifacts = Vec::new();
        for marker in &self.markers {
            artifacts.extend(marker.files.iter().copied().map(Artifact::File));
            artifacts.extend(marker.archives.iter().copied().map(Artifact::Archive));
        }
        artifacts
    }

    /// Human readable label of an artifact.
    pub fn artifact_uri(&self, artifact: Artifact) -> String {
        match artifact {
            Artifact::File(file) => self.file_uri(file),
            Artifact::Archive(archive) => self.archive_uri(archive),
        }
    }

    /// Files reachable from an artifact, at any archive depth.
    pub fn artifact_files(&self, artifact: Artifact) -> Vec<FileId> {
        match artifact {
            Artifact::File(file) => vec![file],
            Artifact::Archive(archive) => {
                let mut files = self.archive(archive).files.clone();
                for nested in self.nested_archives(archive) {
                    files.extend_from_slice(&self.archive(nested).files);
                }
                files
            }
        }
    }
}

/// Lexically resolve `.` and `..` components.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    result.push(component);
                }
            }
            other => result.push(other),
        }
    }
    result
}

/// Archive entry names never start with `/` or `./`.
pub(crate) fn normalize_entry(entry: &str) -> String {
    let mut entry = entry.trim();
    loop {
        if let Some(rest) = entry.strip_prefix("./") {
            entry = rest;
        } else if let Some(rest) = entry.strip_prefix('/') {
            entry = rest;
        } else {
            break;
        }
    }
    entry.to_string()
}
