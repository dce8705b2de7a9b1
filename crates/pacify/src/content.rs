// Copyright (c) Contributors to the Pacify project.
// SPDX-License-Identifier: Apache-2.0

//! Read-only view of the current content of target files.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, Cursor};

use crate::archive::{for_each_entry, EntryVisitor};
use crate::defect::describe;
use crate::filter::FilterRegistry;
use crate::model::{ArchiveId, Artifact, EntityGraph, FileId, TargetLocation};
use crate::Defect;

#[cfg(test)]
#[path = "./content_test.rs"]
mod content_test;

/// Decoded content of every readable target file of a set of artifacts,
/// plus the entry names of every archive that could be opened.
///
/// Missing files and archives are skipped silently; reporting them is the
/// job of the existence check.
#[derive(Debug, Default)]
pub struct ContentSnapshot {
    contents: HashMap<FileId, String>,
    entries: HashMap<ArchiveId, BTreeSet<String>>,
    defects: Vec<Defect>,
}

impl ContentSnapshot {
    pub fn load(graph: &EntityGraph, filters: &FilterRegistry, artifacts: &[Artifact]) -> Self {
        let mut snapshot = Self::default();
        for artifact in artifacts {
            match *artifact {
                Artifact::File(file) => snapshot.load_file(graph, filters, file),
                Artifact::Archive(archive) => snapshot.load_archive(graph, filters, archive),
            }
        }
        snapshot
    }

    /// Decoded content of a file, if it was readable.
    pub fn content(&self, file: FileId) -> Option<&str> {
        self.contents.get(&file).map(String::as_str)
    }

    /// Files with content, in id order.
    pub fn files(&self) -> Vec<FileId> {
        let mut files: Vec<FileId> = self.contents.keys().copied().collect();
        files.sort();
        files
    }

    /// Names of the regular entries of an archive, `None` if the archive
    /// itself could not be opened.
    pub fn archive_entries(&self, archive: ArchiveId) -> Option<&BTreeSet<String>> {
        self.entries.get(&archive)
    }

    /// Read or decode failures.
    pub fn defects(&self) -> &[Defect] {
        &self.defects
    }

    fn load_file(&mut self, graph: &EntityGraph, filters: &FilterRegistry, file: FileId) {
        let TargetLocation::Filesystem { marker, path } = graph.file(file).location() else {
            return;
        };
        if !path.is_file() {
            return;
        }
        match std::fs::read(path) {
            Ok(bytes) => self.store(graph, filters, file, bytes),
            Err(err) => self.defects.push(Defect::ArtifactIo {
                marker: graph.marker(*marker).path().to_path_buf(),
                artifact: graph.file_uri(file),
                reason: describe(&err),
            }),
        }
    }

    fn load_archive(&mut self, graph: &EntityGraph, filters: &FilterRegistry, archive: ArchiveId) {
        let Some(kind) = graph.archive(archive).archive_type() else {
            return;
        };
        let path = graph.archive_disk_path(archive);
        if !path.is_file() {
            return;
        }
        let result = File::open(&path)
            .map_err(crate::Error::from)
            .and_then(|file| {
                let mut visitor = SnapshotVisitor::new(graph, filters, archive, self);
                for_each_entry(kind, BufReader::new(file), &mut visitor)?;
                visitor.finish();
                Ok(())
            });
        if let Err(err) = result {
            self.archive_failed(graph, archive, &err);
        }
    }

    fn store(&mut self, graph: &EntityGraph, filters: &FilterRegistry, file: FileId, bytes: Vec<u8>) {
        let Some(filter) = filters.get(graph.file(file).filter()) else {
            return;
        };
        match filter.decode(bytes) {
            Ok(content) => {
                self.contents.insert(file, content);
            }
            Err(_) => {
                let uri = graph.file_uri(file);
                self.defects.push(Defect::ArtifactIo {
                    marker: graph.marker(graph.file_marker(file)).path().to_path_buf(),
                    reason: crate::Error::InvalidEncoding(uri.clone()).to_string(),
                    artifact: uri,
                });
            }
        }
    }

    fn archive_failed(&mut self, graph: &EntityGraph, archive: ArchiveId, err: &crate::Error) {
        tracing::warn!(archive = %graph.archive_uri(archive), "archive could not be read: {err}");
        self.defects.push(Defect::ArtifactIo {
            marker: graph.marker(graph.archive_marker(archive)).path().to_path_buf(),
            artifact: graph.archive_uri(archive),
            reason: describe(err),
        });
    }
}

struct SnapshotVisitor<'a> {
    graph: &'a EntityGraph,
    filters: &'a FilterRegistry,
    archive: ArchiveId,
    snapshot: &'a mut ContentSnapshot,
    files: HashMap<String, FileId>,
    nested: HashMap<String, ArchiveId>,
    names: BTreeSet<String>,
}

impl<'a> SnapshotVisitor<'a> {
    fn new(
        graph: &'a EntityGraph,
        filters: &'a FilterRegistry,
        archive: ArchiveId,
        snapshot: &'a mut ContentSnapshot,
    ) -> Self {
        Self {
            graph,
            filters,
            archive,
            snapshot,
            files: entry_files(graph, archive),
            nested: entry_archives(graph, archive),
            names: BTreeSet::new(),
        }
    }

    fn finish(self) {
        self.snapshot.entries.insert(self.archive, self.names);
    }
}

impl EntryVisitor for SnapshotVisitor<'_> {
    fn wants(&mut self, name: &str) -> bool {
        self.names.insert(name.to_string());
        self.files.contains_key(name) || self.nested.contains_key(name)
    }

    fn visit(&mut self, name: &str, data: &[u8]) -> crate::Result<Option<Vec<u8>>> {
        if let Some(file) = self.files.get(name) {
            self.snapshot
                .store(self.graph, self.filters, *file, data.to_vec());
        }
        if let Some(nested) = self.nested.get(name).copied() {
            let Some(kind) = self.graph.archive(nested).archive_type() else {
                return Ok(None);
            };
            let mut child = SnapshotVisitor::new(self.graph, self.filters, nested, self.snapshot);
            match for_each_entry(kind, Cursor::new(data), &mut child) {
                Ok(()) => child.finish(),
                Err(err) => {
                    drop(child);
                    self.snapshot.archive_failed(self.graph, nested, &err);
                }
            }
        }
        Ok(None)
    }
}

/// Declared target files of an archive keyed by entry name.
pub(crate) fn entry_files(graph: &EntityGraph, archive: ArchiveId) -> HashMap<String, FileId> {
    graph
        .archive(archive)
        .files()
        .iter()
        .filter_map(|file| match graph.file(*file).location() {
            TargetLocation::ArchiveEntry { entry, .. } => Some((entry.clone(), *file)),
            TargetLocation::Filesystem { .. } => None,
        })
        .collect()
}

/// Declared nested archives of an archive keyed by entry name.
pub(crate) fn entry_archives(graph: &EntityGraph, archive: ArchiveId) -> HashMap<String, ArchiveId> {
    graph
        .archive(archive)
        .archives()
        .iter()
        .map(|nested| (graph.archive(*nested).relative_path().to_string(), *nested))
        .collect()
}
