// Copyright (c) Contributors to the Pacify project.
// SPDX-License-Identifier: Apache-2.0

//! Discovery of marker descriptors and construction of the entity graph.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::defect::describe;
use crate::model::{EntityGraph, Parent, TargetLocation};
use crate::spec::{ArchiveSpec, MarkerSpec};
use crate::{Defect, DefectSet, MARKER_SUFFIX};

#[cfg(test)]
#[path = "./discovery_test.rs"]
mod discovery_test;

/// Options for loading a package.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Accept a package without any marker descriptor.
    pub allow_empty: bool,
}

/// Find every marker descriptor below `root`, sorted by path.
pub fn find_markers(root: &Path) -> Vec<PathBuf> {
    let mut markers: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!("skipping unreadable path during discovery: {err}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(MARKER_SUFFIX))
        })
        .map(|entry| entry.into_path())
        .collect();
    markers.sort();
    markers
}

/// The loaded package: its entity graph and the defects found while
/// building it.
#[derive(Debug, Clone)]
pub struct EntityManager {
    root: PathBuf,
    graph: EntityGraph,
    defects: DefectSet,
}

impl EntityManager {
    /// Discover, parse and link every marker below `root`.
    ///
    /// Descriptors that fail to parse are reported as defects and skipped.
    pub fn initialize<P: AsRef<Path>>(root: P, options: &LoadOptions) -> crate::Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(crate::Error::PackageNotFound(root.to_path_buf()));
        }
        let root = dunce::canonicalize(root)?;

        let paths = find_markers(&root);
        tracing::debug!(root = %root.display(), count = paths.len(), "found marker files");
        if paths.is_empty() && !options.allow_empty {
            return Err(crate::Error::NoMarkerFound {
                path: root,
                suffix: MARKER_SUFFIX,
            });
        }

        let mut graph = EntityGraph::new();
        let mut defects = DefectSet::new();
        for path in paths {
            match MarkerSpec::load(&path) {
                Ok(spec) => attach_marker(&mut graph, path, &spec),
                Err(err) => {
                    tracing::warn!(marker = %path.display(), "marker could not be parsed");
                    defects.insert(Defect::MarkerNotParsable {
                        marker: path,
                        reason: describe(&err),
                    });
                }
            }
        }

        defects.extend(duplicate_defects(&graph));
        tracing::info!(
            markers = graph.marker_count(),
            defects = defects.len(),
            "package loaded"
        );
        Ok(Self {
            root,
            graph,
            defects,
        })
    }

    /// Canonical package root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn graph(&self) -> &EntityGraph {
        &self.graph
    }

    /// Defects found while loading.
    pub fn defects(&self) -> &DefectSet {
        &self.defects
    }
}

/// Attach a parsed descriptor and all of its children to the graph.
pub fn attach_marker(graph: &mut EntityGraph, path: PathBuf, spec: &MarkerSpec) {
    let marker = graph.attach_marker(path, spec.begin_token.clone(), spec.end_token.clone());
    for file in &spec.files {
        graph.attach_file(file, Parent::Marker(marker));
    }
    for archive in &spec.archives {
        attach_archive(graph, archive, Parent::Marker(marker));
    }
}

fn attach_archive(graph: &mut EntityGraph, spec: &ArchiveSpec, parent: Parent) {
    let archive = graph.attach_archive(spec, parent);
    for file in &spec.files {
        graph.attach_file(file, Parent::Archive(archive));
    }
    for nested in &spec.archives {
        attach_archive(graph, nested, Parent::Archive(archive));
    }
}

/// Every duplicate declaration in the graph.
pub fn duplicate_defects(graph: &EntityGraph) -> Vec<Defect> {
    let mut defects = file_duplicates(graph);
    defects.extend(archive_duplicates(graph));
    defects.extend(property_duplicates(graph));
    defects
}

/// The same physical file declared more than once, within one marker or
/// across markers.
pub fn file_duplicates(graph: &EntityGraph) -> Vec<Defect> {
    let mut defects = Vec::new();
    let mut seen = HashMap::new();
    for (marker, _) in graph.markers() {
        for file in graph.files_of(marker) {
            let key = graph.file_key(file);
            match seen.get(&key) {
                None => {
                    seen.insert(key, marker);
                }
                Some(first) => defects.push(Defect::FileDuplicateDefinedInMarker {
                    marker: graph.marker(marker).path().to_path_buf(),
                    other_marker: graph.marker(*first).path().to_path_buf(),
                    archive: graph.parent_archive(file).map(|a| graph.archive_uri(a)),
                    file: graph.file_uri(file),
                }),
            }
        }
    }
    defects
}

/// The same physical archive declared more than once. A top-level archive
/// that is also declared as a plain file counts as a duplicate too.
pub fn archive_duplicates(graph: &EntityGraph) -> Vec<Defect> {
    let mut defects = Vec::new();
    let mut plain_files = HashMap::new();
    for (marker, _) in graph.markers() {
        for file in graph.files_of(marker) {
            if let TargetLocation::Filesystem { .. } = graph.file(file).location() {
                plain_files.entry(graph.file_key(file)).or_insert(marker);
            }
        }
    }

    let mut seen = HashMap::new();
    for (marker, _) in graph.markers() {
        for archive in graph.archives_of(marker) {
            let key = graph.archive_key(archive);
            let top_level = matches!(graph.archive(archive).parent(), Parent::Marker(_));
            if let Some(file_marker) = plain_files.get(&key).filter(|_| top_level) {
                defects.push(Defect::ArchiveDuplicateDefinedInMarker {
                    marker: graph.marker(marker).path().to_path_buf(),
                    other_marker: graph.marker(*file_marker).path().to_path_buf(),
                    archive: graph.archive_uri(archive),
                });
            }
            match seen.get(&key) {
                None => {
                    seen.insert(key, marker);
                }
                Some(first) => defects.push(Defect::ArchiveDuplicateDefinedInMarker {
                    marker: graph.marker(marker).path().to_path_buf(),
                    other_marker: graph.marker(*first).path().to_path_buf(),
                    archive: graph.archive_uri(archive),
                }),
            }
        }
    }
    defects
}

/// A property identifier declared twice on the same file.
pub fn property_duplicates(graph: &EntityGraph) -> Vec<Defect> {
    let mut defects = Vec::new();
    for (marker, m) in graph.markers() {
        for file in graph.files_of(marker) {
            let mut names = HashSet::new();
            for property in graph.file(file).properties() {
                if !names.insert(property.name.as_str()) {
                    defects.push(Defect::PropertyDuplicateDefinedInMarker {
                        marker: m.path().to_path_buf(),
                        file: graph.file_uri(file),
                        property: property.name.clone(),
                    });
                }
            }
        }
    }
    defects
}
