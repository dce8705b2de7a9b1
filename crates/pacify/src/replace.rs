// Copyright (c) Contributors to the Pacify project.
// SPDX-License-Identifier: Apache-2.0

//! Token substitution in plain files and nested archives.
//!
//! Every top-level artifact (a filesystem file or a top-level archive) is
//! processed independently on a bounded worker pool. An artifact is written
//! through a temporary file in the same directory and only replaces the
//! original when it was processed without any defect.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Write};
use std::ops::Range;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use regex::{NoExpand, Regex};
use tempfile::NamedTempFile;

use crate::archive::{self, EntryVisitor};
use crate::check::{matches_in, undeclared_placeholders, unused_properties};
use crate::content::{entry_archives, entry_files};
use crate::defect::describe;
use crate::filter::FilterRegistry;
use crate::model::{ArchiveId, Artifact, EntityGraph, FileId, TargetLocation};
use crate::resolver::{PropertyResolveManager, Resolution};
use crate::token::{find_placeholders, substitute, Placeholder};
use crate::{Defect, DefectSet, Validator};

#[cfg(test)]
#[path = "./replace_test.rs"]
mod replace_test;

/// How unresolvable properties are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplaceMode {
    /// Every token property must be replaced.
    #[default]
    Replace,
    /// Substitute what is known and leave the remaining tokens for a later
    /// run, without reporting them.
    PreConfigure,
}

/// Options for a replacement run.
#[derive(Debug, Clone, Default)]
pub struct ReplaceOptions {
    pub mode: ReplaceMode,
    /// Worker threads, 0 picks one per core.
    pub threads: usize,
}

/// What happened to one artifact.
#[derive(Debug, Default)]
struct Outcome {
    defects: Vec<Defect>,
    written: bool,
}

/// Drives substitution over a whole entity graph.
pub struct Replacer<'a> {
    resolvers: &'a PropertyResolveManager,
    filters: &'a FilterRegistry,
    options: ReplaceOptions,
}

impl<'a> Replacer<'a> {
    pub fn new(
        resolvers: &'a PropertyResolveManager,
        filters: &'a FilterRegistry,
        options: ReplaceOptions,
    ) -> Self {
        Self {
            resolvers,
            filters,
            options,
        }
    }

    /// Replace every declared property of the package.
    ///
    /// Structural defects stop the run before anything is written. The
    /// returned set holds every defect of the run; it is empty when the
    /// package was fully processed.
    pub fn replace(&self, graph: &EntityGraph) -> crate::Result<DefectSet> {
        let mut defects = Validator::structural().validate(graph, self.resolvers, self.filters);
        if !defects.is_empty() {
            tracing::warn!(defects = defects.len(), "structural defects found, nothing replaced");
            return Ok(defects);
        }

        let artifacts = graph.artifacts();
        let abort = AtomicBool::new(false);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.threads)
            .build()?;
        let outcomes: Vec<Outcome> = pool.install(|| {
            artifacts
                .par_iter()
                .map(|artifact| self.process(graph, *artifact, &abort))
                .collect()
        });

        let mut written = Vec::new();
        for (artifact, outcome) in artifacts.iter().zip(outcomes) {
            if outcome.written {
                written.push(*artifact);
            }
            defects.extend(outcome.defects);
        }

        if !written.is_empty() {
            let post = Validator::post_replacement().validate_scope(
                graph,
                self.resolvers,
                self.filters,
                &written,
            );
            defects.extend(post);
        }
        defects.extend(self.resolvers.check_for_duplicates());

        tracing::info!(
            artifacts = artifacts.len(),
            written = written.len(),
            defects = defects.len(),
            "replacement finished"
        );
        Ok(defects)
    }

    fn process(&self, graph: &EntityGraph, artifact: Artifact, abort: &AtomicBool) -> Outcome {
        let uri = graph.artifact_uri(artifact);
        if abort.load(Ordering::SeqCst) {
            tracing::warn!(artifact = %uri, "skipped after fatal defect");
            let marker = match artifact {
                Artifact::File(file) => graph.file_marker(file),
                Artifact::Archive(archive) => graph.archive_marker(archive),
            };
            return Outcome {
                defects: vec![Defect::ArtifactSkipped {
                    marker: graph.marker(marker).path().to_path_buf(),
                    artifact: uri,
                }],
                written: false,
            };
        }
        tracing::debug!(artifact = %uri, "processing");
        match artifact {
            Artifact::File(file) => self.process_file(graph, file, abort),
            Artifact::Archive(archive) => self.process_archive(graph, archive, abort),
        }
    }

    fn process_file(&self, graph: &EntityGraph, file: FileId, abort: &AtomicBool) -> Outcome {
        let mut outcome = Outcome::default();
        let TargetLocation::Filesystem { marker, path } = graph.file(file).location() else {
            return outcome;
        };
        let io_defect = |err: &dyn std::error::Error| Defect::ArtifactIo {
            marker: graph.marker(*marker).path().to_path_buf(),
            artifact: graph.file_uri(file),
            reason: describe(err),
        };

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                outcome.defects.push(io_defect(&err));
                return outcome;
            }
        };
        let replaced = self.transform(graph, file, bytes, abort, &mut outcome.defects);
        if !outcome.defects.is_empty() {
            return outcome;
        }
        if let Some(content) = replaced {
            match write_atomic(path, |out| out.write_all(&content)) {
                Ok(()) => outcome.written = true,
                Err(err) => outcome.defects.push(io_defect(&err)),
            }
        }
        outcome
    }

    fn process_archive(&self, graph: &EntityGraph, archive: ArchiveId, abort: &AtomicBool) -> Outcome {
        let mut outcome = Outcome::default();
        let Some(kind) = graph.archive(archive).archive_type() else {
            return outcome;
        };
        let path = graph.archive_disk_path(archive);
        let io_defect = |reason: String| Defect::ArtifactIo {
            marker: graph.marker(graph.archive_marker(archive)).path().to_path_buf(),
            artifact: graph.archive_uri(archive),
            reason,
        };

        let source = match File::open(&path) {
            Ok(file) => BufReader::new(file),
            Err(err) => {
                outcome.defects.push(io_defect(describe(&err)));
                return outcome;
            }
        };
        let Some(parent) = path.parent() else {
            return outcome;
        };
        let temp = match NamedTempFile::new_in(parent) {
            Ok(temp) => temp,
            Err(err) => {
                outcome.defects.push(io_defect(describe(&err)));
                return outcome;
            }
        };

        let mut visitor = ReplaceVisitor::new(self, graph, abort, archive);
        let temp = match archive::rewrite(kind, source, temp, &mut visitor) {
            Ok(temp) => temp,
            Err(err) => {
                outcome.defects.extend(visitor.defects);
                outcome.defects.push(io_defect(describe(&err)));
                return outcome;
            }
        };
        outcome.defects.extend(visitor.defects);
        if !outcome.defects.is_empty() || !visitor.changed {
            // dropping the temporary file removes it
            return outcome;
        }

        match persist(temp, &path) {
            Ok(()) => outcome.written = true,
            Err(err) => outcome.defects.push(io_defect(describe(&err))),
        }
        outcome
    }

    /// Substitute the properties of one file. Returns the new bytes when the
    /// content changed. A cyclic reference raises `abort`.
    fn transform(
        &self,
        graph: &EntityGraph,
        file: FileId,
        bytes: Vec<u8>,
        abort: &AtomicBool,
        defects: &mut Vec<Defect>,
    ) -> Option<Vec<u8>> {
        let target = graph.file(file);
        let marker = graph.marker(graph.file_marker(file)).path();
        let filter = self.filters.get(target.filter())?;

        let content = match filter.decode(bytes) {
            Ok(content) => content,
            Err(_) => {
                let uri = graph.file_uri(file);
                defects.push(Defect::ArtifactIo {
                    marker: marker.to_path_buf(),
                    reason: crate::Error::InvalidEncoding(uri.clone()).to_string(),
                    artifact: uri,
                });
                return None;
            }
        };
        let ranges = filter.scannable(&content);
        let scanned = graph
            .tokens_for(file)
            .map(|tokens| find_placeholders(&content, &ranges, &tokens));
        let placeholders = scanned.as_deref().unwrap_or_default();

        defects.extend(undeclared_placeholders(graph, file, placeholders));
        defects.extend(unused_properties(graph, file, &content, &ranges, scanned.as_deref()));

        let mut values = HashMap::new();
        let mut patterns = Vec::new();
        for property in target.properties() {
            if values.contains_key(property.name.as_str()) {
                continue;
            }
            let regex = if property.regex {
                match Regex::new(property.pattern()) {
                    Ok(re) => Some(re),
                    Err(_) => continue,
                }
            } else {
                None
            };
            let present = match &regex {
                Some(re) => matches_in(&content, &ranges, re),
                None => placeholders.iter().any(|p| p.name == property.name),
            };

            match self.resolvers.resolve_property(property) {
                Resolution::Resolved(value) => {
                    if let Some(re) = regex {
                        patterns.push((re, value.clone()));
                    }
                    values.insert(property.name.as_str(), value);
                }
                Resolution::Unresolved => {
                    if present && self.options.mode == ReplaceMode::Replace {
                        defects.push(Defect::NotReplacedProperty {
                            marker: marker.to_path_buf(),
                            file: graph.file_uri(file),
                            property: property.name.clone(),
                        });
                    }
                }
                Resolution::Cyclic(chain) => {
                    tracing::error!(property = %property.name, "cyclic property reference");
                    abort.store(true, Ordering::SeqCst);
                    defects.push(Defect::CyclicPropertyReference {
                        marker: marker.to_path_buf(),
                        file: graph.file_uri(file),
                        property: property.name.clone(),
                        chain,
                    });
                }
            }
        }

        let token_values: HashMap<&str, &String> = target
            .properties()
            .iter()
            .filter(|p| !p.regex)
            .filter_map(|p| values.get(p.name.as_str()).map(|v| (p.name.as_str(), v)))
            .collect();
        let output = render(&content, &ranges, placeholders, &token_values, &patterns);
        if output == content {
            return None;
        }
        tracing::debug!(file = %graph.file_uri(file), "content replaced");
        Some(filter.encode(output))
    }
}

/// Apply token values and regex replacements inside the scannable ranges.
fn render(
    content: &str,
    ranges: &[Range<usize>],
    placeholders: &[Placeholder],
    values: &HashMap<&str, &String>,
    patterns: &[(Regex, String)],
) -> String {
    let mut out = String::with_capacity(content.len());
    let mut last = 0;
    for range in ranges {
        out.push_str(&content[last..range.start]);
        let mut segment = substitute(content, range.clone(), placeholders, |name| {
            values.get(name).map(|value| value.to_string())
        });
        for (re, value) in patterns {
            segment = re.replace_all(&segment, NoExpand(value)).into_owned();
        }
        out.push_str(&segment);
        last = range.end;
    }
    out.push_str(&content[last..]);
    out
}

/// Rewrites the entries of one archive, recursing into nested archives.
struct ReplaceVisitor<'r, 'a> {
    replacer: &'r Replacer<'a>,
    graph: &'r EntityGraph,
    abort: &'r AtomicBool,
    files: HashMap<String, FileId>,
    nested: HashMap<String, ArchiveId>,
    defects: Vec<Defect>,
    changed: bool,
}

impl<'r, 'a> ReplaceVisitor<'r, 'a> {
    fn new(
        replacer: &'r Replacer<'a>,
        graph: &'r EntityGraph,
        abort: &'r AtomicBool,
        archive: ArchiveId,
    ) -> Self {
        Self {
            replacer,
            graph,
            abort,
            files: entry_files(graph, archive),
            nested: entry_archives(graph, archive),
            defects: Vec::new(),
            changed: false,
        }
    }
}

impl EntryVisitor for ReplaceVisitor<'_, '_> {
    fn wants(&mut self, name: &str) -> bool {
        self.files.contains_key(name) || self.nested.contains_key(name)
    }

    fn visit(&mut self, name: &str, data: &[u8]) -> crate::Result<Option<Vec<u8>>> {
        if let Some(file) = self.files.get(name).copied() {
            let replaced = self
                .replacer
                .transform(self.graph, file, data.to_vec(), self.abort, &mut self.defects);
            self.changed |= replaced.is_some();
            return Ok(replaced);
        }

        let Some(nested) = self.nested.get(name).copied() else {
            return Ok(None);
        };
        let Some(kind) = self.graph.archive(nested).archive_type() else {
            return Ok(None);
        };
        let mut child = ReplaceVisitor::new(self.replacer, self.graph, self.abort, nested);
        let output = archive::rewrite(kind, Cursor::new(data), Cursor::new(Vec::new()), &mut child)?;
        self.defects.append(&mut child.defects);
        if !child.changed {
            return Ok(None);
        }
        self.changed = true;
        Ok(Some(output.into_inner()))
    }
}

/// Write through a temporary sibling file that replaces `path` on success,
/// keeping the original permissions.
fn write_atomic<F>(path: &Path, write: F) -> crate::Result<()>
where
    F: FnOnce(&mut NamedTempFile) -> std::io::Result<()>,
{
    let parent = path.parent().unwrap_or(Path::new("."));
    let mut temp = NamedTempFile::new_in(parent)?;
    write(&mut temp)?;
    persist(temp, path)
}

fn persist(temp: NamedTempFile, path: &Path) -> crate::Result<()> {
    temp.as_file().sync_all()?;
    if let Ok(metadata) = std::fs::metadata(path) {
        std::fs::set_permissions(temp.path(), metadata.permissions())?;
    }
    temp.persist(path).map_err(|err| crate::Error::WriteFailed {
        path: path.to_path_buf(),
        error: err.error,
    })?;
    Ok(())
}
