// Copyright (c) Contributors to the Pacify project.
// SPDX-License-Identifier: Apache-2.0

//! Individual checks run by the [`crate::Validator`].

use std::collections::HashSet;
use std::ops::Range;

use regex::Regex;

use crate::content::ContentSnapshot;
use crate::discovery;
use crate::filter::FilterRegistry;
use crate::model::{EntityGraph, FileId, Parent, TargetLocation};
use crate::resolver::{PropertyResolveManager, Resolution};
use crate::token::{find_placeholders, Placeholder};
use crate::Defect;

#[cfg(test)]
#[path = "./check_test.rs"]
mod check_test;

/// When a check runs relative to the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckPhase {
    /// Needs the graph and the filesystem layout only.
    Structural,
    /// Needs file content or resolved property values.
    Content,
}

/// Everything a check may look at.
pub struct CheckContext<'a> {
    pub graph: &'a EntityGraph,
    pub resolvers: &'a PropertyResolveManager,
    pub filters: &'a FilterRegistry,
    pub snapshot: &'a ContentSnapshot,
}

impl CheckContext<'_> {
    fn marker_path(&self, file: FileId) -> std::path::PathBuf {
        self.graph
            .marker(self.graph.file_marker(file))
            .path()
            .to_path_buf()
    }
}

/// A pluggable unit that produces defects.
pub trait Check: Send + Sync {
    fn name(&self) -> &'static str;

    fn phase(&self) -> CheckPhase;

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Defect>;
}

/// Archive types must be one of the supported kinds.
pub struct ArchiveTypeCheck;

impl Check for ArchiveTypeCheck {
    fn name(&self) -> &'static str {
        "archive-type"
    }

    fn phase(&self) -> CheckPhase {
        CheckPhase::Structural
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Defect> {
        let graph = ctx.graph;
        let mut defects = Vec::new();
        for (marker, m) in graph.markers() {
            for archive in graph.archives_of(marker) {
                let a = graph.archive(archive);
                if a.archive_type().is_none() {
                    defects.push(Defect::ArchiveTypeNotImplemented {
                        marker: m.path().to_path_buf(),
                        archive: graph.archive_uri(archive),
                        declared_type: a.declared_type().to_string(),
                    });
                }
            }
        }
        defects
    }
}

/// Duplicate file, archive and property declarations.
pub struct DuplicateCheck;

impl Check for DuplicateCheck {
    fn name(&self) -> &'static str {
        "duplicates"
    }

    fn phase(&self) -> CheckPhase {
        CheckPhase::Structural
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Defect> {
        discovery::duplicate_defects(ctx.graph)
    }
}

/// Every declared file and archive exists.
pub struct TargetFileExistCheck;

impl Check for TargetFileExistCheck {
    fn name(&self) -> &'static str {
        "target-file-exist"
    }

    fn phase(&self) -> CheckPhase {
        CheckPhase::Structural
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Defect> {
        let graph = ctx.graph;
        let mut defects = Vec::new();
        for (marker, m) in graph.markers() {
            for archive in graph.archives_of(marker) {
                let a = graph.archive(archive);
                let exists = match a.parent() {
                    Parent::Marker(_) => Some(graph.archive_disk_path(archive).is_file()),
                    Parent::Archive(parent) => ctx
                        .snapshot
                        .archive_entries(parent)
                        .map(|names| names.contains(a.relative_path())),
                };
                if exists == Some(false) {
                    defects.push(Defect::FileDoesNotExist {
                        marker: m.path().to_path_buf(),
                        file: graph.archive_uri(archive),
                    });
                }
            }

            for file in graph.files_of(marker) {
                let exists = match graph.file(file).location() {
                    TargetLocation::Filesystem { path, .. } => Some(path.is_file()),
                    TargetLocation::ArchiveEntry { archive, entry } => ctx
                        .snapshot
                        .archive_entries(*archive)
                        .map(|names| names.contains(entry)),
                };
                if exists == Some(false) {
                    defects.push(Defect::FileDoesNotExist {
                        marker: m.path().to_path_buf(),
                        file: graph.file_uri(file),
                    });
                }
            }
        }
        defects
    }
}

/// Declared filters are registered.
pub struct FilterCheck;

impl Check for FilterCheck {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn phase(&self) -> CheckPhase {
        CheckPhase::Structural
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Defect> {
        let graph = ctx.graph;
        let mut defects = Vec::new();
        for (marker, m) in graph.markers() {
            for file in graph.files_of(marker) {
                if let Some(filter) = graph.file(file).filter() {
                    if !ctx.filters.contains(filter) {
                        defects.push(Defect::FilterNotFound {
                            marker: m.path().to_path_buf(),
                            file: graph.file_uri(file),
                            filter: filter.to_string(),
                        });
                    }
                }
            }
        }
        defects
    }
}

/// Files with token properties have effective begin and end tokens.
pub struct TokenCheck;

impl Check for TokenCheck {
    fn name(&self) -> &'static str {
        "tokens"
    }

    fn phase(&self) -> CheckPhase {
        CheckPhase::Structural
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Defect> {
        let graph = ctx.graph;
        let mut defects = Vec::new();
        for (marker, m) in graph.markers() {
            for file in graph.files_of(marker) {
                if graph.file(file).needs_tokens() && graph.tokens_for(file).is_none() {
                    defects.push(Defect::TokenNotDefined {
                        marker: m.path().to_path_buf(),
                        file: graph.file_uri(file),
                    });
                }
            }
        }
        defects
    }
}

/// Regex mode patterns compile.
pub struct PropertyPatternCheck;

impl Check for PropertyPatternCheck {
    fn name(&self) -> &'static str {
        "property-pattern"
    }

    fn phase(&self) -> CheckPhase {
        CheckPhase::Structural
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Defect> {
        let graph = ctx.graph;
        let mut defects = Vec::new();
        for (marker, m) in graph.markers() {
            for file in graph.files_of(marker) {
                for property in graph.file(file).properties().iter().filter(|p| p.regex) {
                    if let Err(err) = Regex::new(property.pattern()) {
                        defects.push(Defect::InvalidPropertyPattern {
                            marker: m.path().to_path_buf(),
                            file: graph.file_uri(file),
                            property: property.name.clone(),
                            pattern: property.pattern().to_string(),
                            reason: err.to_string(),
                        });
                    }
                }
            }
        }
        defects
    }
}

/// Placeholders present in content are declared.
pub struct PlaceholderDefinedCheck;

impl Check for PlaceholderDefinedCheck {
    fn name(&self) -> &'static str {
        "placeholder-defined"
    }

    fn phase(&self) -> CheckPhase {
        CheckPhase::Content
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Defect> {
        let mut defects = Vec::new();
        for file in ctx.snapshot.files() {
            let Some(scan) = Scan::new(ctx, file) else {
                continue;
            };
            defects.extend(undeclared_placeholders(ctx.graph, file, scan.placeholders()));
        }
        defects
    }
}

/// Declared properties occur in content.
pub struct PlaceholderUsedCheck;

impl Check for PlaceholderUsedCheck {
    fn name(&self) -> &'static str {
        "placeholder-used"
    }

    fn phase(&self) -> CheckPhase {
        CheckPhase::Content
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Defect> {
        let mut defects = Vec::new();
        for file in ctx.snapshot.files() {
            let Some(scan) = Scan::new(ctx, file) else {
                continue;
            };
            defects.extend(unused_properties(
                ctx.graph,
                file,
                scan.content,
                &scan.ranges,
                scan.placeholders.as_deref(),
            ));
        }
        defects
    }
}

/// Declared properties resolve without cycles.
pub struct PropertyResolvableCheck;

impl Check for PropertyResolvableCheck {
    fn name(&self) -> &'static str {
        "property-resolvable"
    }

    fn phase(&self) -> CheckPhase {
        CheckPhase::Content
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Defect> {
        let graph = ctx.graph;
        let mut defects = Vec::new();
        for (marker, m) in graph.markers() {
            for file in graph.files_of(marker) {
                for property in graph.file(file).properties() {
                    match ctx.resolvers.resolve_property(property) {
                        Resolution::Resolved(_) => {}
                        Resolution::Unresolved => defects.push(Defect::PropertyNotFound {
                            marker: m.path().to_path_buf(),
                            file: graph.file_uri(file),
                            property: property.name.clone(),
                        }),
                        Resolution::Cyclic(chain) => {
                            defects.push(Defect::CyclicPropertyReference {
                                marker: m.path().to_path_buf(),
                                file: graph.file_uri(file),
                                property: property.name.clone(),
                                chain,
                            })
                        }
                    }
                }
            }
        }
        defects
    }
}

/// Property sources do not define an identifier twice.
pub struct ResolverDuplicateCheck;

impl Check for ResolverDuplicateCheck {
    fn name(&self) -> &'static str {
        "resolver-duplicates"
    }

    fn phase(&self) -> CheckPhase {
        CheckPhase::Content
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Defect> {
        ctx.resolvers.check_for_duplicates()
    }
}

/// No token of a resolvable property survives in content.
pub struct NotReplacedCheck;

impl Check for NotReplacedCheck {
    fn name(&self) -> &'static str {
        "not-replaced"
    }

    fn phase(&self) -> CheckPhase {
        CheckPhase::Content
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Defect> {
        let mut defects = Vec::new();
        for file in ctx.snapshot.files() {
            let Some(scan) = Scan::new(ctx, file) else {
                continue;
            };
            let target = ctx.graph.file(file);
            let surviving: HashSet<&str> = scan.placeholders().iter().map(|p| p.name.as_str()).collect();
            for property in target.properties().iter().filter(|p| !p.regex) {
                if !surviving.contains(property.name.as_str()) {
                    continue;
                }
                // deliberately unresolved properties are left alone
                if let Resolution::Resolved(_) = ctx.resolvers.resolve_property(property) {
                    defects.push(Defect::NotReplacedProperty {
                        marker: ctx.marker_path(file),
                        file: ctx.graph.file_uri(file),
                        property: property.name.clone(),
                    });
                }
            }
        }
        defects
    }
}

/// Token scan of one file's snapshot content.
struct Scan<'a> {
    content: &'a str,
    ranges: Vec<Range<usize>>,
    /// `None` when the file has no effective tokens.
    placeholders: Option<Vec<Placeholder>>,
}

impl<'a> Scan<'a> {
    fn new(ctx: &CheckContext<'a>, file: FileId) -> Option<Self> {
        let content = ctx.snapshot.content(file)?;
        let filter = ctx.filters.get(ctx.graph.file(file).filter())?;
        let ranges = filter.scannable(content);
        let placeholders = ctx
            .graph
            .tokens_for(file)
            .map(|tokens| find_placeholders(content, &ranges, &tokens));
        Some(Self {
            content,
            ranges,
            placeholders,
        })
    }

    fn placeholders(&self) -> &[Placeholder] {
        self.placeholders.as_deref().unwrap_or_default()
    }
}

/// `PlaceholderNotDefined` for every placeholder without a declared token
/// property.
pub(crate) fn undeclared_placeholders(
    graph: &EntityGraph,
    file: FileId,
    placeholders: &[Placeholder],
) -> Vec<Defect> {
    let target = graph.file(file);
    let declared: HashSet<&str> = target
        .properties()
        .iter()
        .filter(|p| !p.regex)
        .map(|p| p.name.as_str())
        .collect();
    let marker = graph.marker(graph.file_marker(file)).path();

    let mut reported = HashSet::new();
    placeholders
        .iter()
        .filter(|p| !declared.contains(p.name.as_str()))
        .filter(|p| reported.insert(p.name.as_str()))
        .map(|p| Defect::PlaceholderNotDefined {
            marker: marker.to_path_buf(),
            file: graph.file_uri(file),
            placeholder: p.name.clone(),
        })
        .collect()
}

/// `NoPlaceholderInTargetFile` for every declared property that does not
/// occur in the scannable content. Token properties are skipped when the
/// file has no effective tokens (`placeholders` is `None`).
pub(crate) fn unused_properties(
    graph: &EntityGraph,
    file: FileId,
    content: &str,
    ranges: &[Range<usize>],
    placeholders: Option<&[Placeholder]>,
) -> Vec<Defect> {
    let target = graph.file(file);
    let found: Option<HashSet<&str>> =
        placeholders.map(|found| found.iter().map(|p| p.name.as_str()).collect());
    let marker = graph.marker(graph.file_marker(file)).path();

    target
        .properties()
        .iter()
        .filter(|property| {
            if property.regex {
                // invalid patterns are reported by the pattern check
                Regex::new(property.pattern())
                    .map(|re| !matches_in(content, ranges, &re))
                    .unwrap_or(false)
            } else {
                found
                    .as_ref()
                    .is_some_and(|found| !found.contains(property.name.as_str()))
            }
        })
        .map(|property| Defect::NoPlaceholderInTargetFile {
            marker: marker.to_path_buf(),
            file: graph.file_uri(file),
            property: property.name.clone(),
        })
        .collect()
}

/// Whether `re` matches inside any of the ranges.
pub(crate) fn matches_in(content: &str, ranges: &[Range<usize>], re: &Regex) -> bool {
    ranges.iter().any(|range| re.is_match(&content[range.clone()]))
}
