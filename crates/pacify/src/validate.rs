// Copyright (c) Contributors to the Pacify project.
// SPDX-License-Identifier: Apache-2.0

//! Two-phase validation pipeline over the entity graph.

use crate::check::{
    ArchiveTypeCheck, Check, CheckContext, CheckPhase, DuplicateCheck, FilterCheck,
    NotReplacedCheck, PlaceholderDefinedCheck, PlaceholderUsedCheck, PropertyPatternCheck,
    PropertyResolvableCheck, ResolverDuplicateCheck, TargetFileExistCheck, TokenCheck,
};
use crate::content::ContentSnapshot;
use crate::filter::FilterRegistry;
use crate::model::{Artifact, EntityGraph};
use crate::resolver::PropertyResolveManager;
use crate::DefectSet;

#[cfg(test)]
#[path = "./validate_test.rs"]
mod validate_test;

/// An ordered list of checks.
///
/// Structural checks always run before content checks, so a missing file
/// is reported once instead of cascading into content defects.
#[derive(Default)]
pub struct Validator {
    checks: Vec<Box<dyn Check>>,
}

impl Validator {
    /// A validator without any check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks that need the graph and the filesystem layout only.
    pub fn structural() -> Self {
        Self::new()
            .with_check(ArchiveTypeCheck)
            .with_check(DuplicateCheck)
            .with_check(TargetFileExistCheck)
            .with_check(FilterCheck)
            .with_check(TokenCheck)
            .with_check(PropertyPatternCheck)
    }

    /// Read-only validation of a package before replacement.
    pub fn preflight() -> Self {
        Self::structural()
            .with_check(PlaceholderDefinedCheck)
            .with_check(PlaceholderUsedCheck)
            .with_check(PropertyResolvableCheck)
            .with_check(ResolverDuplicateCheck)
    }

    /// Like [`Validator::preflight`] for a pre-configure run, where
    /// properties are allowed to stay unresolved.
    pub fn pre_configure() -> Self {
        Self::structural()
            .with_check(PlaceholderDefinedCheck)
            .with_check(PlaceholderUsedCheck)
            .with_check(ResolverDuplicateCheck)
    }

    /// Re-scan of written output for surviving tokens.
    pub fn post_replacement() -> Self {
        Self::new().with_check(NotReplacedCheck)
    }

    pub fn with_check<C: Check + 'static>(mut self, check: C) -> Self {
        self.checks.push(Box::new(check));
        self
    }

    /// Names of the checks in execution order.
    pub fn check_names(&self) -> Vec<&'static str> {
        self.ordered().iter().map(|c| c.name()).collect()
    }

    fn ordered(&self) -> Vec<&dyn Check> {
        let structural = self
            .checks
            .iter()
            .filter(|c| c.phase() == CheckPhase::Structural);
        let content = self
            .checks
            .iter()
            .filter(|c| c.phase() == CheckPhase::Content);
        structural.chain(content).map(|c| &**c as &dyn Check).collect()
    }

    /// Validate every artifact of the graph.
    pub fn validate(
        &self,
        graph: &EntityGraph,
        resolvers: &PropertyResolveManager,
        filters: &FilterRegistry,
    ) -> DefectSet {
        self.validate_scope(graph, resolvers, filters, &graph.artifacts())
    }

    /// Validate with file content limited to the given artifacts.
    pub fn validate_scope(
        &self,
        graph: &EntityGraph,
        resolvers: &PropertyResolveManager,
        filters: &FilterRegistry,
        artifacts: &[Artifact],
    ) -> DefectSet {
        let snapshot = ContentSnapshot::load(graph, filters, artifacts);
        let mut defects = DefectSet::new();
        // read failures only matter to checks that look at content
        if self.checks.iter().any(|c| c.phase() == CheckPhase::Content) {
            defects.extend(snapshot.defects().iter().cloned());
        }

        let ctx = CheckContext {
            graph,
            resolvers,
            filters,
            snapshot: &snapshot,
        };
        for check in self.ordered() {
            let found = check.check(&ctx);
            tracing::debug!(check = check.name(), defects = found.len(), "check finished");
            defects.extend(found);
        }
        defects
    }
}
