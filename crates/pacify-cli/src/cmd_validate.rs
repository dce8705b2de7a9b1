// Copyright (c) Contributors to the Pacify project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `pacify validate` command.

use clap::Args;
use miette::Result;

use crate::report::{report, OutputFormat};

/// Check a package without writing anything
#[derive(Debug, Args)]
pub struct CmdValidate {
    #[clap(flatten)]
    package: crate::PackageFlags,

    #[clap(flatten)]
    resolvers: crate::ResolverFlags,

    /// Validate for a pre-configure run, unresolved properties are allowed
    #[clap(long)]
    pre_configure: bool,

    /// Output format
    #[clap(long, value_enum, default_value_t)]
    format: OutputFormat,
}

impl CmdValidate {
    pub fn run(&mut self) -> Result<i32> {
        let manager = self.package.load()?;
        let resolvers = crate::resolvers::build_manager(&self.resolvers, self.pre_configure)?;
        let filters = pacify::FilterRegistry::new();

        let validator = if self.pre_configure {
            pacify::Validator::pre_configure()
        } else {
            pacify::Validator::preflight()
        };
        let mut defects = manager.defects().clone();
        defects.extend(validator.validate(manager.graph(), &resolvers, &filters));

        tracing::info!(
            markers = manager.graph().marker_count(),
            checks = ?validator.check_names(),
            "validation finished"
        );
        report(&defects, self.format)
    }
}
