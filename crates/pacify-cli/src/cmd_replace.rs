// Copyright (c) Contributors to the Pacify project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `pacify replace` command.

use clap::Args;
use miette::Result;

use crate::report::{report, OutputFormat};

/// Replace placeholders in a package
#[derive(Debug, Args)]
pub struct CmdReplace {
    #[clap(flatten)]
    package: crate::PackageFlags,

    #[clap(flatten)]
    resolvers: crate::ResolverFlags,

    /// Substitute the known values only and leave the other tokens in place
    #[clap(long)]
    pre_configure: bool,

    /// Worker threads, 0 uses one per core
    #[clap(long, default_value_t = 0, env = "PACIFY_THREADS")]
    threads: usize,

    /// Output format
    #[clap(long, value_enum, default_value_t)]
    format: OutputFormat,
}

impl CmdReplace {
    pub fn run(&mut self) -> Result<i32> {
        let manager = self.package.load()?;
        if !manager.defects().is_empty() {
            tracing::warn!("marker files have defects, nothing replaced");
            return report(manager.defects(), self.format);
        }

        let resolvers = crate::resolvers::build_manager(&self.resolvers, self.pre_configure)?;
        let filters = pacify::FilterRegistry::new();
        let options = pacify::ReplaceOptions {
            mode: if self.pre_configure {
                pacify::ReplaceMode::PreConfigure
            } else {
                pacify::ReplaceMode::Replace
            },
            threads: self.threads,
        };

        let defects = pacify::Replacer::new(&resolvers, &filters, options).replace(manager.graph())?;
        report(&defects, self.format)
    }
}
