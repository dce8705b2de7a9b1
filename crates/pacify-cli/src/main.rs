// Copyright (c) Contributors to the Pacify project.
// SPDX-License-Identifier: Apache-2.0

//! pacify - deployment time placeholder substitution CLI

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use miette::Result;

mod cmd_init;
mod cmd_replace;
mod cmd_show;
mod cmd_validate;
mod report;
mod resolvers;

use cmd_init::CmdInit;
use cmd_replace::CmdReplace;
use cmd_show::CmdShow;
use cmd_validate::CmdValidate;

#[derive(Parser)]
#[clap(
    name = "pacify",
    about = "Deployment time placeholder substitution",
    version,
    long_about = "Substitute environment specific values into an unpacked deployment package, \
                  including files nested inside jar, war, ear, zip and tar archives"
)]
struct Opt {
    #[clap(flatten)]
    logging: Logging,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Parser)]
struct Logging {
    /// Increase verbosity (-v, -vv, -vvv)
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[clap(short, long, global = true)]
    quiet: bool,
}

/// Package selection shared by every command that reads a package.
#[derive(Args, Clone, Debug)]
pub struct PackageFlags {
    /// Root directory of the unpacked package
    #[clap(short, long, default_value = ".", env = "PACIFY_PACKAGE")]
    pub package: PathBuf,

    /// Accept a package without any marker file
    #[clap(long, env = "PACIFY_ALLOW_EMPTY")]
    pub allow_empty: bool,
}

impl PackageFlags {
    pub fn load(&self) -> Result<pacify::EntityManager> {
        let options = pacify::LoadOptions {
            allow_empty: self.allow_empty,
        };
        Ok(pacify::EntityManager::initialize(&self.package, &options)?)
    }
}

/// Property source selection.
#[derive(Args, Clone, Debug, Default)]
pub struct ResolverFlags {
    /// Resolvers to query, highest priority first
    #[clap(
        long,
        value_delimiter = ',',
        default_value = "cmdline,file",
        env = "PACIFY_RESOLVERS"
    )]
    pub resolvers: Vec<String>,

    /// Resolver option as <resolver>.<key>=<value>, e.g. -D file.file=prod.properties
    #[clap(short = 'D', long = "define", value_name = "RESOLVER.KEY=VALUE")]
    pub defines: Vec<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new .pacify.yaml marker file
    Init(CmdInit),

    /// Display the markers, files and archives of a package
    Show(CmdShow),

    /// Check a package without writing anything
    Validate(CmdValidate),

    /// Replace placeholders in a package
    Replace(CmdReplace),
}

impl Opt {
    fn run(self) -> Result<i32> {
        let log_level = match (self.logging.quiet, self.logging.verbose) {
            (true, _) => tracing::Level::ERROR,
            (false, 0) => tracing::Level::WARN,
            (false, 1) => tracing::Level::INFO,
            (false, 2) => tracing::Level::DEBUG,
            (false, _) => tracing::Level::TRACE,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .init();

        match self.cmd {
            Command::Init(mut cmd) => cmd.run(),
            Command::Show(mut cmd) => cmd.run(),
            Command::Validate(mut cmd) => cmd.run(),
            Command::Replace(mut cmd) => cmd.run(),
        }
    }
}

fn main() -> Result<()> {
    let opt = Opt::parse();
    let code = opt.run()?;
    std::process::exit(code);
}
