// Copyright (c) Contributors to the Pacify project.
// SPDX-License-Identifier: Apache-2.0

//! Building the resolver chain from command line flags.

use std::collections::BTreeSet;
use std::path::PathBuf;

use pacify::{EnvResolver, Error, FileResolver, MapResolver, PropertyResolveManager, PropertyResolver};

use crate::ResolverFlags;

#[cfg(test)]
#[path = "./resolvers_test.rs"]
mod resolvers_test;

/// Name of the resolver fed by `-D cmdline.<property>=<value>`.
pub const CMDLINE: &str = "cmdline";

const KNOWN: [&str; 3] = [CMDLINE, FileResolver::NAME, EnvResolver::NAME];

/// Parsed resolver selection and options.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Enabled resolvers, highest priority first
    pub order: Vec<String>,
    pub files: Vec<PathBuf>,
    pub env_prefix: Option<String>,
    pub cmdline: Vec<(String, String)>,
    pub fallback: BTreeSet<String>,
}

impl ResolverConfig {
    pub fn from_flags(flags: &ResolverFlags) -> pacify::Result<Self> {
        Self::parse(&flags.resolvers, &flags.defines)
    }

    pub fn parse<S: AsRef<str>>(resolvers: &[S], defines: &[S]) -> pacify::Result<Self> {
        let mut config = Self::default();
        for name in resolvers {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            if !KNOWN.contains(&name) {
                return Err(unknown(name));
            }
            if config.order.iter().any(|n| n == name) {
                return Err(Error::InvalidResolverConfig(format!(
                    "resolver '{name}' is listed more than once"
                )));
            }
            config.order.push(name.to_string());
        }

        for define in defines {
            config.apply(define.as_ref())?;
        }
        Ok(config)
    }

    fn apply(&mut self, define: &str) -> pacify::Result<()> {
        let malformed = || {
            Error::InvalidResolverConfig(format!(
                "expected <resolver>.<key>=<value>, got '{define}'"
            ))
        };
        let (key, value) = define.split_once('=').ok_or_else(malformed)?;
        let (resolver, option) = key.trim().split_once('.').ok_or_else(malformed)?;
        if option.is_empty() {
            return Err(malformed());
        }
        if !KNOWN.contains(&resolver) {
            return Err(unknown(resolver));
        }
        if !self.order.iter().any(|n| n == resolver) {
            return Err(Error::InvalidResolverConfig(format!(
                "resolver '{resolver}' is configured but not enabled with --resolvers"
            )));
        }

        let value = value.trim();
        match (resolver, option) {
            (_, "fallback") => {
                if parse_bool(value).ok_or_else(malformed)? {
                    self.fallback.insert(resolver.to_string());
                } else {
                    self.fallback.remove(resolver);
                }
            }
            (CMDLINE, property) => self.cmdline.push((property.to_string(), value.to_string())),
            (FileResolver::NAME, "file") => self.files.push(PathBuf::from(value)),
            (EnvResolver::NAME, "prefix") => self.env_prefix = Some(value.to_string()),
            (resolver, option) => {
                return Err(Error::InvalidResolverConfig(format!(
                    "resolver '{resolver}' has no option '{option}'"
                )));
            }
        }
        Ok(())
    }

    /// Create the manager, reading property files and the given environment.
    pub fn build<I>(&self, env: I, keep_unresolved_references: bool) -> pacify::Result<PropertyResolveManager>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut manager =
            PropertyResolveManager::new().keep_unresolved_references(keep_unresolved_references);
        let mut env = Some(env);
        for (priority, name) in self.order.iter().enumerate() {
            let priority = priority as i32;
            let fallback = self.fallback.contains(name);
            match name.as_str() {
                CMDLINE => {
                    let mut source = MapResolver::new(CMDLINE);
                    for (id, value) in &self.cmdline {
                        source.insert(id.as_str(), value.as_str());
                    }
                    add(&mut manager, source, priority, fallback);
                }
                FileResolver::NAME => {
                    add(&mut manager, FileResolver::load(self.files.as_slice())?, priority, fallback);
                }
                EnvResolver::NAME => {
                    let vars = env.take().into_iter().flatten();
                    let source = EnvResolver::from_vars(self.env_prefix.as_deref(), vars);
                    add(&mut manager, source, priority, fallback);
                }
                other => return Err(unknown(other)),
            }
        }
        tracing::debug!(resolvers = ?manager.resolver_names(), "resolver chain ready");
        Ok(manager)
    }
}

/// Build the resolver chain for a command run against the real environment.
pub fn build_manager(
    flags: &ResolverFlags,
    keep_unresolved_references: bool,
) -> pacify::Result<PropertyResolveManager> {
    ResolverConfig::from_flags(flags)?.build(std::env::vars(), keep_unresolved_references)
}

fn add<R: PropertyResolver + 'static>(
    manager: &mut PropertyResolveManager,
    resolver: R,
    priority: i32,
    fallback: bool,
) {
    if fallback {
        manager.register_fallback(resolver, priority);
    } else {
        manager.register(resolver, priority);
    }
}

fn unknown(name: &str) -> Error {
    Error::UnknownResolver {
        name: name.to_string(),
        known: KNOWN.to_vec(),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
