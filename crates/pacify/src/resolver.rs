// Copyright (c) Contributors to the Pacify project.
// SPDX-License-Identifier: Apache-2.0

//! Ordered property resolver chain with reference expansion.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::Property;
use crate::Defect;

#[cfg(test)]
#[path = "./resolver_test.rs"]
mod resolver_test;

/// Syntax of a reference to another property inside a resolved value.
static REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"%\{([A-Za-z0-9_.\-]+)\}").expect("reference pattern is valid")
});

/// One identifier defined twice within a single logical source. The winning
/// definition is located through [`PropertyResolver::provenance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateProperty {
    pub property: String,
    /// Provenance of the shadowed definition.
    pub shadowed: String,
}

/// A static source of property values.
pub trait PropertyResolver: Send + Sync {
    /// Short name used on the command line and in messages.
    fn name(&self) -> &str;

    /// The raw value of `id`, references unexpanded.
    fn resolve(&self, id: &str) -> Option<String>;

    /// Where the value of `id` comes from.
    fn provenance(&self, id: &str) -> String {
        let _ = id;
        self.name().to_string()
    }

    /// Identifiers defined more than once within this source.
    fn duplicates(&self) -> Vec<DuplicateProperty> {
        Vec::new()
    }
}

/// Outcome of resolving one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(String),
    Unresolved,
    /// The identifiers on the reference path, starting and ending with the
    /// repeated one.
    Cyclic(Vec<String>),
}

impl Resolution {
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Resolved(value) => Some(value),
            _ => None,
        }
    }
}

struct Registration {
    resolver: Box<dyn PropertyResolver>,
    fallback: bool,
    priority: i32,
    order: usize,
}

/// Queries registered resolvers in priority order and memoizes results.
///
/// Lower priorities are asked first. Fallback resolvers are only asked when
/// no regular resolver claims an identifier.
#[derive(Default)]
pub struct PropertyResolveManager {
    resolvers: Vec<Registration>,
    cache: DashMap<String, Resolution>,
    keep_unresolved_references: bool,
}

impl PropertyResolveManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep an unresolvable `%{ref}` verbatim instead of treating the whole
    /// value as unresolved.
    pub fn keep_unresolved_references(mut self, keep: bool) -> Self {
        self.keep_unresolved_references = keep;
        self.cache.clear();
        self
    }

    pub fn register<R: PropertyResolver + 'static>(&mut self, resolver: R, priority: i32) {
        self.insert(Box::new(resolver), priority, false);
    }

    /// Register a resolver that only fills gaps left by the others.
    pub fn register_fallback<R: PropertyResolver + 'static>(&mut self, resolver: R, priority: i32) {
        self.insert(Box::new(resolver), priority, true);
    }

    fn insert(&mut self, resolver: Box<dyn PropertyResolver>, priority: i32, fallback: bool) {
        tracing::debug!(resolver = resolver.name(), priority, fallback, "registering resolver");
        let order = self.resolvers.len();
        self.resolvers.push(Registration {
            resolver,
            fallback,
            priority,
            order,
        });
        self.resolvers
            .sort_by_key(|r| (r.fallback, r.priority, r.order));
        self.cache.clear();
    }

    /// Names of the registered resolvers in query order.
    pub fn resolver_names(&self) -> Vec<&str> {
        self.resolvers.iter().map(|r| r.resolver.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// The raw value of `id` and the name of the resolver that claimed it.
    pub fn lookup(&self, id: &str) -> Option<(String, &str)> {
        self.resolvers.iter().find_map(|r| {
            r.resolver
                .resolve(id)
                .map(|value| (value, r.resolver.name()))
        })
    }

    /// Resolve `id`, expanding references to a fixed point.
    pub fn resolve(&self, id: &str) -> Resolution {
        let mut stack = Vec::new();
        self.resolve_in(id, &mut stack)
    }

    /// Resolve a declared property, falling back to its inline default.
    pub fn resolve_property(&self, property: &Property) -> Resolution {
        match self.resolve(&property.name) {
            Resolution::Unresolved => match &property.default {
                Some(default) => {
                    let mut stack = vec![property.name.clone()];
                    self.expand(default, &mut stack)
                }
                None => Resolution::Unresolved,
            },
            other => other,
        }
    }

    fn resolve_in(&self, id: &str, stack: &mut Vec<String>) -> Resolution {
        if let Some(position) = stack.iter().position(|s| s == id) {
            let mut chain = stack[position..].to_vec();
            chain.push(id.to_string());
            return Resolution::Cyclic(chain);
        }

        let cached = self.cache.get(id).map(|hit| hit.value().clone());
        if let Some(hit) = cached {
            return hit;
        }

        let resolution = match self.lookup(id) {
            None => Resolution::Unresolved,
            Some((raw, resolver)) => {
                tracing::trace!(property = id, resolver, "resolved raw value");
                stack.push(id.to_string());
                let expanded = self.expand(&raw, stack);
                stack.pop();
                expanded
            }
        };

        // cycle chains depend on where the walk started
        if !matches!(resolution, Resolution::Cyclic(_)) {
            self.cache.insert(id.to_string(), resolution.clone());
        }
        resolution
    }

    fn expand(&self, raw: &str, stack: &mut Vec<String>) -> Resolution {
        let mut out = String::with_capacity(raw.len());
        let mut last = 0;
        for captures in REFERENCE.captures_iter(raw) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            out.push_str(&raw[last..whole.start()]);
            match self.resolve_in(&captures[1], stack) {
                Resolution::Resolved(value) => out.push_str(&value),
                Resolution::Unresolved if self.keep_unresolved_references => {
                    out.push_str(whole.as_str())
                }
                other => return other,
            }
            last = whole.end();
        }
        out.push_str(&raw[last..]);
        Resolution::Resolved(out)
    }

    /// Duplicate definitions reported by every registered source.
    pub fn check_for_duplicates(&self) -> Vec<Defect> {
        let mut defects = Vec::new();
        for registration in &self.resolvers {
            let resolver = &registration.resolver;
            for duplicate in resolver.duplicates() {
                tracing::debug!(resolver = resolver.name(), property = %duplicate.property, "duplicate property");
                defects.push(Defect::PropertyDuplicateInPropertyFile {
                    first: resolver.provenance(&duplicate.property),
                    second: duplicate.shadowed,
                    property: duplicate.property,
                    resolver: resolver.name().to_string(),
                });
            }
        }
        defects
    }
}

impl std::fmt::Debug for PropertyResolveManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyResolveManager")
            .field("resolvers", &self.resolver_names())
            .field("keep_unresolved_references", &self.keep_unresolved_references)
            .finish()
    }
}
