// Copyright (c) Contributors to the Pacify project.
// SPDX-License-Identifier: Apache-2.0

//! Pluggable content filters applied around token scanning.

use std::collections::BTreeMap;
use std::ops::Range;
use std::string::FromUtf8Error;
use std::sync::Arc;

#[cfg(test)]
#[path = "./filter_test.rs"]
mod filter_test;

/// Name of the filter used when a file declares none.
pub const DEFAULT_FILTER: &str = "default";

/// Name of the built-in java properties filter.
pub const PROPERTIES_FILTER: &str = "properties";

/// Transforms the bytes a target file is made of before and after scanning.
pub trait ContentFilter: Send + Sync {
    /// Turn raw bytes into scannable text.
    fn decode(&self, bytes: Vec<u8>) -> Result<String, FromUtf8Error> {
        String::from_utf8(bytes)
    }

    /// Byte ranges of `content` that may contain placeholders.
    fn scannable(&self, content: &str) -> Vec<Range<usize>> {
        vec![0..content.len()]
    }

    /// Turn substituted text back into bytes.
    fn encode(&self, content: String) -> Vec<u8> {
        content.into_bytes()
    }
}

/// Scans the whole UTF-8 content.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFilter;

impl ContentFilter for DefaultFilter {}

/// Skips `#` and `!` comment lines of a java properties file.
#[derive(Debug, Default, Clone, Copy)]
pub struct PropertiesFilter;

impl ContentFilter for PropertiesFilter {
    fn scannable(&self, content: &str) -> Vec<Range<usize>> {
        let mut ranges = Vec::new();
        let mut start = 0;
        for line in content.split_inclusive('\n') {
            let end = start + line.len();
            let trimmed = line.trim_start();
            if !(trimmed.starts_with('#') || trimmed.starts_with('!')) {
                match ranges.last_mut() {
                    Some(Range { end: last_end, .. }) if *last_end == start => *last_end = end,
                    _ => ranges.push(start..end),
                }
            }
            start = end;
        }
        ranges
    }
}

/// Filters available by name.
#[derive(Clone)]
pub struct FilterRegistry {
    filters: BTreeMap<String, Arc<dyn ContentFilter>>,
}

impl FilterRegistry {
    /// A registry holding the built-in filters.
    pub fn new() -> Self {
        let mut registry = Self {
            filters: BTreeMap::new(),
        };
        registry.register(DEFAULT_FILTER, DefaultFilter);
        registry.register(PROPERTIES_FILTER, PropertiesFilter);
        registry
    }

    /// Register a filter, replacing any filter of the same name.
    pub fn register<F: ContentFilter + 'static>(&mut self, name: impl Into<String>, filter: F) {
        self.filters.insert(name.into(), Arc::new(filter));
    }

    /// Look up a filter; `None` selects the default filter.
    pub fn get(&self, name: Option<&str>) -> Option<Arc<dyn ContentFilter>> {
        self.filters.get(name.unwrap_or(DEFAULT_FILTER)).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.filters.keys()).finish()
    }
}
