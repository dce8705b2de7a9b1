// Copyright (c) Contributors to the Pacify project.
// SPDX-License-Identifier: Apache-2.0

//! Built-in property sources.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::resolver::{DuplicateProperty, PropertyResolver};

#[cfg(test)]
#[path = "./source_test.rs"]
mod source_test;

/// In-memory values, typically given on the command line.
#[derive(Debug, Clone, Default)]
pub struct MapResolver {
    name: String,
    values: IndexMap<String, String>,
}

impl MapResolver {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: IndexMap::new(),
        }
    }

    pub fn with(mut self, id: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(id, value);
        self
    }

    /// Set a value, later calls override earlier ones.
    pub fn insert(&mut self, id: impl Into<String>, value: impl Into<String>) {
        self.values.insert(id.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl PropertyResolver for MapResolver {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self, id: &str) -> Option<String> {
        self.values.get(id).cloned()
    }
}

#[derive(Debug, Clone)]
struct Definition {
    value: String,
    file: usize,
    line: usize,
}

/// Values loaded from one or more `key=value` files merged into one source.
///
/// The first definition of a key wins. Every further definition, in the same
/// file or another one, is reported as a duplicate.
#[derive(Debug, Clone)]
pub struct FileResolver {
    files: Vec<PathBuf>,
    values: IndexMap<String, Definition>,
    duplicates: Vec<DuplicateProperty>,
}

impl FileResolver {
    pub const NAME: &'static str = "file";

    /// Load all files, failing if any of them cannot be read.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> crate::Result<Self> {
        let mut resolver = Self {
            files: Vec::with_capacity(paths.len()),
            values: IndexMap::new(),
            duplicates: Vec::new(),
        };
        for path in paths {
            let path = path.as_ref();
            let content = std::fs::read_to_string(path).map_err(|e| crate::Error::ReadFailed {
                path: path.to_path_buf(),
                error: e,
            })?;
            tracing::debug!(file = %path.display(), "loading property file");
            resolver.add(path.to_path_buf(), &content);
        }
        Ok(resolver)
    }

    fn add(&mut self, path: PathBuf, content: &str) {
        let file = self.files.len();
        self.files.push(path);
        for (line, key, value) in parse_properties(content) {
            if self.values.contains_key(&key) {
                let duplicate = DuplicateProperty {
                    shadowed: self.location(file, line),
                    property: key,
                };
                self.duplicates.push(duplicate);
                continue;
            }
            self.values.insert(key, Definition { value, file, line });
        }
    }

    fn location(&self, file: usize, line: usize) -> String {
        format!("{}:{}", self.files[file].display(), line)
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl PropertyResolver for FileResolver {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn resolve(&self, id: &str) -> Option<String> {
        self.values.get(id).map(|d| d.value.clone())
    }

    fn provenance(&self, id: &str) -> String {
        match self.values.get(id) {
            Some(definition) => self.location(definition.file, definition.line),
            None => Self::NAME.to_string(),
        }
    }

    fn duplicates(&self) -> Vec<DuplicateProperty> {
        self.duplicates.clone()
    }
}

/// Parse `key=value` lines, returning `(line number, key, value)`.
///
/// Blank lines and lines starting with `#` or `!` are skipped. A line
/// without `=` defines a key with an empty value.
pub fn parse_properties(content: &str) -> Vec<(usize, String, String)> {
    content
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                return None;
            }
            let (key, value) = line.split_once('=').unwrap_or((line, ""));
            Some((index + 1, key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Values taken from environment variables, optionally behind a prefix.
#[derive(Debug, Clone, Default)]
pub struct EnvResolver {
    prefix: String,
    values: IndexMap<String, String>,
}

impl EnvResolver {
    pub const NAME: &'static str = "env";

    /// Capture the current process environment.
    pub fn from_env(prefix: Option<&str>) -> Self {
        Self::from_vars(prefix, std::env::vars())
    }

    /// Build from explicit variables; only those starting with the prefix
    /// are kept, with the prefix removed.
    pub fn from_vars<I, K, V>(prefix: Option<&str>, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let prefix = prefix.unwrap_or_default().to_string();
        let values = vars
            .into_iter()
            .filter_map(|(key, value)| {
                let key: String = key.into();
                let id = key.strip_prefix(prefix.as_str())?;
                (!id.is_empty()).then(|| (id.to_string(), value.into()))
            })
            .collect();
        Self { prefix, values }
    }
}

impl PropertyResolver for EnvResolver {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn resolve(&self, id: &str) -> Option<String> {
        self.values.get(id).cloned()
    }

    fn provenance(&self, id: &str) -> String {
        format!("${}{}", self.prefix, id)
    }
}
