// Copyright (c) Contributors to the Pacify project.
// SPDX-License-Identifier: Apache-2.0

//! Marker file parsing and data types for `.pacify.yaml` descriptors.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "./spec_test.rs"]
mod spec_test;

/// API version for marker files.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
pub enum ApiVersion {
    #[default]
    #[serde(rename = "pacify/v0")]
    V0,
}

/// Helper for two-stage deserialization to determine API version first.
#[derive(Deserialize)]
struct ApiVersionMapping {
    #[serde(default)]
    api: ApiVersion,
}

/// A named placeholder declared on a target file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PropertySpec {
    /// Identifier looked up in the resolver chain.
    pub name: String,

    /// Match `pattern` (or the name itself) as a regular expression against
    /// the content instead of looking for a delimited token.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub regex: bool,

    /// Regular expression used in regex mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Value used when no resolver claims the identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl PropertySpec {
    /// Create a plain token property.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            regex: false,
            pattern: None,
            default: None,
        }
    }
}

/// A file whose content is scanned for placeholders.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileSpec {
    /// Path relative to the marker directory, or the entry name inside an archive.
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_token: Option<String>,

    /// Name of a registered content filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PropertySpec>,
}

/// A packaged container holding target files and possibly other archives.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveSpec {
    /// Path relative to the marker directory, or the entry name inside the
    /// enclosing archive.
    pub path: String,

    /// Declared container type, kept verbatim so unsupported kinds can be
    /// reported instead of failing the parse.
    #[serde(rename = "type")]
    pub archive_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_token: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub archives: Vec<ArchiveSpec>,
}

/// Main marker specification from a `.pacify.yaml` file.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MarkerSpec {
    /// API version identifier.
    #[serde(default)]
    pub api: ApiVersion,

    /// Default begin token for every file declared by this marker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin_token: Option<String>,

    /// Default end token for every file declared by this marker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_token: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub archives: Vec<ArchiveSpec>,

    /// Path to the file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl MarkerSpec {
    /// Parse a marker from a YAML string.
    pub fn from_yaml<S: Into<String>>(yaml: S) -> crate::Result<Self> {
        let yaml = yaml.into();

        // Stage 1: Parse to get API version
        let value: serde_yaml::Value =
            serde_yaml::from_str(&yaml).map_err(|e| crate::Error::InvalidYaml {
                error: e,
                yaml_content: yaml.clone(),
            })?;

        let with_version: ApiVersionMapping =
            serde_yaml::from_value(value.clone()).map_err(|e| crate::Error::InvalidYaml {
                error: e,
                yaml_content: yaml.clone(),
            })?;

        // Stage 2: Deserialize based on version
        match with_version.api {
            ApiVersion::V0 => {
                serde_yaml::from_value(value).map_err(|e| crate::Error::InvalidYaml {
                    error: e,
                    yaml_content: yaml,
                })
            }
        }
    }

    /// Load a marker from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| crate::Error::ReadFailed {
            path: path.to_path_buf(),
            error: e,
        })?;

        let mut spec = Self::from_yaml(yaml)?;
        spec.source_path = Some(path.to_path_buf());
        Ok(spec)
    }

    /// Serialize the marker back to YAML.
    pub fn to_yaml(&self) -> crate::Result<String> {
        serde_yaml::to_string(self).map_err(|e| crate::Error::InvalidYaml {
            error: e,
            yaml_content: String::new(),
        })
    }
}
