// Copyright (c) Contributors to the Pacify project.
// SPDX-License-Identifier: Apache-2.0

//! pacify - Deployment-time Property Substitution
//!
//! This crate turns one build artifact into many environment specific
//! artifacts by substituting placeholders in files and nested archives, as
//! declared by marker files (`.pacify.yaml`) inside the package.
//!
//! # Overview
//!
//! Loading discovers every marker below a package root and links it into an
//! [`EntityGraph`]. A [`Validator`] runs structural and content checks over
//! the graph, and a [`Replacer`] substitutes the values produced by a
//! [`PropertyResolveManager`]. Problems a package author can fix are
//! reported as [`Defect`]s rather than errors.
//!
//! # Example
//!
//! ```yaml
//! # .pacify.yaml
//! api: pacify/v0
//! beginToken: "%{"
//! endToken: "}"
//!
//! files:
//!   - path: conf/app.properties
//!     properties:
//!       - name: dbHost
//!
//! archives:
//!   - path: lib/app.jar
//!     type: jar
//!     files:
//!       - path: META-INF/persistence.xml
//!         properties:
//!           - name: jdbcUrl
//! ```

pub mod archive;
pub mod check;
pub mod content;
pub mod defect;
pub mod discovery;
pub mod error;
pub mod filter;
pub mod model;
pub mod replace;
pub mod resolver;
pub mod source;
pub mod spec;
pub mod token;
pub mod validate;

#[cfg(test)]
mod fixtures;

pub use check::{Check, CheckContext, CheckPhase};
pub use defect::{Defect, DefectSet};
pub use discovery::{find_markers, EntityManager, LoadOptions};
pub use error::{Error, Result};
pub use filter::{ContentFilter, FilterRegistry};
pub use model::{
    Archive, ArchiveId, ArchiveType, Artifact, EntityGraph, FileId, Marker, MarkerId, Parent,
    Property, TargetFile, TargetLocation,
};
pub use replace::{ReplaceMode, ReplaceOptions, Replacer};
pub use resolver::{PropertyResolveManager, PropertyResolver, Resolution};
pub use source::{EnvResolver, FileResolver, MapResolver};
pub use spec::{ApiVersion, ArchiveSpec, FileSpec, MarkerSpec, PropertySpec};
pub use token::Tokens;
pub use validate::Validator;

/// Suffix identifying marker files.
pub const MARKER_SUFFIX: &str = ".pacify.yaml";
