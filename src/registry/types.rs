//! Registry response types

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

/// Package document from the registry, cached per run
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryInfo {
    /// Package name
    #[serde(default)]
    pub name: String,

    /// Distribution tags (latest, next, ...)
    #[serde(default, rename = "dist-tags")]
    pub dist_tags: HashMap<String, String>,

    /// Per-version metadata
    #[serde(default)]
    pub versions: HashMap<String, VersionInfo>,
}

/// Version-specific metadata
#[derive(Debug, Clone, Deserialize)]
pub struct VersionInfo {
    /// Version string
    pub version: String,

    /// Distribution info; a version listed without one is gone
    #[serde(default)]
    pub dist: Option<DistInfo>,

    /// Dependencies, used when walking the closure in direct fetch mode
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

/// Distribution information
#[derive(Debug, Clone, Deserialize)]
pub struct DistInfo {
    /// Tarball URL
    pub tarball: String,
}
