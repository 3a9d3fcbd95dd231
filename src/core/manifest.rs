//! Manifest (package.json) reading and writing
//!
//! Only the subset slink consumes is modeled explicitly; every other field
//! is carried through a flattened map so a rewrite never drops data.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::core::{SlinkError, SlinkResult};

/// The manifest subset slink reads
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    /// Package name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Package version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Executables: a single path or a shim-name to path mapping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin: Option<Bin>,

    /// Dependencies
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,

    /// Dev dependencies
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty", rename = "devDependencies")]
    pub dev_dependencies: BTreeMap<String, String>,

    /// Peer dependencies
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty", rename = "peerDependencies")]
    pub peer_dependencies: BTreeMap<String, String>,

    /// Peer dependency metadata
    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        rename = "peerDependenciesMeta"
    )]
    pub peer_dependencies_meta: BTreeMap<String, PeerMeta>,

    /// Other fields (preserved during round-trip)
    #[serde(flatten)]
    pub rest: BTreeMap<String, serde_json::Value>,
}

/// The `bin` field of a manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Bin {
    /// A single executable named after the package
    Single(String),
    /// Shim name to executable path
    Table(BTreeMap<String, String>),
}

/// Peer dependency metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeerMeta {
    #[serde(default)]
    pub optional: bool,
}

impl Manifest {
    /// Load a manifest from a directory (or a direct file path)
    pub fn load(path: &Path) -> SlinkResult<Self> {
        let manifest_path = if path.is_dir() {
            path.join("package.json")
        } else {
            path.to_path_buf()
        };

        if !manifest_path.exists() {
            return Err(SlinkError::ManifestMissing(manifest_path));
        }

        let content = std::fs::read_to_string(&manifest_path)?;
        serde_json::from_str(&content).map_err(|e| SlinkError::ManifestInvalid {
            path: manifest_path,
            reason: e.to_string(),
        })
    }

    /// Load a manifest that must carry `name` and `version`, as every
    /// store-bound package does
    pub fn load_keyed(dir: &Path) -> SlinkResult<Self> {
        let manifest = Self::load(dir)?;
        if manifest.name.is_none() || manifest.version.is_none() {
            return Err(SlinkError::ManifestInvalid {
                path: dir.join("package.json"),
                reason: "missing name or version".to_string(),
            });
        }
        Ok(manifest)
    }

    /// Save the manifest, pretty-printed with sorted dependency keys
    pub fn save(&self, path: &Path) -> SlinkResult<()> {
        let manifest_path = if path.is_dir() {
            path.join("package.json")
        } else {
            path.to_path_buf()
        };

        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        std::fs::write(manifest_path, content)?;
        Ok(())
    }
}

/// Process-wide cache of manifests read from store entries and link
/// targets. Those directories are never mutated during a run, so at most
/// one read per path happens.
#[derive(Default)]
pub struct ManifestCache {
    entries: Mutex<HashMap<PathBuf, std::sync::Arc<Manifest>>>,
}

impl ManifestCache {
    /// Read a package directory's manifest, memoized on the canonical path
    pub fn read(&self, dir: &Path) -> SlinkResult<std::sync::Arc<Manifest>> {
        let key = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());

        if let Some(cached) = self.entries.lock().unwrap().get(&key) {
            return Ok(cached.clone());
        }

        let manifest = std::sync::Arc::new(Manifest::load(dir)?);
        self.entries
            .lock()
            .unwrap()
            .entry(key)
            .or_insert_with(|| manifest.clone());
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_manifest_roundtrip() {
        let dir = tempdir().unwrap();

        let mut manifest = Manifest::default();
        manifest.name = Some("test-package".to_string());
        manifest
            .dependencies
            .insert("react".to_string(), "^18.0.0".to_string());
        manifest
            .dev_dependencies
            .insert("typescript".to_string(), "^5.0.0".to_string());

        manifest.save(dir.path()).unwrap();

        let loaded = Manifest::load(dir.path()).unwrap();
        assert_eq!(loaded.name.as_deref(), Some("test-package"));
        assert_eq!(loaded.dependencies.get("react").unwrap(), "^18.0.0");
        assert_eq!(loaded.dev_dependencies.get("typescript").unwrap(), "^5.0.0");
    }

    #[test]
    fn test_unknown_fields_preserved() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"name": "x", "version": "1.0.0", "license": "MIT", "scripts": {"build": "tsc"}}"#,
        )
        .unwrap();

        let manifest = Manifest::load(dir.path()).unwrap();
        assert!(manifest.rest.contains_key("license"));
        assert!(manifest.rest.contains_key("scripts"));

        manifest.save(dir.path()).unwrap();
        let reloaded = Manifest::load(dir.path()).unwrap();
        assert_eq!(reloaded.rest.get("license").unwrap(), "MIT");
    }

    #[test]
    fn test_written_keys_sorted() {
        let dir = tempdir().unwrap();

        let mut manifest = Manifest::default();
        manifest
            .dependencies
            .insert("zlib".to_string(), "*".to_string());
        manifest
            .dependencies
            .insert("abbrev".to_string(), "*".to_string());
        manifest.save(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join("package.json")).unwrap();
        let abbrev = content.find("abbrev").unwrap();
        let zlib = content.find("zlib").unwrap();
        assert!(abbrev < zlib);

        // Sorting is a fixpoint: a second save is byte-identical.
        Manifest::load(dir.path()).unwrap().save(dir.path()).unwrap();
        let again = std::fs::read_to_string(dir.path().join("package.json")).unwrap();
        assert_eq!(content, again);
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            Manifest::load(dir.path()),
            Err(SlinkError::ManifestMissing(_))
        ));
    }

    #[test]
    fn test_keyed_requires_name_and_version() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), r#"{"name": "x"}"#).unwrap();
        assert!(matches!(
            Manifest::load_keyed(dir.path()),
            Err(SlinkError::ManifestInvalid { .. })
        ));
    }

    #[test]
    fn test_bin_forms() {
        let single: Manifest =
            serde_json::from_str(r#"{"bin": "cli.js"}"#).unwrap();
        assert!(matches!(single.bin, Some(Bin::Single(ref p)) if p == "cli.js"));

        let table: Manifest =
            serde_json::from_str(r#"{"bin": {"tsc": "bin/tsc", "tsserver": "bin/tsserver"}}"#)
                .unwrap();
        match table.bin {
            Some(Bin::Table(map)) => assert_eq!(map.len(), 2),
            other => panic!("unexpected bin: {:?}", other),
        }
    }

    #[test]
    fn test_cache_reads_once() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"name": "cached", "version": "1.0.0"}"#,
        )
        .unwrap();

        let cache = ManifestCache::default();
        let first = cache.read(dir.path()).unwrap();

        // A rewrite on disk is not observed; the cache owns the entry.
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"name": "changed", "version": "2.0.0"}"#,
        )
        .unwrap();
        let second = cache.read(dir.path()).unwrap();
        assert_eq!(first.name, second.name);
    }
}
