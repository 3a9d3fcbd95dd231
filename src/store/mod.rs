//! The shared on-disk package store
//!
//! One directory per `name@version`; scoped packages live under an `@org`
//! parent. Entries are created once and never mutated.

pub mod absorb;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use semver::Version;

use crate::core::SlinkResult;
use crate::resolver::VersionConstraint;

/// The key of one store entry
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct StoreKey {
    pub name: String,
    pub version: Version,
}

impl std::fmt::Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// The store directory plus its in-memory index
///
/// The index maps package name to the set of versions present on disk. It
/// is seeded by `scan` before any resolution begins and only grows during
/// a run.
pub struct Store {
    dir: PathBuf,
    index: Mutex<BTreeMap<String, BTreeSet<Version>>>,
}

impl Store {
    /// Open the store at `dir`, creating it if absent, and scan it into
    /// the index
    pub fn open(dir: &Path) -> SlinkResult<Self> {
        std::fs::create_dir_all(dir)?;
        let dir = dir.canonicalize()?;
        let store = Self {
            dir,
            index: Mutex::new(BTreeMap::new()),
        };
        store.scan()?;
        Ok(store)
    }

    /// The store root directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The on-disk path of an entry
    pub fn entry_path(&self, name: &str, version: &Version) -> PathBuf {
        match name.split_once('/') {
            Some((scope, simple)) => self.dir.join(scope).join(format!("{}@{}", simple, version)),
            None => self.dir.join(format!("{}@{}", name, version)),
        }
    }

    /// List the store's direct children into the index. An `@org` child is
    /// descended one level; malformed names are skipped, they may be
    /// in-flight writes.
    fn scan(&self) -> SlinkResult<()> {
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let child = entry.file_name().to_string_lossy().into_owned();
            if child.starts_with('.') {
                continue;
            }
            if child.starts_with('@') {
                for scoped in std::fs::read_dir(entry.path())? {
                    let scoped = scoped?;
                    if scoped.path().is_dir() {
                        let dir_name = scoped.file_name().to_string_lossy().into_owned();
                        self.index_dir_name(Some(&child), &dir_name);
                    }
                }
            } else {
                self.index_dir_name(None, &child);
            }
        }
        Ok(())
    }

    /// Split a terminal directory name on its last `@` and index it
    fn index_dir_name(&self, scope: Option<&str>, dir_name: &str) {
        let Some((simple, version)) = dir_name.rsplit_once('@') else {
            return;
        };
        if simple.is_empty() {
            return;
        }
        let Ok(version) = Version::parse(version) else {
            return;
        };
        let name = match scope {
            Some(scope) => format!("{}/{}", scope, simple),
            None => simple.to_string(),
        };
        self.add(&name, version);
    }

    /// Record a version as present; idempotent
    pub fn add(&self, name: &str, version: Version) {
        self.index
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .insert(version);
    }

    /// Is this exact version present?
    pub fn has(&self, name: &str, version: &Version) -> bool {
        self.index
            .lock()
            .unwrap()
            .get(name)
            .is_some_and(|set| set.contains(version))
    }

    /// Is any version of this package present?
    pub fn any(&self, name: &str) -> bool {
        self.index
            .lock()
            .unwrap()
            .get(name)
            .is_some_and(|set| !set.is_empty())
    }

    /// All cached versions of a package
    pub fn versions(&self, name: &str) -> Vec<Version> {
        self.index
            .lock()
            .unwrap()
            .get(name)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// The highest cached version satisfying a range
    pub fn max_satisfying(&self, name: &str, constraint: &VersionConstraint) -> Option<Version> {
        constraint.max_satisfying(&self.versions(name))
    }
}
