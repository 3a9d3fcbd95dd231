//! Store materializer
//!
//! Moves package directories produced by the bootstrap installer out of a
//! scratch module tree into the store under their `name@version` keys.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use semver::Version;

use crate::core::{Manifest, SlinkError, SlinkResult};
use crate::store::{Store, StoreKey};

impl Store {
    /// Absorb every package under a scratch `node_modules` tree into the
    /// store, returning the keys that were collected. Safe against symlink
    /// cycles; an entry that already exists in the store wins and the
    /// scratch copy is discarded.
    pub fn absorb(&self, scratch_modules: &Path) -> SlinkResult<Vec<StoreKey>> {
        let mut visited = HashSet::new();
        let mut absorbed = Vec::new();
        self.absorb_modules_dir(scratch_modules, &mut visited, &mut absorbed)?;
        Ok(absorbed)
    }

    fn absorb_modules_dir(
        &self,
        modules_dir: &Path,
        visited: &mut HashSet<PathBuf>,
        absorbed: &mut Vec<StoreKey>,
    ) -> SlinkResult<()> {
        let Ok(canonical) = modules_dir.canonicalize() else {
            return Ok(());
        };
        if !visited.insert(canonical) {
            return Ok(());
        }

        for entry in std::fs::read_dir(modules_dir)? {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if file_name.starts_with('.') {
                continue;
            }
            if file_name.starts_with('@') {
                // Scoped parent; the packages are one level down
                for scoped in std::fs::read_dir(entry.path())? {
                    let scoped = scoped?;
                    if scoped.file_name().to_string_lossy().starts_with('.') {
                        continue;
                    }
                    self.absorb_package(&scoped.path(), visited, absorbed)?;
                }
            } else {
                self.absorb_package(&entry.path(), visited, absorbed)?;
            }
        }

        Ok(())
    }

    fn absorb_package(
        &self,
        package_dir: &Path,
        visited: &mut HashSet<PathBuf>,
        absorbed: &mut Vec<StoreKey>,
    ) -> SlinkResult<()> {
        if !package_dir.is_dir() {
            return Ok(());
        }
        let Ok(canonical) = package_dir.canonicalize() else {
            return Ok(());
        };
        if !visited.insert(canonical) {
            return Ok(());
        }

        // The manifest must be read before any move
        let manifest = Manifest::load_keyed(package_dir)?;
        let name = manifest.name.as_deref().unwrap_or_default().to_string();
        let version_str = manifest.version.as_deref().unwrap_or_default();
        let version = Version::parse(version_str).map_err(|_| SlinkError::ManifestInvalid {
            path: package_dir.join("package.json"),
            reason: format!("unparseable version {:?}", version_str),
        })?;

        let key = StoreKey {
            name: name.clone(),
            version: version.clone(),
        };
        // Speculative: the directory lands right below
        self.add(&name, version.clone());

        let target = self.entry_path(&name, &version);
        if target.exists() {
            // Redundant copy; its nested tree may still hold packages the
            // store has not seen
            let nested = package_dir.join("node_modules");
            if nested.is_dir() {
                self.absorb_modules_dir(&nested, visited, absorbed)?;
            }
            std::fs::remove_dir_all(package_dir)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            self.move_into_store(package_dir, &target)?;
            let nested = target.join("node_modules");
            if nested.is_dir() {
                self.absorb_modules_dir(&nested, visited, absorbed)?;
            }
        }

        absorbed.push(key);
        Ok(())
    }

    /// Rename `source` over `target`. A concurrent install may have created
    /// the target in the meantime; that race is benign and the loser's copy
    /// is dropped. Cross-device moves fall back to copy+remove.
    fn move_into_store(&self, source: &Path, target: &Path) -> SlinkResult<()> {
        match std::fs::rename(source, target) {
            Ok(()) => Ok(()),
            Err(_) if target.exists() => {
                std::fs::remove_dir_all(source)?;
                Ok(())
            }
            Err(_) => {
                copy_dir(source, target)?;
                std::fs::remove_dir_all(source)?;
                Ok(())
            }
        }
    }
}

/// Copy a directory tree, preserving symlinks as symlinks
fn copy_dir(source: &Path, target: &Path) -> SlinkResult<()> {
    std::fs::create_dir_all(target)?;

    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let from = entry.path();
        let to = target.join(entry.file_name());
        let file_type = entry.file_type()?;

        if file_type.is_symlink() {
            let link_target = std::fs::read_link(&from)?;
            std::os::unix::fs::symlink(link_target, &to)?;
        } else if file_type.is_dir() {
            copy_dir(&from, &to)?;
        } else {
            std::fs::copy(&from, &to)?;
        }
    }

    Ok(())
}
