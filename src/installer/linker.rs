//! Symlink planner
//!
//! Builds the visible module layout after absorption: top-level links into
//! the store, transitive links inside each store entry, then peer
//! dependency links resolved against each package's parent module
//! directory. Every walk carries a visited set of canonical paths, so
//! symlink cycles terminate on the second visit.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::core::{ManifestCache, SlinkResult};
use crate::resolver::{DepTarget, VersionConstraint};
use crate::store::Store;

/// A package that received a link during passes A and B
#[derive(Debug, Clone)]
pub struct LinkedPackage {
    /// The real package directory (store entry or link target)
    pub dir: PathBuf,

    /// The node_modules directory its link was placed in
    pub parent_modules: PathBuf,

    /// False for link-spec targets, whose manifests are read solely for
    /// bin entries
    pub follow: bool,
}

/// Symlink planner over one project install
pub struct Linker<'a> {
    store: &'a Store,
    manifests: &'a ManifestCache,

    /// Canonical package dirs already entered by pass B
    visited: HashSet<PathBuf>,

    /// node_modules dir -> name -> resolved package dir, built up during
    /// passes A and B and consulted by the peer pass
    dep_dirs: HashMap<PathBuf, BTreeMap<String, PathBuf>>,

    /// Packages linked so far, in link order
    linked: Vec<LinkedPackage>,
}

impl<'a> Linker<'a> {
    pub fn new(store: &'a Store, manifests: &'a ManifestCache) -> Self {
        Self {
            store,
            manifests,
            visited: HashSet::new(),
            dep_dirs: HashMap::new(),
            linked: Vec::new(),
        }
    }

    /// Everything linked during passes A and B
    pub fn linked(&self) -> &[LinkedPackage] {
        &self.linked
    }

    /// Pass A (and, through it, pass B): link each declared dependency
    /// into `modules_dir`
    pub fn link_all<'d, I>(&mut self, modules_dir: &Path, deps: I) -> SlinkResult<()>
    where
        I: IntoIterator<Item = (&'d String, &'d String)>,
    {
        for (name, value) in deps {
            self.link_dep(modules_dir, name, value)?;
        }
        Ok(())
    }

    fn link_dep(&mut self, modules_dir: &Path, name: &str, value: &str) -> SlinkResult<()> {
        match DepTarget::parse(value) {
            DepTarget::Link(path) => {
                // Resolve relative to the directory owning this node_modules
                let base = modules_dir.parent().unwrap_or(modules_dir);
                let target = if path.is_absolute() {
                    path
                } else {
                    base.join(path)
                };
                place_link(modules_dir, name, &target)?;
                self.note_resolution(modules_dir, name, &target);

                // The manifest is read solely for bin entries; transitive
                // dependencies of a linked path are not followed.
                if let Ok(canonical) = target.canonicalize() {
                    if self.visited.insert(canonical) && self.manifests.read(&target).is_ok() {
                        self.linked.push(LinkedPackage {
                            dir: target,
                            parent_modules: modules_dir.to_path_buf(),
                            follow: false,
                        });
                    }
                } else {
                    tracing::debug!("link target {} does not resolve", target.display());
                }
                Ok(())
            }
            DepTarget::Range(range) => {
                let constraint = VersionConstraint::parse(&range)?;
                let version = self.store.max_satisfying(name, &constraint).ok_or_else(|| {
                    crate::core::SlinkError::NoMatchingVersion {
                        package: name.to_string(),
                        range: range.clone(),
                    }
                })?;
                let target = self.store.entry_path(name, &version);

                place_link(modules_dir, name, &target)?;
                self.note_resolution(modules_dir, name, &target);

                // Pass B: the entry's own dependencies
                self.link_transitive(&target, modules_dir)
            }
        }
    }

    /// Pass B: link a store entry's dependencies inside its own
    /// node_modules; first arrival wins per canonical path
    fn link_transitive(&mut self, package_dir: &Path, parent_modules: &Path) -> SlinkResult<()> {
        let Ok(canonical) = package_dir.canonicalize() else {
            return Ok(());
        };
        if !self.visited.insert(canonical) {
            return Ok(());
        }

        self.linked.push(LinkedPackage {
            dir: package_dir.to_path_buf(),
            parent_modules: parent_modules.to_path_buf(),
            follow: true,
        });

        let manifest = self.manifests.read(package_dir)?;
        if manifest.dependencies.is_empty() {
            return Ok(());
        }

        let child_modules = package_dir.join("node_modules");
        for (name, value) in &manifest.dependencies {
            self.link_dep(&child_modules, name, value)?;
        }
        Ok(())
    }

    /// Pass C: peer dependencies, resolved against the parent module
    /// directory of each linked package
    pub fn link_peers(&mut self) -> SlinkResult<()> {
        let mut seen = HashSet::new();
        let linked: Vec<LinkedPackage> = self.linked.clone();
        for pkg in linked.into_iter().filter(|pkg| pkg.follow) {
            self.link_peers_of(&pkg.dir, &pkg.parent_modules, &mut seen)?;
        }
        Ok(())
    }

    fn link_peers_of(
        &mut self,
        package_dir: &Path,
        parent_modules: &Path,
        seen: &mut HashSet<PathBuf>,
    ) -> SlinkResult<()> {
        let Ok(canonical) = package_dir.canonicalize() else {
            return Ok(());
        };
        if !seen.insert(canonical) {
            return Ok(());
        }

        let Ok(manifest) = self.manifests.read(package_dir) else {
            return Ok(());
        };

        let mut peers: BTreeSet<String> = manifest.peer_dependencies.keys().cloned().collect();
        peers.extend(manifest.peer_dependencies_meta.keys().cloned());
        if peers.is_empty() {
            return Ok(());
        }

        for peer in peers {
            let resolution = self
                .dep_dirs
                .get(parent_modules)
                .and_then(|table| table.get(&peer))
                .cloned();

            match resolution {
                Some(target) => {
                    let child_modules = package_dir.join("node_modules");
                    place_link(&child_modules, &peer, &target)?;
                    self.note_resolution(&child_modules, &peer, &target);
                    self.link_peers_of(&target, &child_modules, seen)?;
                }
                None => {
                    let optional = manifest
                        .peer_dependencies_meta
                        .get(&peer)
                        .map(|meta| meta.optional)
                        .unwrap_or(false);
                    if optional {
                        tracing::debug!(
                            "optional peer {} of {} not provided",
                            peer,
                            package_dir.display()
                        );
                    } else {
                        tracing::debug!(
                            "peer {} of {} not resolved by its consumer",
                            peer,
                            package_dir.display()
                        );
                    }
                }
            }
        }
        Ok(())
    }

    fn note_resolution(&mut self, modules_dir: &Path, name: &str, target: &Path) {
        self.dep_dirs
            .entry(modules_dir.to_path_buf())
            .or_default()
            .insert(name.to_string(), target.to_path_buf());
    }
}

/// Create `modules_dir/<name>` as a symlink to `target`, making the
/// `@org` parent directory on demand. An existing entry is left in place.
pub fn place_link(modules_dir: &Path, name: &str, target: &Path) -> SlinkResult<PathBuf> {
    let link_path = match name.split_once('/') {
        Some((scope, simple)) => {
            let scope_dir = modules_dir.join(scope);
            std::fs::create_dir_all(&scope_dir)?;
            scope_dir.join(simple)
        }
        None => {
            std::fs::create_dir_all(modules_dir)?;
            modules_dir.join(name)
        }
    };

    match std::os::unix::fs::symlink(target, &link_path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
        Err(e) => return Err(e.into()),
    }
    Ok(link_path)
}
