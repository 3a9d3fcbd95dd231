//! Install orchestration
//!
//! Drives one project install end to end: merge CLI instructions into the
//! manifest, hydrate the store with anything unresolved, then run the
//! link passes and executable shims. Recursive mode repeats the procedure
//! for every manifest-bearing subdirectory.

pub mod bins;
pub mod bootstrap;
pub mod fetch;
pub mod linker;

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::core::{Engine, Manifest, SlinkResult};
use crate::resolver::spec::{expand_token, DepTarget, Section};
use crate::resolver::VersionConstraint;

pub use bins::BinLinker;
pub use bootstrap::Bootstrap;
pub use fetch::Fetcher;
pub use linker::Linker;

/// Options for one install run
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Install devDependencies of the project
    pub dev: bool,

    /// Record newly added packages into devDependencies
    pub save_dev: bool,

    /// Run over every manifest-bearing subdirectory
    pub recursive: bool,

    /// Pass the legacy peer resolution flag to the bootstrap installer
    pub legacy_peer_deps: bool,

    /// Resolve and unpack missing packages directly instead of invoking
    /// the bootstrap installer
    pub direct_fetch: bool,
}

/// What an install run did
#[derive(Debug, Default)]
pub struct InstallSummary {
    /// Projects processed
    pub projects: usize,

    /// Packages linked across all passes
    pub linked: usize,

    /// New store keys collected
    pub absorbed: usize,

    /// Packages added through CLI tokens, with their recorded values
    pub added: Vec<(String, String)>,
}

/// Install orchestrator
pub struct Installer<'a> {
    engine: &'a Engine,
    opts: InstallOptions,
}

impl<'a> Installer<'a> {
    pub fn new(engine: &'a Engine, opts: InstallOptions) -> Self {
        Self { engine, opts }
    }

    /// Run the install over the engine's project (or, in recursive mode,
    /// every project below it)
    pub async fn install(&self, tokens: &[String]) -> SlinkResult<InstallSummary> {
        let mut summary = InstallSummary::default();

        if self.opts.recursive {
            for project in discover_projects(&self.engine.project_dir)? {
                self.install_project(&project, tokens, &mut summary).await?;
            }
        } else {
            let project = self.engine.project_dir.clone();
            self.install_project(&project, tokens, &mut summary).await?;
        }

        Ok(summary)
    }

    async fn install_project(
        &self,
        project_dir: &Path,
        tokens: &[String],
        summary: &mut InstallSummary,
    ) -> SlinkResult<()> {
        tracing::debug!("installing {}", project_dir.display());
        summary.projects += 1;

        if !project_dir.join("package.json").exists() {
            Manifest::default().save(project_dir)?;
        }
        let mut manifest = Manifest::load(project_dir)?;

        // Merge CLI instructions; tokens may introduce deps the store has
        // never seen
        let mut new_deps: BTreeMap<String, String> = BTreeMap::new();
        if !tokens.is_empty() {
            self.merge_tokens(project_dir, tokens, &mut manifest, &mut new_deps, summary)
                .await?;
            manifest.save(project_dir)?;
        }

        // Anything declared but absent from the store also needs hydration
        let wanted = self.wanted_deps(&manifest);
        for (name, value) in &wanted {
            if let DepTarget::Range(range) = DepTarget::parse(value) {
                let constraint = VersionConstraint::parse(&range)?;
                if self.engine.store.max_satisfying(name, &constraint).is_none() {
                    new_deps.insert(name.clone(), range);
                }
            }
        }

        let node_modules = self.engine.node_modules_path(project_dir);
        if !new_deps.is_empty() {
            summary.absorbed += self.hydrate(&node_modules, &new_deps).await?;
        }

        // Link passes over the now-complete store
        let mut linker = Linker::new(&self.engine.store, &self.engine.manifests);
        linker.link_all(&node_modules, wanted.iter())?;
        linker.link_peers()?;

        let bins = BinLinker::new(node_modules.join(".bin"), &self.engine.shim_targets);
        bins.install_all(linker.linked(), &self.engine.manifests)?;
        summary.linked += linker.linked().len();

        // Scratch cleanup is best-effort
        let scratch = node_modules.join(".tmp");
        if scratch.exists() {
            if let Err(e) = std::fs::remove_dir_all(&scratch) {
                tracing::warn!("could not clean {}: {}", scratch.display(), e);
            }
        }

        Ok(())
    }

    /// Expand install tokens and record them into the manifest. A token
    /// without an explicit range is pinned to `^<resolved>`, preferring a
    /// store match over a registry lookup.
    async fn merge_tokens(
        &self,
        project_dir: &Path,
        tokens: &[String],
        manifest: &mut Manifest,
        new_deps: &mut BTreeMap<String, String>,
        summary: &mut InstallSummary,
    ) -> SlinkResult<()> {
        let default_section = if self.opts.save_dev {
            Section::DevDependencies
        } else {
            Section::Dependencies
        };

        for token in tokens {
            for (request, section) in expand_token(token, default_section)? {
                tracing::debug!("adding {}", request.format());
                let (name, value) = match &request.target {
                    DepTarget::Link(path) => {
                        let target = if path.is_absolute() {
                            path.clone()
                        } else {
                            project_dir.join(path)
                        };
                        // Prefer the linked package's own name
                        let name = Manifest::load(&target)
                            .ok()
                            .and_then(|m| m.name)
                            .unwrap_or_else(|| request.name.clone());
                        (name, request.target.format())
                    }
                    DepTarget::Range(range) => {
                        let value = self.pin_range(&request.name, range, new_deps).await?;
                        (request.name.clone(), value)
                    }
                };

                summary.added.push((name.clone(), value.clone()));
                match section {
                    Section::Dependencies => manifest.dependencies.insert(name, value),
                    Section::DevDependencies => manifest.dev_dependencies.insert(name, value),
                };
            }
        }
        Ok(())
    }

    async fn pin_range(
        &self,
        name: &str,
        range: &str,
        new_deps: &mut BTreeMap<String, String>,
    ) -> SlinkResult<String> {
        if range == "*" {
            // No explicit range: record a caret on whatever resolves
            if self.engine.store.any(name) {
                if let Some(version) = self.engine.store.max_satisfying(name, &VersionConstraint::Any) {
                    return Ok(format!("^{}", version));
                }
            }
            let versions = self.engine.registry.available_versions(name).await?;
            let version = versions
                .last()
                .ok_or_else(|| crate::core::SlinkError::PackageNotFound(name.to_string()))?;
            let pinned = format!("^{}", version);
            new_deps.insert(name.to_string(), pinned.clone());
            Ok(pinned)
        } else {
            let constraint = VersionConstraint::parse(range)?;
            if self.engine.store.max_satisfying(name, &constraint).is_none() {
                new_deps.insert(name.to_string(), range.to_string());
            }
            Ok(range.to_string())
        }
    }

    /// The project's declared dependencies, devDependencies included when
    /// dev mode is on
    fn wanted_deps(&self, manifest: &Manifest) -> BTreeMap<String, String> {
        let mut wanted = manifest.dependencies.clone();
        if self.opts.dev {
            for (name, value) in &manifest.dev_dependencies {
                wanted.entry(name.clone()).or_insert_with(|| value.clone());
            }
        }
        wanted
    }

    /// Hydrate the store with unresolved deps, via direct fetch or the
    /// bootstrap installer
    async fn hydrate(
        &self,
        node_modules: &Path,
        new_deps: &BTreeMap<String, String>,
    ) -> SlinkResult<usize> {
        if self.opts.direct_fetch {
            let fetcher = Fetcher::new(self.engine);
            let roots = new_deps
                .iter()
                .map(|(n, r)| (n.clone(), r.clone()))
                .collect();
            return Ok(fetcher.fetch_closure(roots).await?.len());
        }

        let scratch = node_modules.join(".tmp");
        let bootstrap = Bootstrap::new(
            &self.engine.config.bootstrap.command,
            self.opts.legacy_peer_deps,
        );
        let scratch_modules = bootstrap.hydrate(&scratch, new_deps).await?;
        if !scratch_modules.exists() {
            return Ok(0);
        }
        let keys = self.engine.store.absorb(&scratch_modules)?;
        for key in &keys {
            tracing::debug!("absorbed {}", key);
        }
        Ok(keys.len())
    }

    /// Remove packages from the project: drop the node_modules entry and
    /// both manifest sections. The store is never touched. Returns the
    /// names that were not declared in either section.
    pub fn uninstall(&self, names: &[String]) -> SlinkResult<Vec<String>> {
        let project_dir = &self.engine.project_dir;
        let mut manifest = Manifest::load(project_dir)?;
        let node_modules = self.engine.node_modules_path(project_dir);

        let mut undeclared = Vec::new();
        for name in names {
            let entry = match name.split_once('/') {
                Some((scope, simple)) => node_modules.join(scope).join(simple),
                None => node_modules.join(name),
            };
            remove_entry(&entry)?;

            let in_deps = manifest.dependencies.remove(name).is_some();
            let in_dev = manifest.dev_dependencies.remove(name).is_some();
            if !in_deps && !in_dev {
                undeclared.push(name.clone());
            }
        }

        manifest.save(project_dir)?;
        Ok(undeclared)
    }
}

/// Remove a node_modules entry, whether symlink or real directory
fn remove_entry(path: &Path) -> SlinkResult<()> {
    match path.symlink_metadata() {
        Ok(meta) if meta.file_type().is_symlink() || meta.is_file() => {
            std::fs::remove_file(path)?;
        }
        Ok(_) => {
            std::fs::remove_dir_all(path)?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Every manifest-bearing directory below `root`, depth-first, skipping
/// node_modules and hidden entries
fn discover_projects(root: &Path) -> SlinkResult<Vec<PathBuf>> {
    let mut projects = Vec::new();
    let mut visited = HashSet::new();

    let walker = WalkDir::new(root)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            !name.starts_with('.') && name != "node_modules"
        });

    for entry in walker {
        let entry = entry.map_err(|e| std::io::Error::other(e))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let dir = entry.path();
        if !dir.join("package.json").exists() {
            continue;
        }
        let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        if visited.insert(canonical) {
            projects.push(dir.to_path_buf());
        }
    }

    Ok(projects)
}
