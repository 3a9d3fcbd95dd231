//! Engine context wiring all slink collaborators
//!
//! The store index, registry cache, manifest cache, and shim-target set are
//! process-wide; passing them through one context keeps recursive mode and
//! tests straightforward.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::core::{Config, ManifestCache, SlinkResult};
use crate::registry::RegistryClient;
use crate::store::Store;

/// Shared context for one slink run
pub struct Engine {
    /// Directory the command was invoked on
    pub project_dir: PathBuf,

    /// Configuration
    pub config: Config,

    /// Package store
    pub store: Arc<Store>,

    /// Registry client
    pub registry: Arc<RegistryClient>,

    /// Manifest cache for store entries and link targets
    pub manifests: ManifestCache,

    /// Executable targets already processed this run
    pub shim_targets: Mutex<HashSet<PathBuf>>,
}

impl Engine {
    /// Create an engine for the given project directory, opening and
    /// scanning the store
    pub fn new(project_dir: &Path, store_dir_override: Option<&Path>) -> SlinkResult<Self> {
        let project_dir = absolutize(project_dir)?;
        let config = Config::load(&project_dir)?;

        let store_dir = match store_dir_override {
            Some(dir) => absolutize(dir)?,
            None => config.store_dir()?,
        };
        let store = Arc::new(Store::open(&store_dir)?);

        let registry = Arc::new(RegistryClient::new(&config)?);

        Ok(Self {
            project_dir,
            config,
            store,
            registry,
            manifests: ManifestCache::default(),
            shim_targets: Mutex::new(HashSet::new()),
        })
    }

    /// Get the node_modules path of a project directory
    pub fn node_modules_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join("node_modules")
    }
}

/// Resolve a possibly-relative path against the current directory
pub fn absolutize(path: &Path) -> SlinkResult<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
