//! Direct fetch mode
//!
//! Resolves ranges against the registry, downloads tarballs, and unpacks
//! them straight into the store, walking the dependency closure. Each
//! `name@range` pair is resolved at most once per run.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use futures::stream::{self, StreamExt};
use semver::Version;
use tar::Archive;

use crate::core::{Engine, SlinkError, SlinkResult};
use crate::registry::{resolve_range, tarball_url};
use crate::store::StoreKey;

/// Direct fetcher over the engine's registry and store
pub struct Fetcher<'a> {
    engine: &'a Engine,
}

impl<'a> Fetcher<'a> {
    pub fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Fetch the closure of the given `(name, range)` roots into the
    /// store. Already-cached versions are skipped but still contribute
    /// their dependency edges.
    pub async fn fetch_closure(&self, roots: Vec<(String, String)>) -> SlinkResult<Vec<StoreKey>> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut pending = roots;
        let mut fetched = Vec::new();

        while !pending.is_empty() {
            let wave: Vec<(String, String)> = pending
                .drain(..)
                .filter(|(name, range)| seen.insert(format!("{}@{}", name, range)))
                .collect();

            let results: Vec<SlinkResult<(Option<StoreKey>, Vec<(String, String)>)>> =
                stream::iter(wave.into_iter().map(|(name, range)| self.fetch_one(name, range)))
                    .buffer_unordered(self.engine.config.network.concurrency)
                    .collect()
                    .await;

            let mut errors = Vec::new();
            for result in results {
                match result {
                    Ok((key, deps)) => {
                        fetched.extend(key);
                        pending.extend(deps);
                    }
                    Err(e) => errors.push(e),
                }
            }
            if !errors.is_empty() {
                return Err(SlinkError::collect(errors));
            }
        }

        Ok(fetched)
    }

    async fn fetch_one(
        &self,
        name: String,
        range: String,
    ) -> SlinkResult<(Option<StoreKey>, Vec<(String, String)>)> {
        let info = self.engine.registry.info(&name).await?;
        let version = resolve_range(&info, &range)?;

        let deps: Vec<(String, String)> = info
            .versions
            .get(&version.to_string())
            .map(|v| {
                v.dependencies
                    .iter()
                    .map(|(n, r)| (n.clone(), r.clone()))
                    .collect()
            })
            .unwrap_or_default();

        if self.engine.store.has(&name, &version) {
            return Ok((None, deps));
        }

        let url = tarball_url(&info, &version)?;
        tracing::debug!("fetching {}@{}", name, version);
        let bytes = self.engine.registry.download(&url).await?;
        self.unpack_into_store(&name, &version, &bytes)?;
        self.engine.store.add(&name, version.clone());

        Ok((Some(StoreKey { name, version }), deps))
    }

    /// Unpack a gzipped tarball into the store entry for `name@version`.
    /// The archive is staged next to its final location and renamed in, so
    /// a concurrent install racing on the same entry stays benign.
    fn unpack_into_store(&self, name: &str, version: &Version, bytes: &[u8]) -> SlinkResult<()> {
        let target = self.engine.store.entry_path(name, version);
        if target.exists() {
            return Ok(());
        }

        let simple = name.rsplit('/').next().unwrap_or(name);
        let staging = self.engine.store.dir().join(format!(
            ".staging-{}-{}@{}",
            std::process::id(),
            simple,
            version
        ));
        std::fs::create_dir_all(&staging)?;

        let result = unpack_tarball(bytes, &staging, name);
        if result.is_err() {
            let _ = std::fs::remove_dir_all(&staging);
            return result;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        match std::fs::rename(&staging, &target) {
            Ok(()) => Ok(()),
            Err(_) if target.exists() => {
                std::fs::remove_dir_all(&staging)?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Extract a registry tarball, stripping the `package/` prefix
fn unpack_tarball(bytes: &[u8], dest: &Path, name: &str) -> SlinkResult<()> {
    let decoder = GzDecoder::new(bytes);
    let mut archive = Archive::new(decoder);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = entry.path()?.into_owned();

        if entry_path.is_absolute() || entry_path.to_string_lossy().contains("..") {
            return Err(SlinkError::store(format!(
                "{}: refusing archive path {}",
                name,
                entry_path.display()
            )));
        }

        let relative = entry_path
            .strip_prefix("package")
            .unwrap_or(&entry_path);
        if relative.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(relative);

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if entry.header().entry_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.header().entry_type().is_file() {
            let mut content = Vec::new();
            entry.read_to_end(&mut content)?;
            std::fs::write(&target, content)?;

            use std::os::unix::fs::PermissionsExt;
            if let Ok(mode) = entry.header().mode() {
                let _ = std::fs::set_permissions(&target, std::fs::Permissions::from_mode(mode));
            }
        }
    }

    Ok(())
}
