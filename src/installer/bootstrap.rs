//! Bootstrap hydration
//!
//! Packages the store has never seen are fetched by one invocation of an
//! external installer. slink writes a minimal manifest listing only the
//! unresolved ranges into a scratch directory, runs the installer there,
//! and absorbs whatever lands under the scratch node_modules.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::{Manifest, SlinkError, SlinkResult};

/// One bootstrap invocation
pub struct Bootstrap<'a> {
    command: &'a str,
    legacy_peer_deps: bool,
}

impl<'a> Bootstrap<'a> {
    pub fn new(command: &'a str, legacy_peer_deps: bool) -> Self {
        Self {
            command,
            legacy_peer_deps,
        }
    }

    /// Run the external installer over the given unresolved deps inside
    /// `scratch_dir`. On success the fetched packages sit under
    /// `scratch_dir/node_modules`; on failure the scratch directory is
    /// left in place for diagnosis.
    pub async fn hydrate(
        &self,
        scratch_dir: &Path,
        deps: &BTreeMap<String, String>,
    ) -> SlinkResult<PathBuf> {
        std::fs::create_dir_all(scratch_dir)?;

        let manifest = Manifest {
            name: Some("slink-scratch".to_string()),
            version: Some("0.0.0".to_string()),
            dependencies: deps.clone(),
            rest: [("private".to_string(), serde_json::Value::Bool(true))]
                .into_iter()
                .collect(),
            ..Default::default()
        };
        manifest.save(scratch_dir)?;

        let mut command = tokio::process::Command::new(self.command);
        command.arg("install").current_dir(scratch_dir);
        if self.legacy_peer_deps {
            command.arg("--legacy-peer-deps");
        }

        tracing::debug!(
            "bootstrapping {} deps with `{} install`",
            deps.len(),
            self.command
        );
        let output = command.output().await?;

        if !output.status.success() {
            return Err(SlinkError::Bootstrap {
                scratch: scratch_dir.to_path_buf(),
                deps: deps
                    .iter()
                    .map(|(name, range)| format!("{}@{}", name, range))
                    .collect(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(scratch_dir.join("node_modules"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn deps(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_hydrate_writes_minimal_manifest() {
        let scratch = tempdir().unwrap();

        // `true` exits 0 and fetches nothing; only the contract matters here
        let bootstrap = Bootstrap::new("true", false);
        let modules = bootstrap
            .hydrate(scratch.path(), &deps(&[("left-pad", "^1.3.0")]))
            .await
            .unwrap();
        assert_eq!(modules, scratch.path().join("node_modules"));

        let manifest = Manifest::load(scratch.path()).unwrap();
        assert_eq!(manifest.name.as_deref(), Some("slink-scratch"));
        assert_eq!(manifest.dependencies.get("left-pad").unwrap(), "^1.3.0");
        assert_eq!(
            manifest.rest.get("private"),
            Some(&serde_json::Value::Bool(true))
        );
    }

    #[tokio::test]
    async fn test_failure_carries_output_and_scratch() {
        let scratch = tempdir().unwrap();

        let bootstrap = Bootstrap::new("false", false);
        let err = bootstrap
            .hydrate(scratch.path(), &deps(&[("ghost", "*")]))
            .await
            .unwrap_err();

        match err {
            SlinkError::Bootstrap { scratch: dir, deps, .. } => {
                assert_eq!(dir, scratch.path());
                assert_eq!(deps, vec!["ghost@*".to_string()]);
            }
            other => panic!("unexpected error: {}", other),
        }
        // Left in place for diagnosis
        assert!(scratch.path().join("package.json").exists());
    }
}
