//! Executable shim handler
//!
//! Packages declare executables through the manifest `bin` field. Each
//! target file gets an interpreter directive if it lacks one, execute
//! permission, and a symlink under `node_modules/.bin`.

use std::collections::HashSet;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::core::manifest::Bin;
use crate::core::{ManifestCache, SlinkResult};
use crate::installer::linker::LinkedPackage;

/// Shim installer for one project's `.bin` directory
pub struct BinLinker<'a> {
    bin_dir: PathBuf,

    /// Targets already processed this run, shared across projects
    seen: &'a Mutex<HashSet<PathBuf>>,
}

impl<'a> BinLinker<'a> {
    pub fn new(bin_dir: PathBuf, seen: &'a Mutex<HashSet<PathBuf>>) -> Self {
        Self { bin_dir, seen }
    }

    /// Install shims for every linked package that declares executables
    pub fn install_all(
        &self,
        packages: &[LinkedPackage],
        manifests: &ManifestCache,
    ) -> SlinkResult<()> {
        for pkg in packages {
            let Ok(manifest) = manifests.read(&pkg.dir) else {
                continue;
            };
            match &manifest.bin {
                None => {}
                Some(Bin::Single(rel)) => {
                    let name = manifest
                        .name
                        .as_deref()
                        .map(simple_name)
                        .unwrap_or_default()
                        .to_string();
                    if !name.is_empty() {
                        self.install_shim(&name, &pkg.dir, rel)?;
                    }
                }
                Some(Bin::Table(map)) => {
                    for (name, rel) in map {
                        self.install_shim(name, &pkg.dir, rel)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn install_shim(&self, name: &str, package_dir: &Path, rel: &str) -> SlinkResult<()> {
        let target = package_dir.join(rel);
        let Ok(canonical) = target.canonicalize() else {
            tracing::debug!("bin target {} missing, skipping", target.display());
            return Ok(());
        };

        if self.seen.lock().unwrap().insert(canonical.clone()) {
            ensure_executable(&canonical)?;
        }

        std::fs::create_dir_all(&self.bin_dir)?;
        let link = self.bin_dir.join(name);
        match std::os::unix::fs::symlink(&target, &link) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

/// The unscoped part of a package name
fn simple_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Give a script an interpreter directive and execute permission. A file
/// whose first byte is not `#` is rewritten atomically with a node shebang
/// prepended.
fn ensure_executable(path: &Path) -> SlinkResult<()> {
    let content = std::fs::read(path)?;

    if content.first() != Some(&b'#') {
        let mut rewritten = Vec::with_capacity(content.len() + 24);
        rewritten.extend_from_slice(b"#!/usr/bin/env node\n");
        rewritten.extend_from_slice(&content);

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let staging = path.with_file_name(format!(".{}.slink", file_name));
        std::fs::write(&staging, rewritten)?;
        std::fs::rename(&staging, path)?;
    }

    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn seed_package(dir: &Path, manifest: &str, files: &[(&str, &str)]) -> PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join("package.json"), manifest).unwrap();
        for (rel, content) in files {
            let path = dir.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        dir.to_path_buf()
    }

    fn run(packages: Vec<LinkedPackage>, bin_dir: PathBuf) -> SlinkResult<()> {
        let seen = Mutex::new(HashSet::new());
        let manifests = ManifestCache::default();
        BinLinker::new(bin_dir, &seen).install_all(&packages, &manifests)
    }

    #[test]
    fn test_single_bin_uses_simple_name() {
        let dir = tempdir().unwrap();
        let pkg = seed_package(
            &dir.path().join("pkg"),
            r#"{"name": "@org/tool", "version": "1.0.0", "bin": "cli.js"}"#,
            &[("cli.js", "console.log('hi')\n")],
        );
        let bin_dir = dir.path().join(".bin");

        run(
            vec![LinkedPackage {
                dir: pkg.clone(),
                parent_modules: dir.path().to_path_buf(),
                follow: true,
            }],
            bin_dir.clone(),
        )
        .unwrap();

        let shim = bin_dir.join("tool");
        assert!(shim.symlink_metadata().unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read_link(&shim).unwrap(), pkg.join("cli.js"));
    }

    #[test]
    fn test_bin_table_installs_each_entry() {
        let dir = tempdir().unwrap();
        let pkg = seed_package(
            &dir.path().join("pkg"),
            r#"{"name": "typescript", "version": "5.0.0", "bin": {"tsc": "bin/tsc", "tsserver": "bin/tsserver"}}"#,
            &[("bin/tsc", "#!/usr/bin/env node\nrun()\n"), ("bin/tsserver", "run()\n")],
        );
        let bin_dir = dir.path().join(".bin");

        run(
            vec![LinkedPackage {
                dir: pkg,
                parent_modules: dir.path().to_path_buf(),
                follow: true,
            }],
            bin_dir.clone(),
        )
        .unwrap();

        assert!(bin_dir.join("tsc").symlink_metadata().is_ok());
        assert!(bin_dir.join("tsserver").symlink_metadata().is_ok());
    }

    #[test]
    fn test_shebang_added_and_mode_set() {
        let dir = tempdir().unwrap();
        let pkg = seed_package(
            &dir.path().join("pkg"),
            r#"{"name": "tool", "version": "1.0.0", "bin": "cli.js"}"#,
            &[("cli.js", "console.log('hi')\n")],
        );

        run(
            vec![LinkedPackage {
                dir: pkg.clone(),
                parent_modules: dir.path().to_path_buf(),
                follow: true,
            }],
            dir.path().join(".bin"),
        )
        .unwrap();

        let content = std::fs::read_to_string(pkg.join("cli.js")).unwrap();
        assert!(content.starts_with("#!/usr/bin/env node\n"));
        assert!(content.ends_with("console.log('hi')\n"));

        let mode = std::fs::metadata(pkg.join("cli.js")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_existing_shebang_untouched() {
        let dir = tempdir().unwrap();
        let original = "#!/usr/bin/env node\nconsole.log('hi')\n";
        let pkg = seed_package(
            &dir.path().join("pkg"),
            r#"{"name": "tool", "version": "1.0.0", "bin": "cli.js"}"#,
            &[("cli.js", original)],
        );

        run(
            vec![LinkedPackage {
                dir: pkg.clone(),
                parent_modules: dir.path().to_path_buf(),
                follow: true,
            }],
            dir.path().join(".bin"),
        )
        .unwrap();

        assert_eq!(std::fs::read_to_string(pkg.join("cli.js")).unwrap(), original);
    }

    #[test]
    fn test_missing_target_skipped() {
        let dir = tempdir().unwrap();
        let pkg = seed_package(
            &dir.path().join("pkg"),
            r#"{"name": "tool", "version": "1.0.0", "bin": "no-such-file.js"}"#,
            &[],
        );

        run(
            vec![LinkedPackage {
                dir: pkg,
                parent_modules: dir.path().to_path_buf(),
                follow: true,
            }],
            dir.path().join(".bin"),
        )
        .unwrap();
    }

    #[test]
    fn test_target_processed_once() {
        let dir = tempdir().unwrap();
        let pkg = seed_package(
            &dir.path().join("pkg"),
            r#"{"name": "tool", "version": "1.0.0", "bin": "cli.js"}"#,
            &[("cli.js", "x\n")],
        );

        let seen = Mutex::new(HashSet::new());
        let manifests = ManifestCache::default();
        let packages = vec![LinkedPackage {
            dir: pkg.clone(),
            parent_modules: dir.path().to_path_buf(),
            follow: true,
        }];

        BinLinker::new(dir.path().join(".bin"), &seen)
            .install_all(&packages, &manifests)
            .unwrap();
        let once = std::fs::read_to_string(pkg.join("cli.js")).unwrap();

        BinLinker::new(dir.path().join("other-bin"), &seen)
            .install_all(&packages, &manifests)
            .unwrap();
        let twice = std::fs::read_to_string(pkg.join("cli.js")).unwrap();

        // One shebang only; the second run found the target in the seen set
        assert_eq!(once, twice);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
