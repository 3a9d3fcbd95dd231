//! slink install - install dependencies, optionally adding new ones

use std::path::PathBuf;
use std::time::Instant;

use clap::Args;

use crate::cli::{output, Cli};
use crate::core::{Engine, SlinkResult};
use crate::installer::{InstallOptions, Installer};

#[derive(Args)]
pub struct InstallArgs {
    /// Packages to add (name, name@range, link:<path>); empty installs
    /// from the manifest
    pub packages: Vec<String>,

    /// Record added packages as dev dependencies
    #[arg(short = 'D', long = "save-dev")]
    pub save_dev: bool,

    /// Record added packages as regular dependencies
    #[arg(short = 'P', long = "save-prod")]
    pub save_prod: bool,

    /// Install devDependencies (default)
    #[arg(long)]
    pub dev: bool,

    /// Skip devDependencies
    #[arg(long)]
    pub prod: bool,

    /// Install every manifest-bearing subdirectory
    #[arg(short, long)]
    pub recursive: bool,

    /// Pass --legacy-peer-deps to the bootstrap installer
    #[arg(long)]
    pub legacy_peer_deps: bool,

    /// Fetch missing packages from the registry directly instead of
    /// invoking the bootstrap installer
    #[arg(long)]
    pub no_bootstrap: bool,

    /// Project directory
    #[arg(long, default_value = ".")]
    pub cwd: PathBuf,
}

impl Default for InstallArgs {
    fn default() -> Self {
        Self {
            packages: Vec::new(),
            save_dev: false,
            save_prod: false,
            dev: false,
            prod: false,
            recursive: false,
            legacy_peer_deps: false,
            no_bootstrap: false,
            cwd: PathBuf::from("."),
        }
    }
}

pub async fn execute(args: InstallArgs, cli: &Cli) -> SlinkResult<()> {
    let start = Instant::now();

    let engine = Engine::new(&args.cwd, cli.store_dir.as_deref())?;

    let opts = InstallOptions {
        dev: args.dev || !args.prod,
        save_dev: args.save_dev && !args.save_prod,
        recursive: args.recursive,
        legacy_peer_deps: args.legacy_peer_deps,
        direct_fetch: args.no_bootstrap,
    };

    let progress = if !cli.quiet {
        Some(output::spinner("Resolving dependencies..."))
    } else {
        None
    };

    let installer = Installer::new(&engine, opts);
    let result = installer.install(&args.packages).await;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    let summary = result?;

    if !cli.quiet {
        for (name, value) in &summary.added {
            output::success(&format!("Added {}", output::package_version(name, value)));
        }
        if summary.absorbed > 0 {
            output::info(&format!("{} new packages in the store", summary.absorbed));
        }
        output::success(&format!(
            "Linked {} packages across {} project(s) in {}",
            summary.linked,
            summary.projects,
            output::format_duration(start.elapsed().as_millis())
        ));
    }

    Ok(())
}
