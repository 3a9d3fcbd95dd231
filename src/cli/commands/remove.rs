//! slink uninstall - remove packages from the project

use std::path::PathBuf;
use std::time::Instant;

use clap::Args;

use crate::cli::{output, Cli};
use crate::core::{Engine, SlinkResult};
use crate::installer::{InstallOptions, Installer};

#[derive(Args)]
pub struct RemoveArgs {
    /// Packages to remove
    #[arg(required = true)]
    pub packages: Vec<String>,

    /// Project directory
    #[arg(long, default_value = ".")]
    pub cwd: PathBuf,
}

pub async fn execute(args: RemoveArgs, cli: &Cli) -> SlinkResult<()> {
    let start = Instant::now();

    let engine = Engine::new(&args.cwd, cli.store_dir.as_deref())?;
    let installer = Installer::new(&engine, InstallOptions::default());
    let undeclared = installer.uninstall(&args.packages)?;

    if !cli.quiet {
        for name in &args.packages {
            if undeclared.contains(name) {
                output::warning(&format!("{} was not a declared dependency", name));
            } else {
                output::success(&format!("Removed {}", name));
            }
        }
        output::info(&format!(
            "Done in {}",
            output::format_duration(start.elapsed().as_millis())
        ));
    }

    Ok(())
}
