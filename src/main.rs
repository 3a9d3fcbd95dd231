//! slink - a symlink-based package installer
//!
//! slink materializes every dependency as a symbolic link into a shared
//! content-addressed store keyed by `name@version`, instead of copying
//! files into each project's node_modules.

mod cli;
mod core;
mod installer;
mod registry;
mod resolver;
mod store;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let mut cli = Cli::parse();

    let default_filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let result = match cli.command.take() {
        Some(Commands::Install(args)) => cli::commands::install::execute(args, &cli).await,
        Some(Commands::Uninstall(args)) => cli::commands::remove::execute(args, &cli).await,
        // Bare `slink` installs everything the manifest declares.
        None => cli::commands::install::execute(Default::default(), &cli).await,
    };

    if let Err(e) = result {
        cli::output::error(&format!("slink {}: {}", env!("CARGO_PKG_VERSION"), e));
        std::process::exit(1);
    }
}
