//! CLI module for slink
//!
//! Provides the command-line interface using clap. Running slink with no
//! subcommand installs from the manifest.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// slink - a fast symlink-based package installer
#[derive(Parser)]
#[command(name = "slink")]
#[command(version)]
#[command(about = "Install packages as symlinks into a shared store", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Store directory (default: ~/.slink-store)
    #[arg(long, global = true)]
    pub store_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install dependencies, optionally adding new ones
    #[command(visible_aliases = ["i", "add", "a"])]
    Install(commands::install::InstallArgs),

    /// Remove packages from the project
    #[command(visible_aliases = ["u", "remove", "r"])]
    Uninstall(commands::remove::RemoveArgs),
}
