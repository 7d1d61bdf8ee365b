//! CLI command definitions and dispatch.

pub mod cat;
pub mod export;
pub mod ls;
pub mod stat;
pub mod tree;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use jimagefs_common::config::JimageFsConfig;
use jimagefs_vfs::{HostEnvironment, Node, OverlayFs};

/// jimg: browse modular runtime images through the overlay filesystem.
#[derive(Parser, Debug)]
#[command(name = "jimg", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Host runtime feature version; versions below 9 open images through a
    /// dedicated loader.
    #[arg(long, global = true)]
    pub host_version: Option<u32>,

    /// JSON configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the entries of a directory.
    Ls(ls::LsArgs),
    /// Write the content of a file to stdout.
    Cat(cat::CatArgs),
    /// Show the attributes of an entry.
    Stat(stat::StatArgs),
    /// Print an indented tree of a directory.
    Tree(tree::TreeArgs),
    /// Write a subtree into a tar archive.
    Export(export::ExportArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the command fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => JimageFsConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => JimageFsConfig::default(),
    };
    if cli.host_version.is_some() {
        config.host.runtime_version = cli.host_version;
    }
    let host = HostEnvironment::install(HostEnvironment::from_config(&config.host)?);
    tracing::debug!(runtime_version = host.runtime_version(), "host environment ready");

    let fs = OverlayFs::new();
    match cli.command {
        Command::Ls(args) => ls::execute(&fs, &args),
        Command::Cat(args) => cat::execute(&fs, &args),
        Command::Stat(args) => stat::execute(&fs, &args),
        Command::Tree(args) => tree::execute(&fs, &args),
        Command::Export(args) => export::execute(&fs, &args),
    }
}

/// Resolves an overlay path, failing if it does not exist.
///
/// # Errors
///
/// Returns an error if the path is malformed or names no entry.
pub fn resolve(fs: &OverlayFs, path: &str) -> anyhow::Result<Node> {
    fs.find(path)?
        .with_context(|| format!("no such entry: {path}"))
}
