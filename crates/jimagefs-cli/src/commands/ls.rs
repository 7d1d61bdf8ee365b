//! `jimg ls`: List the entries of a directory.

use clap::Args;
use jimagefs_vfs::OverlayFs;

use crate::output::format_bytes;

/// Arguments for the `ls` command.
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Overlay path (`<runtime-home>!!/<path>`).
    pub path: String,
}

/// Executes the `ls` command.
///
/// # Errors
///
/// Returns an error if the path is malformed or missing.
pub fn execute(fs: &OverlayFs, args: &LsArgs) -> anyhow::Result<()> {
    let node = super::resolve(fs, &args.path)?;
    let children = node.children();
    tracing::debug!(path = %node, count = children.len(), "listing");

    if !node.is_directory() {
        println!("{:<6} {:>10}  {}", "file", format_bytes(node.size()), node.name());
        return Ok(());
    }
    for child in children {
        let kind = if child.is_directory() { "dir" } else { "file" };
        let size = if child.is_directory() {
            "-".to_string()
        } else {
            format_bytes(child.size())
        };
        println!("{kind:<6} {size:>10}  {}", child.name());
    }
    Ok(())
}
