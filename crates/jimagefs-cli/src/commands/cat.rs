//! `jimg cat`: Write the content of a file to stdout.

use std::io::{self, Write};

use clap::Args;
use jimagefs_vfs::OverlayFs;

/// Arguments for the `cat` command.
#[derive(Args, Debug)]
pub struct CatArgs {
    /// Overlay path of a file.
    pub path: String,

    /// Skip a leading UTF-8 byte-order mark.
    #[arg(long)]
    pub strip_bom: bool,
}

/// Executes the `cat` command.
///
/// # Errors
///
/// Returns an error if the path is missing, names a directory, or stdout
/// cannot be written.
pub fn execute(fs: &OverlayFs, args: &CatArgs) -> anyhow::Result<()> {
    let node = super::resolve(fs, &args.path)?;
    let mut stdout = io::stdout().lock();
    if args.strip_bom {
        let mut stream = node.open_read_stream()?;
        let _ = io::copy(&mut stream, &mut stdout)?;
    } else {
        stdout.write_all(&node.read_bytes()?)?;
    }
    stdout.flush()?;
    Ok(())
}
