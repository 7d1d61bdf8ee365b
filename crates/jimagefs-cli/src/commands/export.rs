//! `jimg export`: Write a subtree into a tar archive.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use jimagefs_vfs::OverlayFs;
use jimagefs_vfs::archive::{Compression, export_tar};

use crate::output::format_bytes;

/// Arguments for the `export` command.
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Overlay path of the entry to export.
    pub path: String,

    /// Archive file to create.
    pub output: PathBuf,

    /// Gzip-compress the archive.
    #[arg(long)]
    pub gzip: bool,
}

/// Executes the `export` command.
///
/// # Errors
///
/// Returns an error if the path is missing or the archive cannot be written.
pub fn execute(fs: &OverlayFs, args: &ExportArgs) -> anyhow::Result<()> {
    let node = super::resolve(fs, &args.path)?;
    let file = File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    let compression = if args.gzip {
        Compression::Gzip
    } else {
        Compression::None
    };

    let mut writer = BufWriter::new(file);
    let summary = export_tar(&node, &mut writer, compression)?;
    writer.flush()?;
    println!(
        "Exported {} files and {} directories ({}) to {}",
        summary.files,
        summary.directories,
        format_bytes(summary.bytes),
        args.output.display()
    );
    Ok(())
}
