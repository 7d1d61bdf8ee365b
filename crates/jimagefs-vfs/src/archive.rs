//! Export of an overlay subtree to a tar archive.
//!
//! Entry names are relative to the exported node. A file node exports as a
//! single entry named after the file.

use std::io::{self, Write};
use std::path::PathBuf;

use jimagefs_common::error::{ImageFsError, Result};

use crate::node::Node;

/// Archive compression applied on export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Plain `.tar`.
    #[default]
    None,
    /// Gzip-compressed `.tar.gz`.
    Gzip,
}

/// Counts of what an export wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Regular file entries.
    pub files: usize,
    /// Directory entries.
    pub directories: usize,
    /// Total content bytes of file entries.
    pub bytes: u64,
}

/// Writes the subtree rooted at `node` into a tar stream on `writer`.
///
/// # Errors
///
/// Returns an error if an entry cannot be read or the archive cannot be
/// written.
pub fn export_tar<W: Write>(
    node: &Node,
    writer: W,
    compression: Compression,
) -> Result<ExportSummary> {
    tracing::info!(path = %node, ?compression, "exporting subtree");
    let summary = match compression {
        Compression::None => {
            let mut builder = tar::Builder::new(writer);
            let summary = append_subtree(&mut builder, node)?;
            let _ = builder.into_inner().map_err(|e| archive_error(node, e))?;
            summary
        }
        Compression::Gzip => {
            let encoder = flate2::write::GzEncoder::new(writer, flate2::Compression::default());
            let mut builder = tar::Builder::new(encoder);
            let summary = append_subtree(&mut builder, node)?;
            let encoder = builder.into_inner().map_err(|e| archive_error(node, e))?;
            let _ = encoder.finish().map_err(|e| archive_error(node, e))?;
            summary
        }
    };
    tracing::info!(
        files = summary.files,
        directories = summary.directories,
        bytes = summary.bytes,
        "export complete"
    );
    Ok(summary)
}

fn append_subtree<W: Write>(builder: &mut tar::Builder<W>, node: &Node) -> Result<ExportSummary> {
    let mut summary = ExportSummary::default();
    if node.is_directory() {
        for child in node.children() {
            append_node(builder, child, child.name(), &mut summary)?;
        }
    } else {
        append_node(builder, node, node.name(), &mut summary)?;
    }
    Ok(summary)
}

fn append_node<W: Write>(
    builder: &mut tar::Builder<W>,
    node: &Node,
    name: &str,
    summary: &mut ExportSummary,
) -> Result<()> {
    let mtime = u64::try_from(node.modified_at().timestamp()).unwrap_or_default();
    let mut header = tar::Header::new_gnu();
    header.set_mtime(mtime);

    if node.is_directory() {
        header.set_entry_type(tar::EntryType::Directory);
        header.set_size(0);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, name, io::empty())
            .map_err(|e| archive_error(node, e))?;
        summary.directories += 1;
        for child in node.children() {
            append_node(builder, child, &format!("{name}/{}", child.name()), summary)?;
        }
    } else {
        let content = node.read_bytes()?;
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, content.as_slice())
            .map_err(|e| archive_error(node, e))?;
        summary.files += 1;
        summary.bytes += content.len() as u64;
    }
    Ok(())
}

fn archive_error(node: &Node, source: io::Error) -> ImageFsError {
    ImageFsError::io(PathBuf::from(node.path()), source)
}
