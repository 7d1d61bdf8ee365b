//! `jimg stat`: Show the attributes of an entry.

use chrono::{DateTime, Utc};
use clap::Args;
use jimagefs_common::types::{EntryKind, Sha256Hash};
use jimagefs_vfs::{Node, OverlayFs};
use serde::Serialize;

use crate::output::format_bytes;

/// Arguments for the `stat` command.
#[derive(Args, Debug)]
pub struct StatArgs {
    /// Overlay path of an entry.
    pub path: String,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Attributes of one entry.
#[derive(Debug, Serialize)]
struct StatReport {
    name: String,
    path: String,
    kind: EntryKind,
    size: u64,
    modified: DateTime<Utc>,
    sha256: Option<String>,
}

impl StatReport {
    fn of(node: &Node) -> anyhow::Result<Self> {
        let (kind, sha256) = if node.is_directory() {
            (EntryKind::Directory, None)
        } else {
            let hash = Sha256Hash::of(&node.read_bytes()?);
            (EntryKind::File, Some(hash.as_hex().to_string()))
        };
        Ok(Self {
            name: node.name().to_string(),
            path: node.path(),
            kind,
            size: node.size(),
            modified: node.modified_at(),
            sha256,
        })
    }
}

/// Executes the `stat` command.
///
/// # Errors
///
/// Returns an error if the path is missing or the content cannot be read.
pub fn execute(fs: &OverlayFs, args: &StatArgs) -> anyhow::Result<()> {
    let node = super::resolve(fs, &args.path)?;
    let report = StatReport::of(&node)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!("Name:     {}", report.name);
    println!("Path:     {}", report.path);
    println!("Kind:     {}", report.kind);
    println!("Size:     {} ({} bytes)", format_bytes(report.size), report.size);
    println!("Modified: {}", report.modified.to_rfc3339());
    if let Some(sha256) = &report.sha256 {
        println!("SHA-256:  {sha256}");
    }
    Ok(())
}
