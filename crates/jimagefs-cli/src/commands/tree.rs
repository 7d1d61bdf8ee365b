//! `jimg tree`: Print an indented tree of a directory.

use clap::Args;
use jimagefs_vfs::{Node, OverlayFs};

/// Arguments for the `tree` command.
#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Overlay path of the directory to print.
    pub path: String,

    /// Maximum depth below the starting entry.
    #[arg(long)]
    pub depth: Option<usize>,
}

/// Executes the `tree` command.
///
/// # Errors
///
/// Returns an error if the path is malformed or missing.
pub fn execute(fs: &OverlayFs, args: &TreeArgs) -> anyhow::Result<()> {
    let node = super::resolve(fs, &args.path)?;
    let mut lines = Vec::new();
    render(&node, 0, args.depth, &mut lines);
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

/// Renders `node` and its descendants, two spaces of indent per level.
fn render(node: &Node, level: usize, max_depth: Option<usize>, lines: &mut Vec<String>) {
    let label = if node.name().is_empty() {
        node.path()
    } else if node.is_directory() {
        format!("{}/", node.name())
    } else {
        node.name().to_string()
    };
    lines.push(format!("{:indent$}{label}", "", indent = level * 2));

    if max_depth.is_some_and(|max| level >= max) {
        return;
    }
    for child in node.children() {
        render(child, level + 1, max_depth, lines);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use jimagefs_image::writer::{ImageWriter, write_runtime_home};
    use jimagefs_vfs::{HandleCache, OpenStrategy};

    use super::*;

    fn lang_node(home: &std::path::Path) -> Node {
        let mut writer = ImageWriter::new();
        let _ = writer
            .add("/java.base/java/lang/Object.class", b"o".to_vec())
            .add("/java.base/java/lang/ref/Cleaner.class", b"c".to_vec());
        write_runtime_home(home, &writer).expect("write home");
        let fs = OverlayFs::with_handle_cache(Arc::new(HandleCache::new(OpenStrategy::HostProvided)));
        fs.find(&format!("{}!!/java.base/java/lang", home.display()))
            .expect("find")
            .expect("present")
    }

    #[test]
    fn render_indents_two_spaces_per_level() {
        let home = tempfile::tempdir().expect("tempdir");
        let mut lines = Vec::new();
        render(&lang_node(home.path()), 0, None, &mut lines);
        assert_eq!(lines, ["lang/", "  Object.class", "  ref/", "    Cleaner.class"]);
    }

    #[test]
    fn render_stops_at_max_depth() {
        let home = tempfile::tempdir().expect("tempdir");
        let mut lines = Vec::new();
        render(&lang_node(home.path()), 0, Some(1), &mut lines);
        assert_eq!(lines, ["lang/", "  Object.class", "  ref/"]);
    }
}
