//! Netscape bookmark HTML output

use crate::schema::BookmarkRecord;
use crate::tree::{build_tree, BookmarkTreeNode};
use std::path::Path;
use tracing::info;

const HTML_HEADER: &str = r#"<!DOCTYPE NETSCAPE-Bookmark-file-1>
<!-- This is an automatically generated file.
     It will be read and overwritten.
     DO NOT EDIT! -->
<META HTTP-EQUIV="Content-Type" CONTENT="text/html; charset=UTF-8">
<TITLE>Bookmarks</TITLE>
<H1>Bookmarks</H1>"#;

const INDENT: &str = "    ";

/// Render the children of `root` as a complete bookmark file (no trailing newline).
pub fn render_html(root: &BookmarkTreeNode<'_>) -> String {
    let mut lines = vec![HTML_HEADER.to_string(), "<DL><p>".to_string()];
    render_node(root, &mut lines, 1);
    lines.push("</DL><p>".to_string());
    lines.join("\n")
}

fn render_node(node: &BookmarkTreeNode<'_>, out: &mut Vec<String>, depth: usize) {
    let indent = INDENT.repeat(depth);

    let mut folders: Vec<&BookmarkTreeNode<'_>> = node.children.values().collect();
    folders.sort_by_key(|f| f.name.to_lowercase());
    for folder in folders {
        out.push(format!("{indent}<DT><H3>{}</H3>", html_escape(&folder.name)));
        out.push(format!("{indent}<DL><p>"));
        render_node(folder, out, depth + 1);
        out.push(format!("{indent}</DL><p>"));
    }

    let mut bookmarks = node.bookmarks.clone();
    bookmarks.sort_by_key(|r| r.effective_title().to_lowercase());
    for record in bookmarks {
        out.push(format!(
            r#"{indent}<DT><A HREF="{}" ADD_DATE="0">{}</A>"#,
            html_escape(&record.url),
            html_escape(record.effective_title())
        ));
    }
}

/// Build the tree for `records` and write it to `path`.
pub fn write_bookmark_html(
    records: &[BookmarkRecord],
    path: &Path,
    max_depth: usize,
) -> std::io::Result<()> {
    let tree = build_tree(records, max_depth);
    std::fs::write(path, render_html(&tree) + "\n")?;
    info!("Wrote {} bookmarks to {}", tree.len(), path.display());
    Ok(())
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
