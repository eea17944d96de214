//! Netscape bookmark export parsing
//!
//! Chrome, Brave and Firefox all export the same shape:
//!
//! ```html
//! <DL><p>
//!     <DT><H3>Folder</H3>
//!     <DL><p>
//!         <DT><A HREF="https://example.com">Example</A>
//!     </DL><p>
//! </DL><p>
//! ```
//!
//! Locations are built top-down while walking the tree: every `<DT>` that owns
//! an `<H3>` pushes that folder name for everything nested inside it.

use crate::error::{Error, Result};
use crate::schema::BookmarkRecord;
use scraper::{ElementRef, Html, Selector};
use std::path::Path;
use tracing::{debug, info};

/// Parse an export file from disk.
pub fn parse_bookmark_file(path: &Path) -> Result<Vec<BookmarkRecord>> {
    debug!("Parsing bookmark export from {}", path.display());
    let html = std::fs::read_to_string(path)?;
    parse_bookmark_html(&html)
}

/// Parse export HTML into flat records, in document order.
pub fn parse_bookmark_html(html: &str) -> Result<Vec<BookmarkRecord>> {
    let doc = Html::parse_document(html);
    let selector = Selector::parse("dl")
        .map_err(|e| Error::MalformedExport(format!("selector error: {e:?}")))?;
    let root = doc.select(&selector).next().ok_or_else(|| {
        Error::MalformedExport("Bookmark export is missing <DL> root element".to_string())
    })?;

    let mut records = Vec::new();
    let mut path = Vec::new();
    walk(root, &mut path, &mut records);

    info!("Extracted {} bookmark entries", records.len());
    Ok(records)
}

fn walk(element: ElementRef<'_>, path: &mut Vec<String>, records: &mut Vec<BookmarkRecord>) {
    // Folder whose `<DT>` was closed early by a `<DD>` description; its list
    // follows as a sibling.
    let mut pending: Option<String> = None;

    for child in element.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "a" => {
                if let Some(record) = record_from_anchor(child, path) {
                    records.push(record);
                }
            }
            "dt" => {
                let folder = folder_name(child);
                walk_in_folder(child, folder.as_deref(), path, records);
                pending = folder.filter(|_| !has_list(child));
            }
            "dd" if pending.is_some() => {
                walk_in_folder(child, pending.as_deref(), path, records);
                if has_list(child) {
                    pending = None;
                }
            }
            "dl" if pending.is_some() => {
                let folder = pending.take();
                walk_in_folder(child, folder.as_deref(), path, records);
            }
            "h3" => {}
            _ => walk(child, path, records),
        }
    }
}

fn walk_in_folder(
    element: ElementRef<'_>,
    folder: Option<&str>,
    path: &mut Vec<String>,
    records: &mut Vec<BookmarkRecord>,
) {
    if let Some(name) = folder {
        path.push(name.to_string());
    }
    walk(element, path, records);
    if folder.is_some() {
        path.pop();
    }
}

fn has_list(element: ElementRef<'_>) -> bool {
    element
        .children()
        .filter_map(ElementRef::wrap)
        .any(|el| el.value().name() == "dl")
}

/// Name of the folder a `<DT>` introduces, if it has a non-empty `<H3>`.
fn folder_name(dt: ElementRef<'_>) -> Option<String> {
    dt.children()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "h3")
        .map(element_text)
        .filter(|name| !name.is_empty())
}

fn record_from_anchor(anchor: ElementRef<'_>, path: &[String]) -> Option<BookmarkRecord> {
    let Some(href) = anchor.value().attr("href") else {
        debug!("Skipping anchor without href");
        return None;
    };
    let href = href.trim();
    if href.is_empty() {
        debug!("Skipping anchor with empty href");
        return None;
    }

    Some(BookmarkRecord::new(element_text(anchor), href, path.join("/")))
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}
