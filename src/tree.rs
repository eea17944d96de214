//! Depth-bounded folder tree built from effective locations

use crate::config::UNSORTED_FOLDER;
use crate::location;
use crate::schema::BookmarkRecord;
use std::collections::BTreeMap;

/// Name of the synthetic root; never rendered itself.
pub const ROOT_FOLDER: &str = "Bookmarks Bar";

/// A folder borrowing the records filed directly under it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkTreeNode<'a> {
    pub name: String,
    pub children: BTreeMap<String, BookmarkTreeNode<'a>>,
    pub bookmarks: Vec<&'a BookmarkRecord>,
}

impl<'a> BookmarkTreeNode<'a> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: BTreeMap::new(),
            bookmarks: Vec::new(),
        }
    }

    /// Get or create the direct child called `name`.
    pub fn child(&mut self, name: &str) -> &mut BookmarkTreeNode<'a> {
        self.children
            .entry(name.to_string())
            .or_insert_with(|| BookmarkTreeNode::new(name))
    }

    /// Folder levels below this node, not counting the node itself.
    pub fn depth(&self) -> usize {
        self.children
            .values()
            .map(|c| c.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Bookmarks in this subtree.
    pub fn len(&self) -> usize {
        self.bookmarks.len() + self.children.values().map(BookmarkTreeNode::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Folder path a record is filed under, at most `max_depth` segments.
pub fn effective_path(record: &BookmarkRecord, max_depth: usize) -> Vec<&str> {
    let location = if !record.location_after.trim().is_empty() {
        record.location_after.as_str()
    } else if !record.location_before.trim().is_empty() {
        record.location_before.as_str()
    } else {
        UNSORTED_FOLDER
    };

    let segments = location::segments(location, max_depth.max(1));
    if segments.is_empty() {
        vec![UNSORTED_FOLDER]
    } else {
        segments
    }
}

pub fn build_tree(records: &[BookmarkRecord], max_depth: usize) -> BookmarkTreeNode<'_> {
    let mut root = BookmarkTreeNode::new(ROOT_FOLDER);
    for record in records {
        let mut node = &mut root;
        for segment in effective_path(record, max_depth) {
            node = node.child(segment);
        }
        node.bookmarks.push(record);
    }
    root
}
