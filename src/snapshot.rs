//! Flat JSON snapshots of the record store

use crate::error::Result;
use crate::schema::BookmarkRecord;
use std::path::Path;
use tracing::info;

/// Write records as a pretty-printed JSON list.
pub fn write_snapshot(records: &[BookmarkRecord], path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(path, json)?;
    info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

/// Load a snapshot; every entry must be well-formed.
pub fn load_snapshot(path: &Path) -> Result<Vec<BookmarkRecord>> {
    let content = std::fs::read_to_string(path)?;
    parse_snapshot(&content)
}

pub fn parse_snapshot(content: &str) -> Result<Vec<BookmarkRecord>> {
    Ok(serde_json::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_snapshot_roundtrip_preserves_fields() {
        let mut record = BookmarkRecord::new("Café", "https://cafe.example", "Bar/Food");
        record.title_after = "Café Guide".to_string();
        record.location_after = "Food/Coffee".to_string();
        record.metadata.title = "Cafe".to_string();
        record.metadata.description = "Coffee".to_string();
        record.metadata.tags = vec!["zeta".to_string(), "alpha".to_string()];
        let records = vec![record, BookmarkRecord::new("Two", "https://two.example", "")];

        let dir = tempdir().unwrap();
        let path = dir.path().join("bookmarks.json");
        write_snapshot(&records, &path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("Café Guide"), "non-ASCII must be kept verbatim");

        let loaded = load_snapshot(&path).unwrap();
        assert_eq!(loaded, records);
        assert_eq!(loaded[0].metadata.tags, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_parse_snapshot_rejects_non_list() {
        assert!(parse_snapshot(r#"{"url": "x"}"#).is_err());
    }

    #[test]
    fn test_parse_snapshot_rejects_bad_entry() {
        let content = r#"[
            {"title_before": "A", "url": "a", "location_before": "", "link_metadata": {}},
            {"title_before": "B", "location_before": "", "link_metadata": {}}
        ]"#;
        assert!(parse_snapshot(content).is_err());
    }
}
