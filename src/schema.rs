//! Bookmark record schema
//!
//! The same types double as the persisted JSON snapshot format:
//!
//! ```json
//! [{"title_before": "", "title_after": "", "url": "", "location_before": "",
//!   "location_after": "", "link_metadata": {"title": "", "description": "", "tags": []}}]
//! ```

use serde::{Deserialize, Deserializer, Serialize};

/// Metadata scraped from the bookmarked page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Keyword tags, in page order
    #[serde(default, deserialize_with = "trimmed_tags")]
    pub tags: Vec<String>,
}

impl BookmarkMetadata {
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.description.is_empty() && self.tags.is_empty()
    }
}

/// A single bookmark entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkRecord {
    /// Title as exported by the browser
    pub title_before: String,
    /// Title chosen during reorganisation (empty until then)
    #[serde(default)]
    pub title_after: String,
    /// Identity key; duplicates are legal
    pub url: String,
    /// "/"-delimited folder path in the export
    pub location_before: String,
    /// "/"-delimited folder path after reorganisation (empty until then)
    #[serde(default)]
    pub location_after: String,
    #[serde(rename = "link_metadata")]
    pub metadata: BookmarkMetadata,
}

impl BookmarkRecord {
    pub fn new(
        title_before: impl Into<String>,
        url: impl Into<String>,
        location_before: impl Into<String>,
    ) -> Self {
        Self {
            title_before: title_before.into(),
            url: url.into(),
            location_before: location_before.into(),
            ..Self::default()
        }
    }

    pub fn is_reorganised(&self) -> bool {
        !self.location_after.is_empty()
    }

    /// `title_after` when set, otherwise the exported title.
    pub fn effective_title(&self) -> &str {
        if self.title_after.is_empty() {
            &self.title_before
        } else {
            &self.title_after
        }
    }
}

/// One validated item of a model response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReorgEntry {
    /// Position in the full original record sequence
    pub index: usize,
    pub title_after: String,
    /// Non-empty, depth-clamped folder path
    pub location_after: String,
    pub tags: Vec<String>,
}

fn trimmed_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let tags = Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(tags.into_iter().map(|t| t.trim().to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_title() {
        let mut record = BookmarkRecord::new("Before", "https://example.com", "Root");
        assert_eq!(record.effective_title(), "Before");
        record.title_after = "After".to_string();
        assert_eq!(record.effective_title(), "After");
    }

    #[test]
    fn test_is_reorganised() {
        let mut record = BookmarkRecord::new("A", "https://a.example", "Root/A");
        assert!(!record.is_reorganised());
        record.location_after = "Tech".to_string();
        assert!(record.is_reorganised());
    }

    #[test]
    fn test_serialize_uses_link_metadata_key() {
        let record = BookmarkRecord::new("Example", "https://example.com", "Bar");
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""link_metadata":{"title":"","description":"","tags":[]}"#));
        assert!(json.starts_with(r#"{"title_before":"Example","title_after":"""#));
    }

    #[test]
    fn test_deserialize_defaults_and_trims_tags() {
        let json = r#"{
            "title_before": "T",
            "url": "https://t.example",
            "location_before": "",
            "link_metadata": {"tags": [" rust ", "cli"]}
        }"#;
        let record: BookmarkRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.title_after, "");
        assert_eq!(record.location_after, "");
        assert_eq!(record.metadata.tags, vec!["rust", "cli"]);
        assert_eq!(record.metadata.title, "");
    }

    #[test]
    fn test_deserialize_requires_url() {
        let json = r#"{"title_before": "T", "location_before": "", "link_metadata": {}}"#;
        assert!(serde_json::from_str::<BookmarkRecord>(json).is_err());
    }

    #[test]
    fn test_deserialize_requires_link_metadata() {
        let json = r#"{"title_before": "T", "url": "u", "location_before": ""}"#;
        assert!(serde_json::from_str::<BookmarkRecord>(json).is_err());
    }
}
