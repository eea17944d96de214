//! Batching and prompt construction

use crate::client::ChatMessage;
use crate::schema::BookmarkRecord;
use serde::Serialize;
use std::collections::BTreeMap;

/// Representative titles kept per folder in the structure summary.
const SUMMARY_EXAMPLES: usize = 5;

/// A contiguous slice of the record store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    /// Global index of the first record
    pub start: usize,
    pub len: usize,
}

impl Batch {
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Split `total` records into contiguous batches of at most `batch_size`.
pub fn batches(total: usize, batch_size: usize) -> Vec<Batch> {
    let size = batch_size.max(1);
    (0..total)
        .step_by(size)
        .map(|start| Batch {
            start,
            len: size.min(total - start),
        })
        .collect()
}

/// Advisory digest of folders assigned so far
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StructureSummary {
    pub folders: Vec<FolderSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FolderSummary {
    pub path: String,
    pub count: usize,
    pub examples: Vec<String>,
}

/// Summarise the folders already assigned in `records`.
pub fn summarise_structure(records: &[BookmarkRecord]) -> StructureSummary {
    let mut folders: BTreeMap<&str, FolderSummary> = BTreeMap::new();

    for record in records {
        let path = record.location_after.trim();
        if path.is_empty() {
            continue;
        }
        let folder = folders.entry(path).or_insert_with(|| FolderSummary {
            path: path.to_string(),
            count: 0,
            examples: Vec::new(),
        });
        folder.count += 1;

        let title = match record.title_after.trim() {
            "" => record.title_before.as_str(),
            t => t,
        };
        if !title.is_empty() && folder.examples.len() < SUMMARY_EXAMPLES {
            folder.examples.push(title.to_string());
        }
    }

    let mut folders: Vec<FolderSummary> = folders.into_values().collect();
    folders.sort_by_key(|f| f.path.to_lowercase());
    StructureSummary { folders }
}

#[derive(Debug, Serialize)]
struct PayloadEntry<'a> {
    index: usize,
    title_before: &'a str,
    url: &'a str,
    location_before: &'a str,
    metadata: PayloadMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct PayloadMetadata<'a> {
    title: &'a str,
    description: &'a str,
    tags: &'a [String],
}

#[derive(Debug, Serialize)]
struct UserPayload<'a> {
    instructions: &'a str,
    existing_structure: &'a StructureSummary,
    entries: Vec<PayloadEntry<'a>>,
}

/// Built-in system prompt for a given depth limit.
pub fn system_prompt(max_depth: usize, extension: Option<&str>) -> String {
    let base = format!(
        r#"You are an assistant that restructures browser bookmarks.
You MUST respond with valid JSON only - no prose - using the following schema:
[
    {{
        "index": <int>,
        "title_after": <string>,
        "location_after": <string>,
        "tags": [<string>, ...]
    }}
]

Rules:
- Keep the output list order identical to the input ordering by index.
- Every bookmark must be assigned to a non-empty `location_after` with folders delimited by "/".
- There must be at least one folder level (no direct root bookmarks).
- Limit folder nesting depth to at most {max_depth} levels.
- Location names should be concise but descriptive and stable across entries.
- Titles can be adjusted to be clearer but must remain short.
- Ensure tags are informative keywords sorted alphabetically and 3-5 per entry when possible."#
    );

    match extension.map(str::trim).filter(|e| !e.is_empty()) {
        Some(extension) => format!("{base}\n\nAdditional directives from the user:\n{extension}"),
        None => base,
    }
}

/// System and user messages for one batch.
pub fn build_messages(
    system_prompt: &str,
    chunk: &[BookmarkRecord],
    start: usize,
    user_instructions: Option<&str>,
    structure: &StructureSummary,
    max_depth: usize,
) -> serde_json::Result<Vec<ChatMessage>> {
    let default_instructions = format!(
        "Use sensible default folders with no more than {max_depth} levels and avoid root-level bookmarks."
    );
    let instructions = user_instructions
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default_instructions.as_str());

    let entries = chunk
        .iter()
        .enumerate()
        .map(|(offset, record)| PayloadEntry {
            index: start + offset,
            title_before: &record.title_before,
            url: &record.url,
            location_before: &record.location_before,
            metadata: PayloadMetadata {
                title: &record.metadata.title,
                description: &record.metadata.description,
                tags: &record.metadata.tags,
            },
        })
        .collect();

    let payload = UserPayload {
        instructions,
        existing_structure: structure,
        entries,
    };

    Ok(vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user(serde_json::to_string(&payload)?),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reorganised(title_before: &str, title_after: &str, location_after: &str) -> BookmarkRecord {
        let mut record = BookmarkRecord::new(title_before, "https://x.example", "Old");
        record.title_after = title_after.to_string();
        record.location_after = location_after.to_string();
        record
    }

    #[test]
    fn test_batches_cover_sequence_once() {
        let b = batches(7, 3);
        assert_eq!(
            b,
            vec![
                Batch { start: 0, len: 3 },
                Batch { start: 3, len: 3 },
                Batch { start: 6, len: 1 },
            ]
        );
        assert_eq!(b.iter().map(|b| b.len).sum::<usize>(), 7);
        assert_eq!(b.last().unwrap().end(), 7);
    }

    #[test]
    fn test_batches_edge_sizes() {
        assert!(batches(0, 25).is_empty());
        assert_eq!(batches(2, 0).len(), 2);
        assert_eq!(batches(25, 25), vec![Batch { start: 0, len: 25 }]);
    }

    #[test]
    fn test_summary_groups_counts_and_sorts() {
        let mut records = vec![
            reorganised("b1", "", "beta"),
            reorganised("a1", "Alpha One", "Alpha"),
            reorganised("unsorted", "", ""),
            reorganised("b2", "  ", "beta"),
        ];
        for i in 0..7 {
            records.push(reorganised(&format!("a{}", i + 2), "", "Alpha"));
        }

        let summary = summarise_structure(&records);
        let paths: Vec<&str> = summary.folders.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["Alpha", "beta"]);

        let alpha = &summary.folders[0];
        assert_eq!(alpha.count, 8);
        assert_eq!(alpha.examples.len(), 5);
        assert_eq!(alpha.examples[0], "Alpha One");

        let beta = &summary.folders[1];
        assert_eq!(beta.count, 2);
        assert_eq!(beta.examples, vec!["b1", "b2"]);
    }

    #[test]
    fn test_summary_empty_for_unreorganised() {
        let records = vec![BookmarkRecord::new("A", "https://a.example", "Root")];
        assert_eq!(summarise_structure(&records), StructureSummary::default());
    }

    #[test]
    fn test_system_prompt_extension() {
        let plain = system_prompt(4, None);
        assert!(plain.contains("at most 4 levels"));
        assert!(!plain.contains("Additional directives"));

        let extended = system_prompt(3, Some("  Prefer German folder names. "));
        assert!(extended.contains("at most 3 levels"));
        assert!(
            extended.ends_with("Additional directives from the user:\nPrefer German folder names.")
        );

        assert_eq!(system_prompt(4, Some("   ")), plain);
    }

    #[test]
    fn test_build_messages_payload() {
        let mut record = BookmarkRecord::new("Rust", "https://rust-lang.org", "Bar/Dev");
        record.metadata.tags = vec!["lang".to_string()];
        let chunk = vec![record];
        let summary = StructureSummary {
            folders: vec![FolderSummary {
                path: "Dev".to_string(),
                count: 1,
                examples: vec!["Docs".to_string()],
            }],
        };

        let messages = build_messages("SYS", &chunk, 25, None, &summary, 4).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], ChatMessage::system("SYS"));
        assert_eq!(messages[1].role, "user");

        let payload: serde_json::Value = serde_json::from_str(&messages[1].content).unwrap();
        assert_eq!(payload["entries"][0]["index"], 25);
        assert_eq!(payload["entries"][0]["location_before"], "Bar/Dev");
        assert_eq!(payload["entries"][0]["metadata"]["tags"][0], "lang");
        assert_eq!(payload["existing_structure"]["folders"][0]["path"], "Dev");
        assert!(payload["instructions"]
            .as_str()
            .unwrap()
            .contains("no more than 4 levels"));

        let custom =
            build_messages("SYS", &chunk, 0, Some(" Group by topic "), &summary, 4).unwrap();
        let payload: serde_json::Value = serde_json::from_str(&custom[1].content).unwrap();
        assert_eq!(payload["instructions"], "Group by topic");
    }
}
