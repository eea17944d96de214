//! Model response validation
//!
//! Turns raw completion text into [`ReorgEntry`] values. Only a response that
//! is not a JSON list fails as a whole; malformed items are logged and dropped
//! one by one.

use crate::error::ResponseError;
use crate::location;
use crate::schema::ReorgEntry;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

/// Parse and validate one batch response.
pub fn parse_response(raw: &str, max_depth: usize) -> Result<Vec<ReorgEntry>, ResponseError> {
    let root = decode_root(raw)?;

    let items = match root {
        Value::Array(items) => items,
        other => return Err(ResponseError::NotAList(json_kind(&other))),
    };

    Ok(items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|obj| validate_item(obj, max_depth))
        .collect())
}

/// Plain JSON first; the fenced body only if that fails. Backticks inside a
/// valid document's strings must not trigger the unwrap.
fn decode_root(raw: &str) -> Result<Value, ResponseError> {
    let err = match serde_json::from_str::<Value>(raw.trim()) {
        Ok(root) => return Ok(root),
        Err(e) => e,
    };
    fenced_body(raw)
        .and_then(|body| serde_json::from_str(body).ok())
        .ok_or_else(|| ResponseError::InvalidJson(err.to_string()))
}

/// Body of the first Markdown code fence, if the model wrapped its answer.
fn fenced_body(text: &str) -> Option<&str> {
    let re = Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").ok()?;
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
}

fn validate_item(obj: &Map<String, Value>, max_depth: usize) -> Option<ReorgEntry> {
    let (Some(index), Some(location)) = (obj.get("index"), obj.get("location_after")) else {
        warn!("Skipping item missing required keys: {}", serde_json::Value::Object(obj.clone()));
        return None;
    };

    let entry = decode_entry(obj, index, location, max_depth);
    if entry.is_none() {
        warn!("Validation failed for item {}", serde_json::Value::Object(obj.clone()));
    }
    entry
}

fn decode_entry(
    obj: &Map<String, Value>,
    index: &Value,
    location: &Value,
    max_depth: usize,
) -> Option<ReorgEntry> {
    let index = decode_index(index)?;

    let location_after = location::clamp(location.as_str()?, max_depth);
    if location_after.is_empty() {
        return None;
    }

    let title_after = match obj.get("title_after") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(_) => return None,
    };

    let tags = match obj.get("tags") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(values)) => values
            .iter()
            .map(decode_tag)
            .collect::<Option<Vec<_>>>()?
            .into_iter()
            .flatten()
            .filter(|t| !t.is_empty())
            .collect(),
        Some(_) => return None,
    };

    Some(ReorgEntry {
        index,
        title_after,
        location_after,
        tags,
    })
}

/// Scalars become trimmed strings and nulls are skipped; nested values fail
/// the whole item.
fn decode_tag(value: &Value) -> Option<Option<String>> {
    match value {
        Value::String(s) => Some(Some(s.trim().to_string())),
        Value::Number(n) => Some(Some(n.to_string())),
        Value::Bool(b) => Some(Some(b.to_string())),
        Value::Null => Some(None),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Integral numbers, or strings holding one.
fn decode_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_u64() {
                return usize::try_from(i).ok();
            }
            let f = n.as_f64()?;
            (f >= 0.0 && f.fract() == 0.0 && f <= usize::MAX as f64).then_some(f as usize)
        }
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Vec<ReorgEntry> {
        parse_response(raw, 4).unwrap()
    }

    #[test]
    fn test_valid_entries() {
        let entries = parse(
            r#"[{"index": 0, "title_after": "Title A", "location_after": "FolderA", "tags": ["a"]}]"#,
        );
        assert_eq!(
            entries,
            vec![ReorgEntry {
                index: 0,
                title_after: "Title A".to_string(),
                location_after: "FolderA".to_string(),
                tags: vec!["a".to_string()],
            }]
        );
    }

    #[test]
    fn test_root_must_be_list() {
        let err = parse_response(r#"{"oops": 1}"#, 4).unwrap_err();
        assert!(matches!(err, ResponseError::NotAList("object")));
    }

    #[test]
    fn test_invalid_json() {
        let err = parse_response("Sure! Here are your folders:", 4).unwrap_err();
        assert!(matches!(err, ResponseError::InvalidJson(_)));
    }

    #[test]
    fn test_code_fence_is_unwrapped() {
        let raw = "```json\n[{\"index\": 2, \"location_after\": \"Dev\"}]\n```";
        let entries = parse(raw);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].index, 2);
    }

    #[test]
    fn test_non_objects_dropped_silently() {
        let entries = parse(r#"[1, "two", null, {"index": 3, "location_after": "X"}]"#);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].index, 3);
    }

    #[test]
    fn test_missing_required_keys_dropped() {
        let entries = parse(
            r#"[
                {"index": 0, "location_after": "FolderA", "tags": ["a"]},
                {"index": 1, "title_after": "Title B"},
                {"location_after": "Orphan"}
            ]"#,
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].index, 0);
    }

    #[test]
    fn test_location_normalised_and_clamped() {
        let entries = parse(r#"[{"index": 0, "location_after": " L1 / L2//L3/L4/L5/L6 "}]"#);
        assert_eq!(entries[0].location_after, "L1/L2/L3/L4");

        let shallow = parse_response(r#"[{"index": 0, "location_after": "L1/L2/L3"}]"#, 2).unwrap();
        assert_eq!(shallow[0].location_after, "L1/L2");
    }

    #[test]
    fn test_empty_location_dropped() {
        let entries = parse(
            r#"[{"index": 0, "location_after": " / "}, {"index": 1, "location_after": ""}]"#,
        );
        assert!(entries.is_empty());
    }

    #[test]
    fn test_schema_failures_drop_single_item() {
        let entries = parse(
            r#"[
                {"index": -1, "location_after": "A"},
                {"index": "x", "location_after": "A"},
                {"index": 1.5, "location_after": "A"},
                {"index": 2, "location_after": 7},
                {"index": 3, "location_after": "A", "tags": "not-a-list"},
                {"index": 4, "location_after": "A", "tags": ["ok", {"nested": 1}]},
                {"index": 5, "location_after": "A", "title_after": 9},
                {"index": "6", "location_after": "A"},
                {"index": 7.0, "location_after": "A", "title_after": null, "tags": null}
            ]"#,
        );
        let indices: Vec<usize> = entries.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![6, 7]);
        assert_eq!(entries[1].title_after, "");
        assert!(entries[1].tags.is_empty());
    }

    #[test]
    fn test_tags_trimmed_and_empties_removed() {
        let entries = parse(r#"[{"index": 0, "location_after": "A", "tags": [" rust ", "", "  ", "cli"]}]"#);
        assert_eq!(entries[0].tags, vec!["rust", "cli"]);
    }

    #[test]
    fn test_scalar_tags_coerced() {
        let entries = parse(
            r#"[{"index": 0, "location_after": "A", "tags": ["rust", 2024, true, null, " x "]}]"#,
        );
        assert_eq!(entries[0].tags, vec!["rust", "2024", "true", "x"]);
    }

    #[test]
    fn test_backticks_inside_valid_json() {
        let raw = r#"[{"index": 0, "title_after": "Use ```code``` blocks", "location_after": "Dev"}]"#;
        let entries = parse(raw);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title_after, "Use ```code``` blocks");
    }

    #[test]
    fn test_fence_with_prose_around_it() {
        let raw = "Here you go:\n```json\n[{\"index\": 1, \"location_after\": \"Dev\"}]\n```\nDone.";
        assert_eq!(parse(raw)[0].index, 1);

        let err = parse_response("```json\nnot json\n```", 4).unwrap_err();
        assert!(matches!(err, ResponseError::InvalidJson(_)));
    }

    #[test]
    fn test_empty_list_is_not_an_error() {
        assert!(parse("[]").is_empty());
    }
}
