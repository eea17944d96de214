//! Post-run integrity checks
//!
//! Every check compares URL multisets rather than positions: duplicates are
//! legal and the rendered file is reordered by folder.

use crate::error::{Result, ValidationError};
use crate::parser::parse_bookmark_file;
use crate::schema::BookmarkRecord;
use crate::snapshot::parse_snapshot;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Re-parse the rendered file and check it against the original records.
pub fn validate_reorganisation(
    original: &[BookmarkRecord],
    rendered: &Path,
    snapshot: Option<&Path>,
) -> Result<()> {
    let output = parse_bookmark_file(rendered)?;
    validate_records(original, &output, snapshot)?;
    info!(
        "Validation successful: all {} bookmarks accounted for",
        original.len()
    );
    Ok(())
}

/// Count, URL multiset, empty-location and snapshot checks, in that order.
pub fn validate_records(
    original: &[BookmarkRecord],
    output: &[BookmarkRecord],
    snapshot: Option<&Path>,
) -> std::result::Result<(), ValidationError> {
    check_counts("original and reorganised", original.len(), output.len())?;
    check_urls("original and reorganised", original, output)?;
    check_locations(output)?;

    if let Some(path) = snapshot.filter(|p| p.exists()) {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ValidationError::InvalidSnapshot(e.to_string()))?;
        let stored =
            parse_snapshot(&content).map_err(|e| ValidationError::InvalidSnapshot(e.to_string()))?;
        check_counts("snapshot and reorganised", stored.len(), output.len())?;
        check_urls("snapshot and reorganised", &stored, output)?;
    }

    Ok(())
}

fn check_counts(
    context: &'static str,
    expected: usize,
    actual: usize,
) -> std::result::Result<(), ValidationError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ValidationError::CountMismatch {
            context,
            expected,
            actual,
        })
    }
}

fn check_urls(
    context: &'static str,
    expected: &[BookmarkRecord],
    actual: &[BookmarkRecord],
) -> std::result::Result<(), ValidationError> {
    let expected = url_counts(expected);
    let actual = url_counts(actual);
    if expected == actual {
        return Ok(());
    }

    Err(ValidationError::UrlMultisetMismatch {
        context,
        missing: surplus(&expected, &actual),
        extra: surplus(&actual, &expected),
    })
}

fn check_locations(output: &[BookmarkRecord]) -> std::result::Result<(), ValidationError> {
    let urls: Vec<String> = output
        .iter()
        .filter(|r| r.location_after.trim().is_empty() && r.location_before.trim().is_empty())
        .map(|r| r.url.clone())
        .collect();

    if urls.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::EmptyLocation {
            count: urls.len(),
            urls,
        })
    }
}

fn url_counts(records: &[BookmarkRecord]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.url.as_str()).or_insert(0) += 1;
    }
    counts
}

/// How many more times each URL occurs in `a` than in `b`.
fn surplus(a: &BTreeMap<&str, usize>, b: &BTreeMap<&str, usize>) -> BTreeMap<String, usize> {
    a.iter()
        .filter_map(|(url, &n)| {
            let m = b.get(url).copied().unwrap_or(0);
            (n > m).then(|| (url.to_string(), n - m))
        })
        .collect()
}
