//! Folder path normalisation

/// Split a "/"-delimited path into trimmed, non-empty segments, keeping at
/// most `max_depth` of them. Deeper segments are dropped, never merged.
pub fn segments(location: &str, max_depth: usize) -> Vec<&str> {
    location
        .split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(max_depth)
        .collect()
}

/// Normalised, depth-clamped form of `location`; empty if nothing remains.
pub fn clamp(location: &str, max_depth: usize) -> String {
    segments(location, max_depth).join("/")
}
