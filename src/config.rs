//! Process-wide limits shared by the batcher, response validator and tree builder.

use std::time::Duration;

/// Maximum folder nesting depth for reorganised bookmarks.
///
/// Enforced in the model instructions, when validating model output and when
/// building the rendered tree. All three read it from [`OrganiserConfig::max_depth`].
pub const MAX_FOLDER_DEPTH: usize = 4;

/// Bookmarks sent to the model per request.
pub const DEFAULT_BATCH_SIZE: usize = 25;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Folder used for bookmarks with no location at all.
pub const UNSORTED_FOLDER: &str = "Unsorted";

/// Temperature sent while the model still accepts a custom one.
pub const CUSTOM_TEMPERATURE: f32 = 0.2;

/// Knobs for one organiser instance.
#[derive(Debug, Clone)]
pub struct OrganiserConfig {
    pub model: String,
    /// Swapped in once if the primary model turns out not to exist.
    pub fallback_model: Option<String>,
    pub batch_size: usize,
    pub max_depth: usize,
    /// Appended to the built-in system prompt.
    pub system_prompt_extension: Option<String>,
    pub retry: RetryPolicy,
}

impl Default for OrganiserConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            fallback_model: Some(DEFAULT_MODEL.to_string()),
            batch_size: DEFAULT_BATCH_SIZE,
            max_depth: MAX_FOLDER_DEPTH,
            system_prompt_extension: None,
            retry: RetryPolicy::default(),
        }
    }
}

/// Retry budget for a single batch.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Base wait; attempt `n` waits `backoff * n`.
    pub backoff: Duration,
    /// Short pause after dropping the custom temperature.
    pub temperature_pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
            temperature_pause: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// No waiting at all; used by tests and dry runs against local doubles.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Duration::ZERO,
            temperature_pause: Duration::ZERO,
        }
    }
}
