//! Error taxonomy for the organiser pipeline.

use std::collections::BTreeMap;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level library error.
#[derive(Debug, Error)]
pub enum Error {
    /// The input HTML has no usable root folder list.
    #[error("Malformed bookmark export: {0}")]
    MalformedExport(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    MalformedResponse(#[from] ResponseError),

    /// Every attempt for a batch failed.
    #[error("LLM invocation failed after {attempts} attempt(s): {last_error}")]
    LlmInvocation {
        attempts: u32,
        #[source]
        last_error: AttemptError,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failure reported by a completion provider.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Empty completion response: {0}")]
    EmptyResponse(String),

    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// The model refuses the custom temperature value.
    pub fn is_temperature_rejection(&self) -> bool {
        let message = self.to_string().to_lowercase();
        message.contains("temperature") && message.contains("unsupported")
    }

    /// The requested model does not exist or is not enabled for the key.
    pub fn is_model_not_found(&self) -> bool {
        let message = self.to_string().to_lowercase();
        message.contains("model")
            && (message.contains("not found") || message.contains("does not exist"))
    }
}

/// The model's raw text could not be read as a list of entries.
#[derive(Debug, Clone, Error)]
pub enum ResponseError {
    #[error("Response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Response root is not a list (found {0})")]
    NotAList(&'static str),
}

/// Why one attempt of the retry loop did not produce entries.
#[derive(Debug, Clone, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    MalformedResponse(#[from] ResponseError),

    #[error("No valid items after validation")]
    NoValidItems,
}

/// Integrity violations found when comparing output to input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Mismatch between {context} bookmark counts: {expected} vs {actual}")]
    CountMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("URL mismatch between {context}: missing {missing:?}, extra {extra:?}")]
    UrlMultisetMismatch {
        context: &'static str,
        missing: BTreeMap<String, usize>,
        extra: BTreeMap<String, usize>,
    },

    #[error("Found {count} records with empty location_after (and no original location)")]
    EmptyLocation { count: usize, urls: Vec<String> },

    #[error("Invalid JSON bookmark records file: {0}")]
    InvalidSnapshot(String),
}
