//! Retry/fallback controller for one batch
//!
//! Attempt `n` calls the client and validates the response. Two failure modes
//! are corrected once and then retried like any other failure:
//!
//! - the model rejects the custom temperature: temperature is dropped for the
//!   rest of the session and the next attempt follows after a short pause;
//! - the model does not exist (first attempt only): the session switches to
//!   the fallback model.
//!
//! Everything else waits `backoff * n`. Both corrections are sticky: they live
//! on [`Session`] and carry over to later batches.

use crate::client::{ChatMessage, CompletionClient, CompletionRequest};
use crate::config::{RetryPolicy, CUSTOM_TEMPERATURE};
use crate::error::{AttemptError, Error};
use crate::response::parse_response;
use crate::schema::ReorgEntry;
use std::time::Duration;
use tracing::{debug, warn};

/// Model selection state shared by every batch of one organiser run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub model: String,
    pub fallback_model: Option<String>,
    pub allow_temperature: bool,
}

impl Session {
    pub fn new(model: impl Into<String>, fallback_model: Option<String>) -> Self {
        Self {
            model: model.into(),
            fallback_model,
            allow_temperature: true,
        }
    }
}

/// Call the client until a response yields at least one valid entry.
pub async fn invoke_with_retry(
    client: &dyn CompletionClient,
    session: &mut Session,
    messages: &[ChatMessage],
    policy: &RetryPolicy,
    max_depth: usize,
) -> Result<Vec<ReorgEntry>, Error> {
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = AttemptError::NoValidItems;

    for attempt in 1..=max_attempts {
        let request = CompletionRequest {
            model: session.model.clone(),
            messages: messages.to_vec(),
            temperature: session.allow_temperature.then_some(CUSTOM_TEMPERATURE),
        };

        let failure = match client.complete(&request).await {
            Ok(text) => match parse_response(&text, max_depth) {
                Ok(entries) if !entries.is_empty() => {
                    debug!("Attempt {} returned {} valid entries", attempt, entries.len());
                    return Ok(entries);
                }
                Ok(_) => AttemptError::NoValidItems,
                Err(e) => AttemptError::MalformedResponse(e),
            },
            Err(e) => AttemptError::Provider(e),
        };

        let wait = recover(&failure, attempt, max_attempts, session, policy);
        last_error = failure;
        if attempt < max_attempts {
            tokio::time::sleep(wait).await;
        }
    }

    Err(Error::LlmInvocation {
        attempts: max_attempts,
        last_error,
    })
}

/// Apply any session correction for `failure` and return the wait before the
/// next attempt.
fn recover(
    failure: &AttemptError,
    attempt: u32,
    max_attempts: u32,
    session: &mut Session,
    policy: &RetryPolicy,
) -> Duration {
    if let AttemptError::Provider(err) = failure {
        if session.allow_temperature && err.is_temperature_rejection() {
            warn!(
                "Model '{}' rejects custom temperature; omitting for remaining attempts",
                session.model
            );
            session.allow_temperature = false;
            return policy.temperature_pause;
        }

        if attempt == 1 && err.is_model_not_found() {
            let fallback = session
                .fallback_model
                .clone()
                .filter(|fallback| *fallback != session.model);
            if let Some(fallback) = fallback {
                warn!(
                    "Primary model '{}' unavailable; switching to fallback '{}'",
                    session.model, fallback
                );
                session.model = fallback;
                return policy.backoff;
            }
        }
    }

    let wait = policy.backoff * attempt;
    if attempt < max_attempts {
        warn!(
            "LLM attempt {}/{} failed: {}; retrying in {:.1}s",
            attempt,
            max_attempts,
            failure,
            wait.as_secs_f64()
        );
    } else {
        warn!("LLM attempt {}/{} failed: {}", attempt, max_attempts, failure);
    }
    wait
}
