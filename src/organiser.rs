//! Batch reorganisation driver
//!
//! Walks the record store batch by batch, asks the model for new titles and
//! folders, and merges the validated answers back. Batches run strictly one
//! after another so each prompt can see the folders chosen so far.

use crate::batch::{batches, build_messages, summarise_structure, system_prompt};
use crate::client::CompletionClient;
use crate::config::OrganiserConfig;
use crate::error::Result;
use crate::retry::{invoke_with_retry, Session};
use crate::schema::{BookmarkRecord, ReorgEntry};
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub struct BookmarkOrganiser<C> {
    client: C,
    config: OrganiserConfig,
    session: Session,
}

impl<C: CompletionClient> BookmarkOrganiser<C> {
    pub fn new(client: C, config: OrganiserConfig) -> Self {
        let session = Session::new(config.model.clone(), config.fallback_model.clone());
        Self {
            client,
            config,
            session,
        }
    }

    pub fn config(&self) -> &OrganiserConfig {
        &self.config
    }

    /// Model and temperature state after any corrections so far.
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Reorganise `records` in place.
    ///
    /// Fails with [`crate::Error::LlmInvocation`] as soon as one batch
    /// exhausts its retries; batches merged before that keep their results.
    pub async fn reorganise(
        &mut self,
        records: &mut [BookmarkRecord],
        user_instructions: Option<&str>,
    ) -> Result<()> {
        let max_depth = self.config.max_depth;
        let prompt = system_prompt(max_depth, self.config.system_prompt_extension.as_deref());
        let plan = batches(records.len(), self.config.batch_size);

        for (n, batch) in plan.iter().enumerate() {
            info!(
                "Processing batch {}/{} (bookmarks {}-{})",
                n + 1,
                plan.len(),
                batch.start,
                batch.end() - 1
            );

            let structure = summarise_structure(&records[..batch.start]);
            let messages = build_messages(
                &prompt,
                &records[batch.start..batch.end()],
                batch.start,
                user_instructions,
                &structure,
                max_depth,
            )?;

            let entries = invoke_with_retry(
                &self.client,
                &mut self.session,
                &messages,
                &self.config.retry,
                max_depth,
            )
            .await?;

            let applied =
                merge_entries(&mut records[batch.start..batch.end()], batch.start, entries);
            debug!("Batch {} merged {}/{} entries", n + 1, applied, batch.len);
        }

        Ok(())
    }
}

/// Apply validated entries to the records of one batch.
///
/// `chunk[offset]` has global index `start + offset`. Records without an
/// entry stay untouched; for duplicate indices the last entry wins. Returns
/// the number of records updated.
pub fn merge_entries(
    chunk: &mut [BookmarkRecord],
    start: usize,
    entries: Vec<ReorgEntry>,
) -> usize {
    let mut by_index: HashMap<usize, ReorgEntry> =
        entries.into_iter().map(|entry| (entry.index, entry)).collect();
    let mut applied = 0;

    for (offset, record) in chunk.iter_mut().enumerate() {
        let index = start + offset;
        let Some(entry) = by_index.remove(&index) else {
            warn!("No reorganisation entry for bookmark {} ({})", index, record.url);
            continue;
        };

        record.title_after = if entry.title_after.is_empty() {
            record.title_before.clone()
        } else {
            entry.title_after
        };
        record.location_after = if entry.location_after.is_empty() {
            record.location_before.clone()
        } else {
            entry.location_after
        };
        record.metadata.tags = entry.tags;
        applied += 1;
    }

    if !by_index.is_empty() {
        let mut stray: Vec<usize> = by_index.into_keys().collect();
        stray.sort_unstable();
        debug!("Ignoring entries outside the batch: {:?}", stray);
    }

    applied
}
