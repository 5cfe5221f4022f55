//! Rendering persisted records into documents.

use super::summary::{DocumentOutcome, FailureRecord, ProcessingSummary};
use crate::core::{ArtifactRef, StageName};
use crate::errors::{PaperflowError, PersistenceError};
use crate::extraction::StructuredRecord;
use crate::render::{derive_title, ArticleRenderer};
use crate::store::{DocumentStore, RecordStore};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

/// Loads the record stored under `key`, renders it and writes the document.
///
/// # Errors
///
/// Returns the `PersistenceError` of the load or the save.
pub fn render_record(
    records: &RecordStore,
    documents: &DocumentStore,
    renderer: &ArticleRenderer,
    key: &str,
) -> Result<ArtifactRef, PersistenceError> {
    let record = records.load(key)?;
    publish_record(documents, renderer, key, &record)
}

/// Renders `record` and writes it as the document for `key`.
///
/// # Errors
///
/// Returns the `PersistenceError` of the save.
pub fn publish_record(
    documents: &DocumentStore,
    renderer: &ArticleRenderer,
    key: &str,
    record: &StructuredRecord,
) -> Result<ArtifactRef, PersistenceError> {
    let text = renderer.render_article(record, &derive_title(key));
    documents.save(key, &text)
}

/// Renders every persisted record matching `pattern`.
///
/// Records that cannot be loaded or written are reported in the summary as
/// compose failures; the others are still rendered.
///
/// # Errors
///
/// Fails only when the record directory cannot be listed.
pub fn render_records(
    records: &RecordStore,
    documents: &DocumentStore,
    renderer: &ArticleRenderer,
    pattern: &str,
) -> Result<ProcessingSummary, PersistenceError> {
    let started_at = Utc::now();
    let keys = records.list(pattern)?;
    info!(records = keys.len(), pattern, "Rendering stored records");

    let outcomes = keys
        .into_iter()
        .map(|key| {
            let mut outcome = DocumentOutcome::for_key(key.clone(), key.clone());
            match render_record(records, documents, renderer, &key) {
                Ok(artifact) => {
                    info!(key = %key, path = %artifact.path.display(), "Record rendered");
                    outcome.completed.push(StageName::Compose);
                    outcome.artifacts.push(artifact);
                    outcome.finish(None);
                }
                Err(err) => {
                    let err = PaperflowError::from(err);
                    warn!(key = %key, error_kind = err.kind(), error = %err, "Record not rendered");
                    outcome.finish(Some(FailureRecord::new(StageName::Compose, err.kind(), err.to_string())));
                }
            }
            outcome
        })
        .collect();

    Ok(ProcessingSummary::new(Uuid::now_v7().to_string(), started_at, outcomes))
}
