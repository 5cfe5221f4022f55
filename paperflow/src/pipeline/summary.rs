//! Per-document outcomes and the run summary.
//!
//! A run never stops on a document failure; each failure is recorded
//! against its document and the batch continues.

use crate::core::{ArtifactKind, ArtifactRef, SourceDocument, StageName};
use crate::errors::StageFailure;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Record of the stage where a document failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Stage that failed.
    pub stage: StageName,
    /// Stable error tag.
    pub error_kind: String,
    /// Error message.
    pub message: String,
    /// When the failure was recorded.
    pub timestamp: DateTime<Utc>,
}

impl FailureRecord {
    /// Creates a failure record stamped with the current time.
    #[must_use]
    pub fn new(stage: StageName, error_kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage,
            error_kind: error_kind.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

impl From<&StageFailure> for FailureRecord {
    fn from(failure: &StageFailure) -> Self {
        Self::new(failure.stage, failure.kind(), failure.error.to_string())
    }
}

/// What happened to one source document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentOutcome {
    /// Document identifier (file name).
    pub document: String,
    /// Storage key of its artifacts.
    pub key: String,
    /// Stages that completed, in order.
    pub completed: Vec<StageName>,
    /// Files written for the document.
    pub artifacts: Vec<ArtifactRef>,
    /// Set when the document failed.
    pub failure: Option<FailureRecord>,
    /// When processing began.
    pub started_at: DateTime<Utc>,
    /// When processing ended.
    pub finished_at: DateTime<Utc>,
}

impl DocumentOutcome {
    /// Starts an outcome for a document.
    #[must_use]
    pub fn started(document: &SourceDocument) -> Self {
        Self::for_key(document.identifier.clone(), document.key())
    }

    /// Starts an outcome for an identifier and storage key.
    #[must_use]
    pub fn for_key(document: impl Into<String>, key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            document: document.into(),
            key: key.into(),
            completed: Vec::new(),
            artifacts: Vec::new(),
            failure: None,
            started_at: now,
            finished_at: now,
        }
    }

    /// Marks the outcome finished.
    pub fn finish(&mut self, failure: Option<FailureRecord>) {
        self.failure = failure;
        self.finished_at = Utc::now();
    }

    /// Returns true if every stage succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Wall time in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        u64::try_from((self.finished_at - self.started_at).num_milliseconds()).unwrap_or(0)
    }

    /// Artifacts of the given kind.
    pub fn artifacts_of(&self, kind: ArtifactKind) -> impl Iterator<Item = &ArtifactRef> {
        self.artifacts.iter().filter(move |artifact| artifact.kind == kind)
    }

    /// Converts to dictionary.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("document".to_string(), serde_json::json!(self.document));
        map.insert("key".to_string(), serde_json::json!(self.key));
        map.insert("success".to_string(), serde_json::json!(self.is_success()));
        map.insert("completed".to_string(), serde_json::json!(self.completed));
        map.insert("duration_ms".to_string(), serde_json::json!(self.duration_ms()));
        map.insert(
            "artifacts".to_string(),
            serde_json::json!(self.artifacts.iter().map(ArtifactRef::to_dict).collect::<Vec<_>>()),
        );
        if let Some(failure) = &self.failure {
            map.insert(
                "failure".to_string(),
                serde_json::json!({
                    "stage": failure.stage,
                    "error_kind": failure.error_kind,
                    "message": failure.message,
                    "timestamp": failure.timestamp.to_rfc3339(),
                }),
            );
        }
        map
    }
}

/// Summary of a run over a batch of documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingSummary {
    /// Run identifier (UUID v7).
    pub run_id: String,
    /// Documents that went through every stage.
    pub succeeded: usize,
    /// Documents that failed at some stage.
    pub failed: usize,
    /// Per-document outcomes, in input order.
    pub outcomes: Vec<DocumentOutcome>,
    /// When the run began.
    pub started_at: DateTime<Utc>,
    /// When the run ended.
    pub finished_at: DateTime<Utc>,
}

impl ProcessingSummary {
    /// Builds the summary from outcomes.
    #[must_use]
    pub fn new(run_id: impl Into<String>, started_at: DateTime<Utc>, outcomes: Vec<DocumentOutcome>) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        Self {
            run_id: run_id.into(),
            succeeded,
            failed: outcomes.len() - succeeded,
            outcomes,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Number of documents processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns true if at least one document succeeded end-to-end.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.succeeded > 0
    }

    /// Returns the share of documents that succeeded.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        self.succeeded as f64 / self.outcomes.len() as f64
    }

    /// Outcome of one document, by identifier.
    #[must_use]
    pub fn outcome(&self, document: &str) -> Option<&DocumentOutcome> {
        self.outcomes.iter().find(|o| o.document == document)
    }

    /// Outcomes of failed documents.
    pub fn failures(&self) -> impl Iterator<Item = &DocumentOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Converts to dictionary.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("run_id".to_string(), serde_json::json!(self.run_id));
        map.insert("succeeded".to_string(), serde_json::json!(self.succeeded));
        map.insert("failed".to_string(), serde_json::json!(self.failed));
        map.insert("success_rate".to_string(), serde_json::json!(self.success_rate()));
        map.insert(
            "outcomes".to_string(),
            serde_json::json!(self.outcomes.iter().map(DocumentOutcome::to_dict).collect::<Vec<_>>()),
        );
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExtractionError;

    fn failed(document: &str) -> DocumentOutcome {
        let mut outcome = DocumentOutcome::for_key(document, document);
        let failure = StageFailure::new(
            StageName::Review,
            ExtractionError::NoPayloadFound {
                markers: vec!["ARTICLE".to_string()],
            },
        );
        outcome.finish(Some(FailureRecord::from(&failure)));
        outcome
    }

    fn succeeded(document: &str) -> DocumentOutcome {
        let mut outcome = DocumentOutcome::for_key(document, document);
        outcome.completed = StageName::ALL.to_vec();
        outcome
            .artifacts
            .push(ArtifactRef::new(ArtifactKind::Record, document, "/tmp/x.yaml", b"x"));
        outcome.finish(None);
        outcome
    }

    #[test]
    fn test_summary_counts() {
        let summary = ProcessingSummary::new("run", Utc::now(), vec![succeeded("a"), failed("b"), succeeded("c")]);

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total(), 3);
        assert!(summary.is_success());
        assert_eq!(summary.failures().count(), 1);
        assert!((summary.success_rate() - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_all_failed_is_not_success() {
        let summary = ProcessingSummary::new("run", Utc::now(), vec![failed("a")]);
        assert!(!summary.is_success());
        assert_eq!(summary.success_rate(), 0.0);

        let empty = ProcessingSummary::new("run", Utc::now(), Vec::new());
        assert!(!empty.is_success());
    }

    #[test]
    fn test_failure_record_from_stage_failure() {
        let outcome = failed("b");
        let failure = outcome.failure.as_ref().unwrap();
        assert_eq!(failure.stage, StageName::Review);
        assert_eq!(failure.error_kind, "no_payload_found");
    }

    #[test]
    fn test_outcome_to_dict() {
        let outcome = succeeded("a");
        let dict = outcome.to_dict();
        assert_eq!(dict["success"], serde_json::json!(true));
        assert_eq!(dict["completed"], serde_json::json!(["read", "review", "research", "compose"]));
        assert_eq!(outcome.artifacts_of(ArtifactKind::Record).count(), 1);
        assert_eq!(outcome.artifacts_of(ArtifactKind::Document).count(), 0);

        let dict = failed("b").to_dict();
        assert_eq!(dict["failure"]["stage"], "review");
    }
}
