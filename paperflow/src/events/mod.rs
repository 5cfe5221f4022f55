//! Pipeline events.
//!
//! The coordinator publishes a [`PipelineEvent`] at each run, document and
//! stage transition. Sinks decide what to do with them: log, collect for
//! tests, or drop.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use crate::core::{ArtifactRef, StageName};
use serde_json::json;

/// Something that happened during a run.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A run began.
    RunStarted {
        /// Run identifier.
        run_id: String,
        /// Documents in the batch.
        documents: usize,
    },
    /// Processing of a document began.
    DocumentStarted {
        /// Document identifier.
        document: String,
    },
    /// A stage finished successfully.
    StageCompleted {
        /// Document identifier.
        document: String,
        /// The stage.
        stage: StageName,
        /// Characters of output.
        length: usize,
    },
    /// A stage failed; the document stops here.
    StageFailed {
        /// Document identifier.
        document: String,
        /// The stage.
        stage: StageName,
        /// Stable error tag.
        error_kind: String,
        /// Error message.
        message: String,
    },
    /// An artifact was written.
    ArtifactSaved {
        /// Document identifier.
        document: String,
        /// The artifact.
        artifact: ArtifactRef,
    },
    /// Every stage of a document succeeded.
    DocumentCompleted {
        /// Document identifier.
        document: String,
        /// Wall time in milliseconds.
        duration_ms: u64,
    },
    /// A document failed.
    DocumentFailed {
        /// Document identifier.
        document: String,
        /// Stage where it failed.
        stage: StageName,
        /// Stable error tag.
        error_kind: String,
    },
    /// A run finished.
    RunCompleted {
        /// Run identifier.
        run_id: String,
        /// Documents that went through every stage.
        succeeded: usize,
        /// Documents that failed.
        failed: usize,
    },
}

impl PipelineEvent {
    /// Dotted event type, e.g. `stage.completed`.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run.started",
            Self::DocumentStarted { .. } => "document.started",
            Self::StageCompleted { .. } => "stage.completed",
            Self::StageFailed { .. } => "stage.failed",
            Self::ArtifactSaved { .. } => "artifact.saved",
            Self::DocumentCompleted { .. } => "document.completed",
            Self::DocumentFailed { .. } => "document.failed",
            Self::RunCompleted { .. } => "run.completed",
        }
    }

    /// Event payload.
    #[must_use]
    pub fn data(&self) -> serde_json::Value {
        match self {
            Self::RunStarted { run_id, documents } => json!({"run_id": run_id, "documents": documents}),
            Self::DocumentStarted { document } => json!({"document": document}),
            Self::StageCompleted { document, stage, length } => {
                json!({"document": document, "stage": stage, "length": length})
            }
            Self::StageFailed {
                document,
                stage,
                error_kind,
                message,
            } => json!({
                "document": document,
                "stage": stage,
                "error_kind": error_kind,
                "message": message,
            }),
            Self::ArtifactSaved { document, artifact } => {
                json!({"document": document, "artifact": artifact.to_dict()})
            }
            Self::DocumentCompleted { document, duration_ms } => {
                json!({"document": document, "duration_ms": duration_ms})
            }
            Self::DocumentFailed {
                document,
                stage,
                error_kind,
            } => json!({"document": document, "stage": stage, "error_kind": error_kind}),
            Self::RunCompleted {
                run_id,
                succeeded,
                failed,
            } => json!({"run_id": run_id, "succeeded": succeeded, "failed": failed}),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_payloads() {
        let event = PipelineEvent::StageFailed {
            document: "paper.pdf".to_string(),
            stage: StageName::Review,
            error_kind: "no_payload_found".to_string(),
            message: "No structured payload found".to_string(),
        };
        assert_eq!(event.event_type(), "stage.failed");
        let data = event.data();
        assert_eq!(data["stage"], "review");
        assert_eq!(data["error_kind"], "no_payload_found");
    }

    #[test]
    fn test_run_completed_payload() {
        let event = PipelineEvent::RunCompleted {
            run_id: "r1".to_string(),
            succeeded: 2,
            failed: 1,
        };
        assert_eq!(event.data(), json!({"run_id": "r1", "succeeded": 2, "failed": 1}));
    }
}
