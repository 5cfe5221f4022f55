//! Pipeline coordination.
//!
//! This module provides:
//! - The coordinator that drives documents through read, review, research
//!   and compose
//! - Per-document outcomes and the run summary
//! - Rendering of persisted records into documents

mod coordinator;
mod publish;
mod summary;

pub use coordinator::PipelineCoordinator;
pub use publish::{publish_record, render_record, render_records};
pub use summary::{DocumentOutcome, FailureRecord, ProcessingSummary};
