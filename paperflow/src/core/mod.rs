//! Core domain model types for paperflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Stage identity and status enums
//! - Raw stage results tagged with their producer
//! - Per-document run state
//! - References to persisted artifacts
//! - Source documents

mod artifact;
mod output;
mod source;
mod state;
mod status;

pub use artifact::{ArtifactKind, ArtifactRef};
pub use output::StageResult;
pub use source::SourceDocument;
pub use state::RunState;
pub use status::{StageName, StageStatus};
