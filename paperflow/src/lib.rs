//! # Paperflow
//!
//! A staged LLM pipeline that turns scientific-article PDFs into structured
//! records and publishable articles.
//!
//! Every source document goes through four stages:
//!
//! - **read**: the reader agent queries the PDF and drafts a structured payload
//! - **review**: the reviewer corrects the draft; the payload is extracted,
//!   validated and persisted as a YAML record
//! - **research**: the researcher looks up related work on the web
//! - **compose**: the composer writes the final markdown article
//!
//! A failure at any stage stops that document only; the batch continues and
//! the run ends with a [`pipeline::ProcessingSummary`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use paperflow::prelude::*;
//! use std::sync::Arc;
//!
//! let layout = ResourceLayout::from_root("resources");
//! let model = Arc::new(OpenAiClient::new(api_key));
//! let coordinator = PipelineCoordinator::from_layout(model, agents, tasks, &layout)
//!     .with_options(PipelineOptions::default().with_concurrency(2));
//!
//! let documents = SourceDocument::discover(&layout.pdfs)?;
//! let summary = coordinator.process(&documents).await;
//! println!("{} succeeded, {} failed", summary.succeeded, summary.failed);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod backend;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod extraction;
pub mod pipeline;
pub mod render;
pub mod stages;
pub mod store;
pub mod testing;
pub mod tools;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backend::{Completion, CompletionRequest, LanguageModel, OpenAiClient};
    pub use crate::config::{
        AgentProfile, AgentsConfig, ComposeMode, Credentials, PipelineOptions, ResourceLayout,
        RetryPolicy, TaskSpec, TasksConfig,
    };
    pub use crate::core::{
        ArtifactKind, ArtifactRef, RunState, SourceDocument, StageName, StageResult, StageStatus,
    };
    pub use crate::errors::{
        BackendError, ConfigurationError, ExtractionError, PaperflowError, PersistenceError,
        StageFailure, StageInvocationError, ToolError,
    };
    pub use crate::events::{
        CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, PipelineEvent,
    };
    pub use crate::extraction::{KeyOrder, PayloadExtractor, SliceBoundary, StructuredRecord};
    pub use crate::pipeline::{
        render_records, DocumentOutcome, PipelineCoordinator, ProcessingSummary,
    };
    pub use crate::render::{derive_title, ArticleRenderer, ArticleTemplate};
    pub use crate::stages::{StageCall, StageRunner};
    pub use crate::store::{DocumentStore, RecordStore};
    pub use crate::tools::{ContentTool, DocumentToolFactory};
}
