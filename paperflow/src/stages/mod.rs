//! Stage execution.
//!
//! A stage is one LLM call bound to an agent profile and a task. The
//! [`StageRunner`] turns a [`StageCall`] (stage, document, upstream context,
//! optional tool) into a [`crate::core::StageResult`] tagged with the stage
//! that produced it.

mod runner;
mod runtime;

pub use runner::{StageCall, StageRunner};
pub use runtime::{run_with_retry, run_with_timeout, TimedResult};
