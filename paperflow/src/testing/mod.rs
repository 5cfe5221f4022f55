//! Test doubles for paperflow pipelines.
//!
//! This module provides:
//! - A scripted language model with per-stage, per-document replies
//! - Static content tools and a tool factory
//! - Ready-made agent and task configurations

mod fixtures;
mod mocks;

pub use fixtures::{fenced_payload, sample_agents, sample_tasks};
pub use mocks::{ScriptedModel, StaticTool, StaticToolFactory};
