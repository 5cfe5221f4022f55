//! Configuration fixtures.

use crate::config::{AgentProfile, AgentsConfig, TaskSpec, TasksConfig};
use crate::core::StageName;

/// Agent profiles for every stage.
#[must_use]
pub fn sample_agents() -> AgentsConfig {
    AgentsConfig::default()
        .with_profile(
            StageName::Read,
            AgentProfile::new("PDF Reader", "Extract the requested fields", "A careful reader."),
        )
        .with_profile(
            StageName::Review,
            AgentProfile::new("YAML Reviewer", "Fix the extracted YAML", "A strict reviewer."),
        )
        .with_profile(
            StageName::Research,
            AgentProfile::new("Researcher", "Find related work", "A curious researcher."),
        )
        .with_profile(
            StageName::Compose,
            AgentProfile::new("Writer", "Write the article", "A science communicator."),
        )
}

/// Task definitions for every stage.
#[must_use]
pub fn sample_tasks() -> TasksConfig {
    TasksConfig::default()
        .with_task(
            StageName::Read,
            TaskSpec::new("Read {document} and extract: {requests}", "YAML following {template}")
                .with_input("requests", "gap, objectives, methodology, results")
                .with_input("template", "ARTICLE:\n  - FILE: {document}\n    GAP: ..."),
        )
        .with_task(
            StageName::Review,
            TaskSpec::new("Review the YAML extracted from {document}", "Corrected YAML"),
        )
        .with_task(
            StageName::Research,
            TaskSpec::new("Research work related to {document}", "A list of references"),
        )
        .with_task(
            StageName::Compose,
            TaskSpec::new("Write an article about {document}", "Markdown"),
        )
}

/// A model reply wrapping an `ARTICLE` payload in a fenced block with
/// surrounding chatter.
#[must_use]
pub fn fenced_payload(gap: &str) -> String {
    format!(
        "Here is the result:\n```yaml\nARTICLE:\n  - GAP: {gap}\n    OBJECTIVES: Measure it\n    RESULTS: It works\n```\nLet me know if you need more."
    )
}
