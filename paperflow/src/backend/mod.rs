//! Language-model backends.
//!
//! The pipeline only needs "prompt and context in, text out". The
//! [`LanguageModel`] trait is that seam; [`OpenAiClient`] implements it over
//! an OpenAI-compatible chat completions endpoint, and
//! [`crate::testing::ScriptedModel`] implements it for tests.

mod openai;

pub use openai::{OpenAiClient, DEFAULT_API_BASE, DEFAULT_MODEL};

use crate::config::AgentProfile;
use crate::core::StageName;
use crate::errors::BackendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Output of a tool consulted on behalf of a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolContext {
    /// Tool name.
    pub tool: String,
    /// The query the tool was given.
    pub query: String,
    /// The text it returned.
    pub text: String,
}

/// Everything a backend needs to run one stage for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The stage being run.
    pub stage: StageName,
    /// The document being processed.
    pub document: String,
    /// The agent persona.
    pub profile: AgentProfile,
    /// Task description, placeholders already filled in.
    pub description: String,
    /// Expected output, placeholders already filled in.
    pub expected_output: String,
    /// Outputs of upstream stages, oldest first.
    pub context: Vec<String>,
    /// Tool output gathered before the call.
    pub tool_context: Option<ToolContext>,
}

impl CompletionRequest {
    /// The system message: persona and goal.
    #[must_use]
    pub fn system_prompt(&self) -> String {
        let mut prompt = format!("You are {}.", self.profile.role);
        if !self.profile.backstory.trim().is_empty() {
            prompt.push(' ');
            prompt.push_str(self.profile.backstory.trim());
        }
        prompt.push_str("\nYour personal goal is: ");
        prompt.push_str(self.profile.goal.trim());
        prompt
    }

    /// The user message: task, expected output, upstream context and tool results.
    #[must_use]
    pub fn user_prompt(&self) -> String {
        let mut prompt = self.description.trim().to_string();

        if !self.expected_output.trim().is_empty() {
            prompt.push_str("\n\nThis is the expected criteria for your final answer: ");
            prompt.push_str(self.expected_output.trim());
        }

        if !self.context.is_empty() {
            prompt.push_str("\n\nThis is the context you're working with:\n");
            prompt.push_str(&self.context.join("\n\n"));
        }

        if let Some(tool) = &self.tool_context {
            prompt.push_str(&format!(
                "\n\nResults from the {} tool for \"{}\":\n{}",
                tool.tool, tool.query, tool.text
            ));
        }
        prompt
    }
}

/// A completed backend call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text.
    pub content: String,
    /// Model that produced it.
    pub model: String,
    /// Prompt tokens, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u32>,
    /// Completion tokens, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u32>,
    /// Round-trip time of the call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    /// Why generation stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl Completion {
    /// Creates a completion with only content and model set.
    #[must_use]
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            input_tokens: None,
            output_tokens: None,
            latency_ms: None,
            finish_reason: None,
        }
    }

    /// Returns total tokens.
    #[must_use]
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens.unwrap_or(0) + self.output_tokens.unwrap_or(0)
    }

    /// Converts to a dictionary representation for events.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("llm.model".to_string(), serde_json::json!(self.model));
        if let Some(tokens) = self.input_tokens {
            map.insert("llm.input_tokens".to_string(), serde_json::json!(tokens));
        }
        if let Some(tokens) = self.output_tokens {
            map.insert("llm.output_tokens".to_string(), serde_json::json!(tokens));
        }
        map.insert("llm.total_tokens".to_string(), serde_json::json!(self.total_tokens()));
        if let Some(latency) = self.latency_ms {
            map.insert("llm.latency_ms".to_string(), serde_json::json!(latency));
        }
        map
    }
}

/// A language-model backend.
///
/// Implementations must be safe to call concurrently; one handle is shared
/// by every document in a run.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Runs one completion.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            stage: StageName::Review,
            document: "paper.pdf".to_string(),
            profile: AgentProfile::new("YAML Reviewer", "Fix the YAML", "Strict editor."),
            description: "Review the YAML.".to_string(),
            expected_output: "Corrected YAML".to_string(),
            context: vec!["### Output of the read stage (Reader)\nARTICLE: []".to_string()],
            tool_context: None,
        }
    }

    #[test]
    fn test_system_prompt() {
        assert_eq!(
            request().system_prompt(),
            "You are YAML Reviewer. Strict editor.\nYour personal goal is: Fix the YAML"
        );
    }

    #[test]
    fn test_user_prompt_includes_context_and_tool() {
        let mut req = request();
        req.tool_context = Some(ToolContext {
            tool: "web_search".to_string(),
            query: "yaml".to_string(),
            text: "result".to_string(),
        });
        let prompt = req.user_prompt();

        assert!(prompt.starts_with("Review the YAML."));
        assert!(prompt.contains("expected criteria for your final answer: Corrected YAML"));
        assert!(prompt.contains("Output of the read stage"));
        assert!(prompt.ends_with("Results from the web_search tool for \"yaml\":\nresult"));
    }

    #[test]
    fn test_completion_tokens() {
        let mut completion = Completion::new("text", "gpt-4o-mini");
        assert_eq!(completion.total_tokens(), 0);
        completion.input_tokens = Some(10);
        completion.output_tokens = Some(5);
        assert_eq!(completion.total_tokens(), 15);
        assert_eq!(completion.to_dict()["llm.total_tokens"], 15);
    }
}
