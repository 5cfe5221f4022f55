//! Running one stage against the language-model backend.

use super::runtime::{run_with_retry, run_with_timeout, TimedResult};
use crate::backend::{CompletionRequest, LanguageModel, ToolContext};
use crate::config::{interpolate, AgentsConfig, RetryPolicy, TasksConfig};
use crate::core::{StageName, StageResult};
use crate::errors::{StageInvocationError, ToolError};
use crate::tools::ContentTool;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One stage invocation for one document.
pub struct StageCall<'a> {
    stage: StageName,
    document: &'a str,
    inputs: &'a BTreeMap<String, String>,
    context: Vec<&'a StageResult>,
    tool: Option<(&'a dyn ContentTool, String)>,
}

impl<'a> StageCall<'a> {
    /// Creates a call without context or tool.
    #[must_use]
    pub fn new(stage: StageName, document: &'a str, inputs: &'a BTreeMap<String, String>) -> Self {
        Self {
            stage,
            document,
            inputs,
            context: Vec::new(),
            tool: None,
        }
    }

    /// Adds upstream outputs, oldest first.
    #[must_use]
    pub fn with_context(mut self, context: &[&'a StageResult]) -> Self {
        self.context.extend_from_slice(context);
        self
    }

    /// Consults `tool` with `query` before calling the model.
    #[must_use]
    pub fn with_tool(mut self, tool: &'a dyn ContentTool, query: impl Into<String>) -> Self {
        self.tool = Some((tool, query.into()));
        self
    }

    /// The stage this call runs.
    #[must_use]
    pub fn stage(&self) -> StageName {
        self.stage
    }
}

/// Executes stages: builds the prompt from the agent profile and task,
/// consults the stage's tool, calls the backend under a timeout with
/// retries, and tags the output with the stage.
#[derive(Clone)]
pub struct StageRunner {
    model: Arc<dyn LanguageModel>,
    agents: Arc<AgentsConfig>,
    tasks: Arc<TasksConfig>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl StageRunner {
    /// Creates a runner with a 300 s timeout and the default retry policy.
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>, agents: Arc<AgentsConfig>, tasks: Arc<TasksConfig>) -> Self {
        Self {
            model,
            agents,
            tasks,
            timeout: Duration::from_secs(300),
            retry: RetryPolicy::default(),
        }
    }

    /// Sets the per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The task configuration.
    #[must_use]
    pub fn tasks(&self) -> &TasksConfig {
        &self.tasks
    }

    /// Runs a stage.
    ///
    /// # Errors
    ///
    /// - `NotConfigured` when the stage has no agent or task.
    /// - `Tool` when the stage's tool fails.
    /// - `Backend` or `Timeout` when the model call fails after retries.
    pub async fn run(&self, call: StageCall<'_>) -> Result<StageResult, StageInvocationError> {
        let stage = call.stage;
        let profile = self
            .agents
            .for_stage(stage)
            .ok_or_else(|| StageInvocationError::NotConfigured {
                stage,
                what: "agent".to_string(),
            })?;
        let task = self
            .tasks
            .for_stage(stage)
            .ok_or_else(|| StageInvocationError::NotConfigured {
                stage,
                what: "task".to_string(),
            })?;

        let start = Instant::now();
        let tool_context = match &call.tool {
            Some((tool, query)) => Some(self.consult(stage, *tool, query).await?),
            None => None,
        };

        let request = CompletionRequest {
            stage,
            document: call.document.to_string(),
            profile: profile.clone(),
            description: interpolate(&task.description, call.inputs),
            expected_output: interpolate(&task.expected_output, call.inputs),
            context: call.context.iter().map(|result| result.as_context_block()).collect(),
            tool_context,
        };

        let request = &request;
        let model = self.model.as_ref();
        let timeout = self.timeout;
        let completion = run_with_retry(&self.retry, StageInvocationError::is_transient, || async move {
            match run_with_timeout(timeout, model.complete(request)).await {
                TimedResult::Ok(completion) => Ok(completion),
                TimedResult::Err(err) => Err(err.for_stage(stage)),
                TimedResult::Timeout => Err(StageInvocationError::Timeout {
                    stage,
                    seconds: timeout.as_secs_f64(),
                }),
            }
        })
        .await?;

        tracing::debug!(
            stage = %stage,
            document = call.document,
            model = %completion.model,
            tokens = completion.total_tokens(),
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Stage call finished"
        );
        Ok(StageResult::new(stage, profile.role.clone(), completion.content))
    }

    async fn consult(
        &self,
        stage: StageName,
        tool: &dyn ContentTool,
        query: &str,
    ) -> Result<ToolContext, StageInvocationError> {
        let text = run_with_timeout(self.timeout, tool.query(query))
            .await
            .into_result(|| ToolError::execution_failed(tool.name(), "timed out"))
            .map_err(|err| err.for_stage(stage))?;

        tracing::debug!(stage = %stage, tool = tool.name(), length = text.len(), "Tool consulted");
        Ok(ToolContext {
            tool: tool.name().to_string(),
            query: query.to_string(),
            text,
        })
    }
}
