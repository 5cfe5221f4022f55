//! Scripted backends and tools.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{Completion, CompletionRequest, LanguageModel};
use crate::core::{SourceDocument, StageName};
use crate::errors::{BackendError, ToolError};
use crate::tools::{ContentTool, DocumentToolFactory};

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(BackendError),
}

/// A language model that answers from a script.
///
/// Replies are looked up by stage and document identifier first, then by
/// stage alone. A call with no scripted reply fails with
/// `BackendError::InvalidResponse`. Every request is recorded.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: HashMap<(StageName, Option<String>), Reply>,
    delays: HashMap<StageName, Duration>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    /// Creates a model with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replies with `text` to every call of `stage`.
    #[must_use]
    pub fn with_response(mut self, stage: StageName, text: impl Into<String>) -> Self {
        self.replies.insert((stage, None), Reply::Text(text.into()));
        self
    }

    /// Replies with `text` to calls of `stage` for one document.
    #[must_use]
    pub fn with_document_response(
        mut self,
        stage: StageName,
        document: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.replies
            .insert((stage, Some(document.into())), Reply::Text(text.into()));
        self
    }

    /// Fails every call of `stage`.
    #[must_use]
    pub fn with_failure(mut self, stage: StageName, error: BackendError) -> Self {
        self.replies.insert((stage, None), Reply::Fail(error));
        self
    }

    /// Fails calls of `stage` for one document.
    #[must_use]
    pub fn with_document_failure(
        mut self,
        stage: StageName,
        document: impl Into<String>,
        error: BackendError,
    ) -> Self {
        self.replies
            .insert((stage, Some(document.into())), Reply::Fail(error));
        self
    }

    /// Sleeps before answering calls of `stage`.
    #[must_use]
    pub fn with_delay(mut self, stage: StageName, delay: Duration) -> Self {
        self.delays.insert(stage, delay);
        self
    }

    /// Every request received, in call order.
    #[must_use]
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    /// Number of calls made for `stage`.
    #[must_use]
    pub fn call_count(&self, stage: StageName) -> usize {
        self.requests.lock().iter().filter(|r| r.stage == stage).count()
    }

    /// Requests made for one document, in call order.
    #[must_use]
    pub fn requests_for(&self, document: &str) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.document == document)
            .cloned()
            .collect()
    }

    fn reply_for(&self, stage: StageName, document: &str) -> Option<&Reply> {
        self.replies
            .get(&(stage, Some(document.to_string())))
            .or_else(|| self.replies.get(&(stage, None)))
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, BackendError> {
        self.requests.lock().push(request.clone());

        if let Some(delay) = self.delays.get(&request.stage) {
            tokio::time::sleep(*delay).await;
        }

        match self.reply_for(request.stage, &request.document) {
            Some(Reply::Text(text)) => Ok(Completion::new(text.clone(), "scripted")),
            Some(Reply::Fail(error)) => Err(error.clone()),
            None => Err(BackendError::InvalidResponse {
                reason: format!("no scripted reply for {} / {}", request.stage, request.document),
            }),
        }
    }
}

/// A tool that returns fixed text, or fails.
#[derive(Debug, Clone)]
pub struct StaticTool {
    name: String,
    text: Option<String>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl StaticTool {
    /// A tool answering every query with `text`.
    #[must_use]
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: Some(text.into()),
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A tool failing every query.
    #[must_use]
    pub fn failing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: None,
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queries received so far.
    #[must_use]
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl ContentTool for StaticTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(&self, query: &str) -> Result<String, ToolError> {
        self.queries.lock().push(query.to_string());
        self.text
            .clone()
            .ok_or_else(|| ToolError::execution_failed(&self.name, "scripted failure"))
    }
}

/// Opens a [`StaticTool`] for any document not marked unavailable.
#[derive(Debug, Clone, Default)]
pub struct StaticToolFactory {
    text: String,
    unavailable: HashSet<String>,
}

impl StaticToolFactory {
    /// A factory whose tools answer with `text`.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            unavailable: HashSet::new(),
        }
    }

    /// Refuses to open a tool for `document`.
    #[must_use]
    pub fn with_unavailable(mut self, document: impl Into<String>) -> Self {
        self.unavailable.insert(document.into());
        self
    }
}

impl DocumentToolFactory for StaticToolFactory {
    fn open(&self, document: &SourceDocument) -> Result<Arc<dyn ContentTool>, ToolError> {
        if self.unavailable.contains(&document.identifier) {
            return Err(ToolError::unavailable("pdf_search", "document unavailable"));
        }
        Ok(Arc::new(StaticTool::new("pdf_search", self.text.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentProfile;

    fn request(stage: StageName, document: &str) -> CompletionRequest {
        CompletionRequest {
            stage,
            document: document.to_string(),
            profile: AgentProfile::new("role", "goal", ""),
            description: String::new(),
            expected_output: String::new(),
            context: Vec::new(),
            tool_context: None,
        }
    }

    #[tokio::test]
    async fn test_document_reply_overrides_stage_reply() {
        let model = ScriptedModel::new()
            .with_response(StageName::Read, "default")
            .with_document_response(StageName::Read, "b.pdf", "special");

        let a = model.complete(&request(StageName::Read, "a.pdf")).await.unwrap();
        let b = model.complete(&request(StageName::Read, "b.pdf")).await.unwrap();
        assert_eq!(a.content, "default");
        assert_eq!(b.content, "special");
        assert_eq!(model.call_count(StageName::Read), 2);
    }

    #[tokio::test]
    async fn test_unscripted_call_fails() {
        let model = ScriptedModel::new();
        let err = model.complete(&request(StageName::Review, "a.pdf")).await.unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(model.requests_for("a.pdf").len(), 1);
    }

    #[tokio::test]
    async fn test_static_tool() {
        let tool = StaticTool::new("pdf_search", "passage");
        assert_eq!(tool.query("gap").await.unwrap(), "passage");
        assert_eq!(tool.queries(), vec!["gap"]);
        assert!(StaticTool::failing("web_search").query("x").await.is_err());
    }

    #[test]
    fn test_static_factory_unavailable() {
        let factory = StaticToolFactory::new("text").with_unavailable("missing.pdf");
        assert!(factory.open(&SourceDocument::from_path("/tmp/ok.pdf")).is_ok());
        assert!(factory.open(&SourceDocument::from_path("/tmp/missing.pdf")).is_err());
    }
}
