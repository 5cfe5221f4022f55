//! Web search through the Serper API.

use super::ContentTool;
use crate::errors::ToolError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const NAME: &str = "web_search";

/// Default Serper endpoint.
pub const SERPER_ENDPOINT: &str = "https://google.serper.dev/search";

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    q: &'a str,
    num: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    answer_box: Option<AnswerBox>,
    #[serde(default)]
    knowledge_graph: Option<KnowledgeGraph>,
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct AnswerBox {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KnowledgeGraph {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    title: String,
    link: String,
    #[serde(default)]
    snippet: Option<String>,
}

/// Web search tool backed by `google.serper.dev`.
#[derive(Debug, Clone)]
pub struct SerperSearchTool {
    client: Client,
    api_key: String,
    endpoint: String,
    num_results: usize,
}

impl SerperSearchTool {
    /// Creates a tool using `api_key`.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            endpoint: SERPER_ENDPOINT.to_string(),
            num_results: 8,
        }
    }

    /// Overrides the endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets how many organic results are requested.
    #[must_use]
    pub fn with_num_results(mut self, num_results: usize) -> Self {
        self.num_results = num_results.max(1);
        self
    }
}

#[async_trait]
impl ContentTool for SerperSearchTool {
    fn name(&self) -> &str {
        NAME
    }

    async fn query(&self, query: &str) -> Result<String, ToolError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&SearchRequest {
                q: query,
                num: self.num_results,
            })
            .send()
            .await
            .map_err(|err| ToolError::execution_failed(NAME, err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::execution_failed(
                NAME,
                format!("HTTP {status}: {}", body.chars().take(300).collect::<String>()),
            ));
        }

        let results: SearchResponse = response
            .json()
            .await
            .map_err(|err| ToolError::execution_failed(NAME, format!("invalid response: {err}")))?;
        tracing::debug!(query, organic = results.organic.len(), "Web search finished");
        Ok(format_results(&results))
    }
}

fn format_results(results: &SearchResponse) -> String {
    let mut blocks = Vec::new();

    if let Some(answer) = &results.answer_box {
        let text = answer.answer.as_ref().or(answer.snippet.as_ref());
        if let Some(text) = text {
            let title = answer.title.as_deref().unwrap_or("Answer");
            blocks.push(format!("{title}\n{text}"));
        }
    }

    if let Some(graph) = &results.knowledge_graph {
        if let Some(description) = &graph.description {
            let title = graph.title.as_deref().unwrap_or("Summary");
            blocks.push(format!("{title}\n{description}"));
        }
    }

    for result in &results.organic {
        let mut block = format!("Title: {}\nLink: {}", result.title, result.link);
        if let Some(snippet) = &result.snippet {
            block.push_str("\nSnippet: ");
            block.push_str(snippet);
        }
        blocks.push(block);
    }

    blocks.join("\n---\n")
}
