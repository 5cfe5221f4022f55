//! The pipeline coordinator.
//!
//! For each source document the coordinator runs read, review, research and
//! compose in order, feeding every stage the outputs it depends on. Any
//! failure stops that document only: it is recorded, logged with the
//! document and stage, and the batch moves on.

use super::publish::publish_record;
use super::summary::{DocumentOutcome, FailureRecord, ProcessingSummary};
use crate::backend::LanguageModel;
use crate::config::{AgentsConfig, ComposeMode, PipelineOptions, ResourceLayout, TasksConfig};
use crate::core::{ArtifactRef, RunState, SourceDocument, StageName, StageResult};
use crate::errors::{StageFailure, StageInvocationError};
use crate::events::{EventSink, NoOpEventSink, PipelineEvent};
use crate::extraction::{PayloadExtractor, StructuredRecord};
use crate::render::ArticleRenderer;
use crate::stages::{StageCall, StageRunner};
use crate::store::{DocumentStore, RecordStore};
use crate::tools::{leading_words, ContentTool, DocumentToolFactory};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

/// Words of the review output used as the web-search query.
const RESEARCH_QUERY_WORDS: usize = 30;

/// Drives source documents through the four stages.
pub struct PipelineCoordinator {
    runner: StageRunner,
    extractor: PayloadExtractor,
    records: RecordStore,
    documents: DocumentStore,
    renderer: ArticleRenderer,
    document_tools: Option<Arc<dyn DocumentToolFactory>>,
    search: Option<Arc<dyn ContentTool>>,
    events: Arc<dyn EventSink>,
    options: PipelineOptions,
}

impl PipelineCoordinator {
    /// Creates a coordinator with default options, no tools and no events.
    ///
    /// The article template comes from the compose task when configured.
    #[must_use]
    pub fn new(runner: StageRunner, records: RecordStore, documents: DocumentStore) -> Self {
        let renderer = ArticleRenderer::new(runner.tasks().article().cloned().unwrap_or_default());
        Self {
            runner,
            extractor: PayloadExtractor::new(),
            records,
            documents,
            renderer,
            document_tools: None,
            search: None,
            events: Arc::new(NoOpEventSink),
            options: PipelineOptions::default(),
        }
        .with_options(PipelineOptions::default())
    }

    /// Wires a coordinator to the stores of a resource layout.
    #[must_use]
    pub fn from_layout(
        model: Arc<dyn LanguageModel>,
        agents: AgentsConfig,
        tasks: TasksConfig,
        layout: &ResourceLayout,
    ) -> Self {
        let runner = StageRunner::new(model, Arc::new(agents), Arc::new(tasks));
        let records = RecordStore::new(&layout.yamls).with_fallback_dir(layout.fallback_yamls.clone());
        let documents = DocumentStore::new(&layout.markdown).with_fallback_dir(layout.fallback_markdown.clone());
        Self::new(runner, records, documents)
    }

    /// Applies run options to the runner, extractor and record store.
    #[must_use]
    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.runner = self
            .runner
            .with_timeout(options.stage_timeout)
            .with_retry(options.retry.clone());
        self.extractor = PayloadExtractor::new()
            .with_markers(options.payload_markers.clone())
            .with_boundary(options.slice_boundary);
        self.records = self
            .records
            .with_key_order(options.key_order)
            .with_markers(options.payload_markers.clone());
        self.options = options;
        self
    }

    /// Sets the factory of the read stage's document tool.
    #[must_use]
    pub fn with_document_tools(mut self, factory: Arc<dyn DocumentToolFactory>) -> Self {
        self.document_tools = Some(factory);
        self
    }

    /// Sets the research stage's search tool.
    #[must_use]
    pub fn with_search_tool(mut self, tool: Arc<dyn ContentTool>) -> Self {
        self.search = Some(tool);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Replaces the article renderer.
    #[must_use]
    pub fn with_renderer(mut self, renderer: ArticleRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    /// The options in effect.
    #[must_use]
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// The record store.
    #[must_use]
    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    /// The document store.
    #[must_use]
    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    /// Processes a batch of documents.
    ///
    /// Up to `max_concurrent_documents` documents are in flight at once;
    /// stages of one document always run in order. Outcomes keep the input
    /// order. Never fails: per-document errors end up in the summary.
    pub async fn process(&self, sources: &[SourceDocument]) -> ProcessingSummary {
        let run_id = Uuid::now_v7().to_string();
        let started_at = Utc::now();
        let concurrency = self.options.max_concurrent_documents.max(1);

        info!(run_id = %run_id, documents = sources.len(), concurrency, "Pipeline run started");
        self.events
            .publish(&PipelineEvent::RunStarted {
                run_id: run_id.clone(),
                documents: sources.len(),
            })
            .await;

        let outcomes: Vec<DocumentOutcome> = stream::iter(sources)
            .map(|source| self.process_document(source))
            .buffered(concurrency)
            .collect()
            .await;

        let summary = ProcessingSummary::new(run_id, started_at, outcomes);
        info!(
            run_id = %summary.run_id,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Pipeline run finished"
        );
        self.events
            .publish(&PipelineEvent::RunCompleted {
                run_id: summary.run_id.clone(),
                succeeded: summary.succeeded,
                failed: summary.failed,
            })
            .await;
        summary
    }

    /// Runs every stage for one document and reports what happened.
    pub async fn process_document(&self, source: &SourceDocument) -> DocumentOutcome {
        let span = tracing::info_span!("document", document = %source.identifier);
        async move {
            let start = Instant::now();
            let mut outcome = DocumentOutcome::started(source);
            let mut state = RunState::new();

            info!("Processing document");
            self.events
                .publish(&PipelineEvent::DocumentStarted {
                    document: source.identifier.clone(),
                })
                .await;

            let result = self.run_stages(source, &mut state, &mut outcome.artifacts).await;
            outcome.completed = state.completed();

            match result {
                Ok(()) => {
                    outcome.finish(None);
                    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
                    info!(duration_ms, artifacts = outcome.artifacts.len(), "Document completed");
                    self.events
                        .publish(&PipelineEvent::DocumentCompleted {
                            document: source.identifier.clone(),
                            duration_ms,
                        })
                        .await;
                }
                Err(failure) => {
                    warn!(
                        stage = %failure.stage,
                        error_kind = failure.kind(),
                        error = %failure.error,
                        "Document failed"
                    );
                    self.events
                        .publish(&PipelineEvent::StageFailed {
                            document: source.identifier.clone(),
                            stage: failure.stage,
                            error_kind: failure.kind().to_string(),
                            message: failure.error.to_string(),
                        })
                        .await;
                    self.events
                        .publish(&PipelineEvent::DocumentFailed {
                            document: source.identifier.clone(),
                            stage: failure.stage,
                            error_kind: failure.kind().to_string(),
                        })
                        .await;
                    outcome.finish(Some(FailureRecord::from(&failure)));
                }
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run_stages(
        &self,
        source: &SourceDocument,
        state: &mut RunState,
        artifacts: &mut Vec<ArtifactRef>,
    ) -> Result<(), StageFailure> {
        let document = source.identifier.as_str();
        let key = source.key();
        let inputs = self.runner.tasks().document_inputs(document);

        state.start(StageName::Read);
        let read = self.read(source, &inputs).await;
        let read = self.settle(document, state, read).await?;

        state.start(StageName::Review);
        let review = self.review(document, &inputs, &read).await;
        let (review, record) = self.settle(document, state, review).await?;
        let artifact = self
            .records
            .save(&record, &key)
            .map_err(|e| mark_failed(state, StageFailure::new(StageName::Review, e)))?;
        self.saved(document, artifacts, artifact).await;

        state.start(StageName::Research);
        let research = self.research(document, &inputs, &review).await;
        let research = self.settle(document, state, research).await?;

        state.start(StageName::Compose);
        let compose = self.compose(document, &inputs, &review, &research).await;
        let compose = self.settle(document, state, compose).await?;
        let artifact = self
            .publish(&key, &compose, &record)
            .map_err(|failure| mark_failed(state, failure))?;
        self.saved(document, artifacts, artifact).await;

        Ok(())
    }

    /// Read: query the document tool with the extraction requests, then
    /// check the reply carries a structured payload.
    async fn read(
        &self,
        source: &SourceDocument,
        inputs: &BTreeMap<String, String>,
    ) -> Result<StageResult, StageFailure> {
        let tool = match &self.document_tools {
            Some(factory) => Some(factory.open(source).map_err(|e| e.for_stage(StageName::Read))?),
            None => None,
        };
        let query = inputs
            .get("requests")
            .filter(|requests| !requests.trim().is_empty())
            .map_or_else(|| source.identifier.clone(), Clone::clone);

        let mut call = StageCall::new(StageName::Read, &source.identifier, inputs);
        if let Some(tool) = &tool {
            call = call.with_tool(tool.as_ref(), query);
        }
        let read = self.runner.run(call).await?;
        self.extractor
            .extract(&read.raw_text)
            .map_err(|e| StageFailure::new(StageName::Read, e))?;
        Ok(read)
    }

    /// Review: correct the read draft; the reply must carry a valid record.
    async fn review(
        &self,
        document: &str,
        inputs: &BTreeMap<String, String>,
        read: &StageResult,
    ) -> Result<(StageResult, StructuredRecord), StageFailure> {
        let review = self
            .runner
            .run(StageCall::new(StageName::Review, document, inputs).with_context(&[read]))
            .await?;
        let record = self
            .extractor
            .extract(&review.raw_text)
            .map_err(|e| StageFailure::new(StageName::Review, e))?;
        Ok((review, record))
    }

    /// Research: free text, must be longer than the configured minimum.
    async fn research(
        &self,
        document: &str,
        inputs: &BTreeMap<String, String>,
        review: &StageResult,
    ) -> Result<StageResult, StageFailure> {
        let mut call = StageCall::new(StageName::Research, document, inputs).with_context(&[review]);
        if let Some(search) = &self.search {
            call = call.with_tool(search.as_ref(), leading_words(&review.raw_text, RESEARCH_QUERY_WORDS));
        }
        let research = self.runner.run(call).await?;

        let length = research.meaningful_len();
        let minimum = self.options.research_min_chars;
        if length <= minimum {
            return Err(StageInvocationError::InsufficientOutput {
                stage: StageName::Research,
                length,
                minimum,
            }
            .into());
        }
        Ok(research)
    }

    /// Compose: the final article from the review and research outputs.
    async fn compose(
        &self,
        document: &str,
        inputs: &BTreeMap<String, String>,
        review: &StageResult,
        research: &StageResult,
    ) -> Result<StageResult, StageFailure> {
        let compose = self
            .runner
            .run(StageCall::new(StageName::Compose, document, inputs).with_context(&[review, research]))
            .await?;
        if self.options.compose_mode == ComposeMode::PassThrough && compose.is_blank() {
            return Err(StageInvocationError::InsufficientOutput {
                stage: StageName::Compose,
                length: 0,
                minimum: 0,
            }
            .into());
        }
        Ok(compose)
    }

    /// Writes the final document for `key`. Template mode renders the
    /// record this run just reviewed.
    fn publish(
        &self,
        key: &str,
        compose: &StageResult,
        record: &StructuredRecord,
    ) -> Result<ArtifactRef, StageFailure> {
        match self.options.compose_mode {
            ComposeMode::PassThrough => self
                .documents
                .save(key, compose.raw_text.trim())
                .map_err(|e| StageFailure::new(StageName::Compose, e)),
            ComposeMode::Template => publish_record(&self.documents, &self.renderer, key, record)
                .map_err(|e| StageFailure::new(StageName::Compose, e)),
        }
    }

    /// Marks a stage finished in `state` and reports it.
    async fn settle<T: StageOutput>(
        &self,
        document: &str,
        state: &mut RunState,
        result: Result<T, StageFailure>,
    ) -> Result<T, StageFailure> {
        match result {
            Ok(value) => {
                let output = value.result();
                state.complete(output.stage);
                info!(stage = %output.stage, length = output.meaningful_len(), "Stage completed");
                self.events
                    .publish(&PipelineEvent::StageCompleted {
                        document: document.to_string(),
                        stage: output.stage,
                        length: output.meaningful_len(),
                    })
                    .await;
                Ok(value)
            }
            Err(failure) => Err(mark_failed(state, failure)),
        }
    }

    async fn saved(&self, document: &str, artifacts: &mut Vec<ArtifactRef>, artifact: ArtifactRef) {
        info!(
            kind = ?artifact.kind,
            path = %artifact.path.display(),
            sha256 = %artifact.sha256,
            fallback = artifact.fallback,
            "Artifact saved"
        );
        self.events
            .publish(&PipelineEvent::ArtifactSaved {
                document: document.to_string(),
                artifact: artifact.clone(),
            })
            .await;
        artifacts.push(artifact);
    }
}

fn mark_failed(state: &mut RunState, failure: StageFailure) -> StageFailure {
    state.fail(failure.stage);
    failure
}

/// A stage's value that carries the stage result it came from.
trait StageOutput {
    fn result(&self) -> &StageResult;
}

impl StageOutput for StageResult {
    fn result(&self) -> &StageResult {
        self
    }
}

impl StageOutput for (StageResult, StructuredRecord) {
    fn result(&self) -> &StageResult {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::errors::BackendError;
    use crate::events::CollectingEventSink;
    use crate::testing::{fenced_payload, sample_agents, sample_tasks, ScriptedModel, StaticTool};

    const RESEARCH: &str = "Related work: Smith 2020 measured soil carbon across three continents and found similar trends.";

    fn coordinator(model: ScriptedModel, dir: &std::path::Path) -> (Arc<ScriptedModel>, PipelineCoordinator) {
        let model = Arc::new(model);
        let layout = ResourceLayout::from_root(dir)
            .with_fallback_markdown(None)
            .with_fallback_yamls(None);
        let coordinator = PipelineCoordinator::from_layout(model.clone(), sample_agents(), sample_tasks(), &layout)
            .with_options(PipelineOptions::default().with_retry(RetryPolicy::none()));
        (model, coordinator)
    }

    fn happy_model() -> ScriptedModel {
        ScriptedModel::new()
            .with_response(StageName::Read, fenced_payload("draft gap"))
            .with_response(StageName::Review, fenced_payload("reviewed gap"))
            .with_response(StageName::Research, RESEARCH)
            .with_response(StageName::Compose, "# Article\n\nBody")
    }

    #[tokio::test]
    async fn test_document_goes_through_every_stage() {
        let dir = tempfile::tempdir().unwrap();
        let (model, coordinator) = coordinator(happy_model(), dir.path());
        let source = SourceDocument::from_path(dir.path().join("pdfs/Smith - Soil.pdf"));

        let outcome = coordinator.process_document(&source).await;

        assert!(outcome.is_success(), "{:?}", outcome.failure);
        assert_eq!(outcome.completed, StageName::ALL.to_vec());
        assert_eq!(outcome.artifacts.len(), 2);

        let record = coordinator.records().load("Smith - Soil").unwrap();
        assert_eq!(record.section_text("GAP").as_deref(), Some("reviewed gap"));
        assert_eq!(coordinator.documents().load("Smith - Soil").unwrap(), "# Article\n\nBody");

        let compose = &model.requests_for("Smith - Soil.pdf")[3];
        assert_eq!(compose.stage, StageName::Compose);
        assert_eq!(compose.context.len(), 2);
        assert!(compose.context[1].contains("Smith 2020"));
    }

    #[tokio::test]
    async fn test_read_without_payload_fails_at_read() {
        let dir = tempfile::tempdir().unwrap();
        let model = happy_model().with_response(StageName::Read, "I could not open the file.");
        let (model, coordinator) = coordinator(model, dir.path());

        let outcome = coordinator
            .process_document(&SourceDocument::from_path("paper.pdf"))
            .await;

        let failure = outcome.failure.unwrap();
        assert_eq!(failure.stage, StageName::Read);
        assert_eq!(failure.error_kind, "no_payload_found");
        assert_eq!(model.call_count(StageName::Review), 0);
        assert!(outcome.artifacts.is_empty());
    }

    #[tokio::test]
    async fn test_short_research_fails_document_but_keeps_record() {
        let dir = tempfile::tempdir().unwrap();
        let model = happy_model().with_response(StageName::Research, "Nothing found.");
        let (model, coordinator) = coordinator(model, dir.path());

        let outcome = coordinator
            .process_document(&SourceDocument::from_path("paper.pdf"))
            .await;

        let failure = outcome.failure.as_ref().unwrap();
        assert_eq!(failure.stage, StageName::Research);
        assert_eq!(failure.error_kind, "stage_insufficient_output");
        assert_eq!(outcome.completed, vec![StageName::Read, StageName::Review]);
        assert!(coordinator.records().load("paper").is_ok());
        assert!(coordinator.documents().load("paper").is_err());
        assert_eq!(model.call_count(StageName::Compose), 0);
    }

    #[tokio::test]
    async fn test_tools_are_consulted() {
        let dir = tempfile::tempdir().unwrap();
        let search = Arc::new(StaticTool::new("web_search", "Result: soil carbon review"));
        let (model, coordinator) = coordinator(happy_model(), dir.path());
        let coordinator = coordinator
            .with_document_tools(Arc::new(crate::testing::StaticToolFactory::new("PDF passage")))
            .with_search_tool(search.clone());

        let outcome = coordinator
            .process_document(&SourceDocument::from_path("paper.pdf"))
            .await;
        assert!(outcome.is_success());

        let requests = model.requests();
        let read_tool = requests[0].tool_context.as_ref().unwrap();
        assert_eq!(read_tool.text, "PDF passage");
        assert_eq!(read_tool.query, "gap, objectives, methodology, results");

        let query = &search.queries()[0];
        assert!(query.contains("reviewed gap"));
        assert!(!query.contains("```"));
    }

    #[tokio::test]
    async fn test_template_mode_renders_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let (_model, coordinator) = coordinator(happy_model(), dir.path());
        let coordinator = coordinator.with_options(
            PipelineOptions::default()
                .with_retry(RetryPolicy::none())
                .with_compose_mode(ComposeMode::Template),
        );

        let outcome = coordinator
            .process_document(&SourceDocument::from_path("Lee - Carbon.pdf"))
            .await;
        assert!(outcome.is_success());

        let text = coordinator.documents().load("Lee - Carbon").unwrap();
        assert!(text.contains("# Carbon"));
        assert!(text.contains("## The Gap\n\nreviewed gap"));
        assert!(!text.contains("# Article"));
    }

    #[tokio::test]
    async fn test_template_mode_renders_this_runs_review() {
        let dir = tempfile::tempdir().unwrap();
        let options = PipelineOptions::default()
            .with_retry(RetryPolicy::none())
            .with_compose_mode(ComposeMode::Template);
        let source = SourceDocument::from_path("Lee - Carbon.pdf");

        let (_model, first) = coordinator(happy_model(), dir.path());
        assert!(first.with_options(options.clone()).process_document(&source).await.is_success());

        let rerun = happy_model().with_response(StageName::Review, fenced_payload("revised gap"));
        let (_model, second) = coordinator(rerun, dir.path());
        let second = second.with_options(options);
        assert!(second.process_document(&source).await.is_success());

        let text = second.documents().load("Lee - Carbon").unwrap();
        assert!(text.contains("## The Gap\n\nrevised gap"));
        assert!(!text.contains("reviewed gap"));
    }

    #[tokio::test]
    async fn test_events_follow_the_stages() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(CollectingEventSink::new());
        let model = happy_model().with_failure(
            StageName::Compose,
            BackendError::Status {
                status: 400,
                body: "context too long".to_string(),
            },
        );
        let (_model, coordinator) = coordinator(model, dir.path());
        let coordinator = coordinator.with_event_sink(sink.clone());

        let summary = coordinator
            .process(&[SourceDocument::from_path("paper.pdf")])
            .await;
        assert_eq!(summary.failed, 1);

        assert_eq!(
            sink.event_types(),
            vec![
                "run.started",
                "document.started",
                "stage.completed",
                "stage.completed",
                "artifact.saved",
                "stage.completed",
                "stage.failed",
                "document.failed",
                "run.completed",
            ]
        );
        let failed = &sink.events_of_type("stage.failed")[0];
        assert_eq!(failed.1.as_ref().unwrap()["stage"], "compose");
    }
}
