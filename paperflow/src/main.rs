//! Paperflow CLI
//!
//! Runs the read, review, research and compose stages over every PDF in the
//! resources directory, or re-renders articles from stored records.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use paperflow::backend::OpenAiClient;
use paperflow::config::{AgentsConfig, ComposeMode, Credentials, PipelineOptions, ResourceLayout, TasksConfig};
use paperflow::core::SourceDocument;
use paperflow::errors::ConfigurationError;
use paperflow::events::LoggingEventSink;
use paperflow::extraction::SliceBoundary;
use paperflow::pipeline::{render_records, PipelineCoordinator, ProcessingSummary};
use paperflow::render::ArticleRenderer;
use paperflow::store::{DocumentStore, RecordStore};
use paperflow::tools::{PdfToolFactory, SerperSearchTool};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// How the final article is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ComposeArg {
    /// Write the compose stage's markdown as is
    PassThrough,
    /// Render the stored record through the article template
    Template,
}

impl From<ComposeArg> for ComposeMode {
    fn from(arg: ComposeArg) -> Self {
        match arg {
            ComposeArg::PassThrough => Self::PassThrough,
            ComposeArg::Template => Self::Template,
        }
    }
}

#[derive(Parser)]
#[command(name = "paperflow")]
#[command(about = "Turn scientific-article PDFs into structured records and articles")]
struct Args {
    /// Resources root holding pdfs/, yamls/ and artigos_markdown/
    #[arg(long, default_value = "resources")]
    resources: PathBuf,

    /// Directory holding agents.yaml and tasks.yaml
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,

    /// Chat model name
    #[arg(long, default_value = paperflow::backend::DEFAULT_MODEL)]
    model: String,

    /// Sampling temperature
    #[arg(long, default_value = "0.2")]
    temperature: f64,

    /// OpenAI-compatible API base URL
    #[arg(long, default_value = paperflow::backend::DEFAULT_API_BASE)]
    api_base: String,

    /// Documents processed at the same time
    #[arg(long, default_value = "1")]
    concurrency: usize,

    /// Time budget of one stage call, in seconds
    #[arg(long, default_value = "300")]
    stage_timeout: u64,

    /// How the final article is produced
    #[arg(long, value_enum, default_value = "pass-through")]
    compose_mode: ComposeArg,

    /// Where an extracted payload ends: fenced, end-of-text or top-level
    #[arg(long, default_value = "fenced", value_parser = parse_boundary)]
    slice_boundary: SliceBoundary,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Language-model API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Serper web-search API key
    #[arg(long, env = "SERPER_API_KEY", hide_env_values = true)]
    serper_api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process every PDF through all stages
    Run,
    /// Render articles from the stored records
    Render {
        /// Glob over record keys
        #[arg(long, default_value = "*")]
        pattern: String,
    },
}

fn parse_boundary(value: &str) -> Result<SliceBoundary, String> {
    SliceBoundary::from_cli(value).ok_or_else(|| format!("unknown slice boundary '{value}'"))
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("paperflow=info"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.json_logs);

    match run(args).await {
        Ok(summary) => report(&summary),
        Err(err) if err.downcast_ref::<ConfigurationError>().is_some() => {
            error!(error = %err, "Configuration error");
            ExitCode::from(2)
        }
        Err(err) => {
            error!(error = ?err, "Run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ProcessingSummary> {
    let layout = ResourceLayout::from_root(&args.resources);
    let tasks = TasksConfig::load(&args.config_dir.join("tasks.yaml"))?;

    match args.command {
        Command::Render { pattern } => {
            let records = RecordStore::new(&layout.yamls).with_fallback_dir(layout.fallback_yamls.clone());
            let documents =
                DocumentStore::new(&layout.markdown).with_fallback_dir(layout.fallback_markdown.clone());
            let renderer = ArticleRenderer::new(tasks.article().cloned().unwrap_or_default());
            render_records(&records, &documents, &renderer, &pattern).context("listing stored records")
        }
        Command::Run => {
            let agents = AgentsConfig::load(&args.config_dir.join("agents.yaml"))?;
            let credentials = Credentials::new(args.openai_api_key, args.serper_api_key)?;
            layout.validate()?;

            let options = PipelineOptions::default()
                .with_concurrency(args.concurrency)
                .with_stage_timeout(Duration::from_secs(args.stage_timeout))
                .with_compose_mode(args.compose_mode.into())
                .with_slice_boundary(args.slice_boundary);
            options.validate()?;

            let model = OpenAiClient::new(credentials.llm_api_key.clone())
                .with_model(args.model)
                .with_api_base(args.api_base)
                .with_temperature(args.temperature);
            info!(model = model.model(), "Language model configured");

            let mut coordinator = PipelineCoordinator::from_layout(Arc::new(model), agents, tasks, &layout)
                .with_options(options)
                .with_document_tools(Arc::new(PdfToolFactory::default()))
                .with_event_sink(Arc::new(LoggingEventSink::default()));
            match &credentials.search_api_key {
                Some(key) => coordinator = coordinator.with_search_tool(Arc::new(SerperSearchTool::new(key.clone()))),
                None => warn!("SERPER_API_KEY not set, research runs without web search"),
            }

            let documents = SourceDocument::discover(&layout.pdfs)?;
            if documents.is_empty() {
                warn!(dir = %layout.pdfs.display(), "No PDF files found");
            }
            Ok(coordinator.process(&documents).await)
        }
    }
}

fn report(summary: &ProcessingSummary) -> ExitCode {
    for outcome in summary.failures() {
        if let Some(failure) = &outcome.failure {
            warn!(
                document = %outcome.document,
                stage = %failure.stage,
                error_kind = %failure.error_kind,
                "Not completed"
            );
        }
    }
    info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        "Finished: {} succeeded, {} failed",
        summary.succeeded,
        summary.failed
    );

    if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
