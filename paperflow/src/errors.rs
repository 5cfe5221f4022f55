//! Error types for paperflow.
//!
//! The taxonomy has one fatal class, [`ConfigurationError`], which aborts a
//! run before any document is touched. Every other class is recoverable at
//! the document boundary: the coordinator records it against the document
//! and moves on to the next one.

use crate::core::StageName;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for paperflow operations.
#[derive(Debug, Error)]
pub enum PaperflowError {
    /// Fatal pre-flight configuration problem.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// A language-model or tool call failed.
    #[error("{0}")]
    StageInvocation(#[from] StageInvocationError),

    /// A stage's output did not contain a valid structured payload.
    #[error("{0}")]
    Extraction(#[from] ExtractionError),

    /// Reading or writing an artifact failed.
    #[error("{0}")]
    Persistence(#[from] PersistenceError),
}

impl PaperflowError {
    /// Stable snake-case tag used in log lines and events.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(e) => e.kind(),
            Self::StageInvocation(e) => e.kind(),
            Self::Extraction(e) => e.kind(),
            Self::Persistence(e) => e.kind(),
        }
    }

    /// Returns true if the error must abort the whole run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("kind".to_string(), serde_json::json!(self.kind()));
        map.insert("fatal".to_string(), serde_json::json!(self.is_fatal()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

/// Fatal configuration problems detected before processing starts.
#[derive(Debug, Clone, Error)]
pub enum ConfigurationError {
    /// A configuration file does not exist.
    #[error("Configuration file not found: {}", path.display())]
    MissingFile {
        /// The expected path.
        path: PathBuf,
    },

    /// A configuration file exists but could not be read or parsed.
    #[error("Invalid configuration file {}: {reason}", path.display())]
    InvalidFile {
        /// The offending path.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// A required entry is absent from an otherwise valid file.
    #[error("Missing configuration entry '{entry}' in {}", path.display())]
    MissingEntry {
        /// The file that should contain the entry.
        path: PathBuf,
        /// The missing key.
        entry: String,
    },

    /// A required credential was not provided.
    #[error("Missing credential: {name}")]
    MissingCredential {
        /// Name of the credential (environment variable).
        name: String,
    },

    /// A required directory does not exist.
    #[error("Required directory not found: {}", path.display())]
    MissingDirectory {
        /// The expected directory.
        path: PathBuf,
    },

    /// An option value is out of range.
    #[error("Invalid option '{option}': {reason}")]
    InvalidOption {
        /// The option name.
        option: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigurationError {
    /// Creates an invalid file error.
    #[must_use]
    pub fn invalid_file(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a missing entry error.
    #[must_use]
    pub fn missing_entry(path: impl Into<PathBuf>, entry: impl Into<String>) -> Self {
        Self::MissingEntry {
            path: path.into(),
            entry: entry.into(),
        }
    }

    /// Creates a missing credential error.
    #[must_use]
    pub fn missing_credential(name: impl Into<String>) -> Self {
        Self::MissingCredential { name: name.into() }
    }

    /// Creates an invalid option error.
    #[must_use]
    pub fn invalid_option(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            option: option.into(),
            reason: reason.into(),
        }
    }

    /// Stable snake-case tag.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingFile { .. } => "config_missing_file",
            Self::InvalidFile { .. } => "config_invalid_file",
            Self::MissingEntry { .. } => "config_missing_entry",
            Self::MissingCredential { .. } => "config_missing_credential",
            Self::MissingDirectory { .. } => "config_missing_directory",
            Self::InvalidOption { .. } => "config_invalid_option",
        }
    }
}

/// A stage could not be run to completion.
#[derive(Debug, Clone, Error)]
pub enum StageInvocationError {
    /// The language-model backend failed.
    #[error("Stage {stage}: backend call failed: {message}")]
    Backend {
        /// The stage being run.
        stage: StageName,
        /// Backend error description.
        message: String,
        /// Whether retrying might help.
        transient: bool,
    },

    /// A tool attached to the stage failed.
    #[error("Stage {stage}: tool '{tool}' failed: {message}")]
    Tool {
        /// The stage being run.
        stage: StageName,
        /// The tool name.
        tool: String,
        /// Tool error description.
        message: String,
    },

    /// The stage did not finish within its time budget.
    #[error("Stage {stage} timed out after {seconds}s")]
    Timeout {
        /// The stage being run.
        stage: StageName,
        /// The configured timeout in seconds.
        seconds: f64,
    },

    /// The stage finished but its output is too short to be useful.
    #[error("Stage {stage} produced {length} characters, need more than {minimum}")]
    InsufficientOutput {
        /// The stage being run.
        stage: StageName,
        /// Characters produced.
        length: usize,
        /// Minimum characters required.
        minimum: usize,
    },

    /// A stage was asked to run without its agent or task definition.
    #[error("Stage {stage}: no {what} configured")]
    NotConfigured {
        /// The stage being run.
        stage: StageName,
        /// What is missing (agent or task).
        what: String,
    },
}

impl StageInvocationError {
    /// The stage the error belongs to.
    #[must_use]
    pub fn stage(&self) -> StageName {
        match self {
            Self::Backend { stage, .. }
            | Self::Tool { stage, .. }
            | Self::Timeout { stage, .. }
            | Self::InsufficientOutput { stage, .. }
            | Self::NotConfigured { stage, .. } => *stage,
        }
    }

    /// Returns true if retrying the call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Backend { transient, .. } => *transient,
            Self::Timeout { .. }
            | Self::Tool { .. }
            | Self::InsufficientOutput { .. }
            | Self::NotConfigured { .. } => false,
        }
    }

    /// Stable snake-case tag.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Backend { .. } => "stage_backend",
            Self::Tool { .. } => "stage_tool",
            Self::Timeout { .. } => "stage_timeout",
            Self::InsufficientOutput { .. } => "stage_insufficient_output",
            Self::NotConfigured { .. } => "stage_not_configured",
        }
    }
}

/// The reason a structured payload could not be extracted.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The text does not contain the mandatory marker.
    #[error("No structured payload found (expected one of: {})", markers.join(", "))]
    NoPayloadFound {
        /// The markers that were searched for.
        markers: Vec<String>,
    },

    /// The marker was found but the slice does not parse.
    #[error("Malformed payload: {source}")]
    MalformedPayload {
        /// The underlying parse error.
        #[source]
        source: serde_yaml::Error,
    },

    /// The payload parses but does not have the expected shape.
    #[error("Payload schema violation: {reason}")]
    SchemaViolation {
        /// What is wrong with the shape.
        reason: String,
    },
}

impl ExtractionError {
    /// Creates a schema violation error.
    #[must_use]
    pub fn schema(reason: impl Into<String>) -> Self {
        Self::SchemaViolation { reason: reason.into() }
    }

    /// Stable snake-case tag.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoPayloadFound { .. } => "no_payload_found",
            Self::MalformedPayload { .. } => "malformed_payload",
            Self::SchemaViolation { .. } => "schema_violation",
        }
    }
}

/// Reading or writing a persisted artifact failed.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Writing failed in the primary and (if configured) the fallback location.
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        /// The last path attempted.
        path: PathBuf,
        /// The IO error.
        #[source]
        source: std::io::Error,
    },

    /// Reading a file failed.
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        /// The path read.
        path: PathBuf,
        /// The IO error.
        #[source]
        source: std::io::Error,
    },

    /// No artifact is stored under the key.
    #[error("No record stored under key '{key}'")]
    NotFound {
        /// The requested key.
        key: String,
    },

    /// The artifact could not be encoded or decoded.
    #[error("Codec error for {}: {reason}", path.display())]
    Codec {
        /// The path involved.
        path: PathBuf,
        /// Codec error description.
        reason: String,
    },

    /// A key pattern is not a valid glob.
    #[error("Invalid key pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern given.
        pattern: String,
        /// Parser error.
        reason: String,
    },
}

impl PersistenceError {
    /// Creates a codec error.
    #[must_use]
    pub fn codec(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Codec {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Stable snake-case tag.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Write { .. } => "persistence_write",
            Self::Read { .. } => "persistence_read",
            Self::NotFound { .. } => "persistence_not_found",
            Self::Codec { .. } => "persistence_codec",
            Self::InvalidPattern { .. } => "persistence_invalid_pattern",
        }
    }
}

/// Errors raised by content tools (PDF search, web search).
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum ToolError {
    /// The tool could not be constructed for its input.
    #[error("Tool '{name}' unavailable: {reason}")]
    Unavailable {
        /// The tool name.
        name: String,
        /// The reason.
        reason: String,
    },

    /// Tool execution failed.
    #[error("Tool execution failed: {name} - {reason}")]
    ExecutionFailed {
        /// The tool name.
        name: String,
        /// The reason for failure.
        reason: String,
    },
}

impl ToolError {
    /// Creates an unavailable error.
    #[must_use]
    pub fn unavailable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates an execution failed error.
    #[must_use]
    pub fn execution_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// The tool that raised the error.
    #[must_use]
    pub fn tool_name(&self) -> &str {
        match self {
            Self::Unavailable { name, .. } | Self::ExecutionFailed { name, .. } => name,
        }
    }

    /// Attaches the stage the tool was serving.
    #[must_use]
    pub fn for_stage(self, stage: StageName) -> StageInvocationError {
        StageInvocationError::Tool {
            stage,
            tool: self.tool_name().to_string(),
            message: self.to_string(),
        }
    }
}

/// Errors raised by a language-model backend.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The request never got a response.
    #[error("Request failed: {message}")]
    Transport {
        /// Transport error description.
        message: String,
    },

    /// The backend answered with a non-success status.
    #[error("Backend returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The response could not be understood.
    #[error("Invalid backend response: {reason}")]
    InvalidResponse {
        /// What was wrong with it.
        reason: String,
    },
}

impl BackendError {
    /// Returns true for rate limiting, server errors and transport failures.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidResponse { .. } => false,
        }
    }

    /// Attaches the stage the call was made for.
    #[must_use]
    pub fn for_stage(self, stage: StageName) -> StageInvocationError {
        StageInvocationError::Backend {
            stage,
            transient: self.is_transient(),
            message: self.to_string(),
        }
    }
}

/// A failure pinned to the stage where it happened.
#[derive(Debug, Error)]
#[error("{stage}: {error}")]
pub struct StageFailure {
    /// The stage that failed.
    pub stage: StageName,
    /// What went wrong.
    #[source]
    pub error: PaperflowError,
}

impl StageFailure {
    /// Creates a stage failure.
    pub fn new(stage: StageName, error: impl Into<PaperflowError>) -> Self {
        Self {
            stage,
            error: error.into(),
        }
    }

    /// Stable tag of the underlying error.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.error.kind()
    }
}

impl From<StageInvocationError> for StageFailure {
    fn from(err: StageInvocationError) -> Self {
        Self::new(err.stage(), err)
    }
}
