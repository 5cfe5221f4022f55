//! Task definitions (`tasks.yaml`).

use super::load_yaml;
use crate::core::StageName;
use crate::errors::ConfigurationError;
use crate::render::ArticleTemplate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Placeholder for the document name used by hand-written read templates.
const LEGACY_DOCUMENT_PLACEHOLDER: &str = "nome do arquivo.pdf";

/// Definition of the task one stage performs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// What the agent is asked to do. May contain `{input}` placeholders.
    pub description: String,
    /// What the output should look like.
    #[serde(default)]
    pub expected_output: String,
    /// Optional file the stage output is written to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    /// Free-form input parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, String>,
    /// Article template (compose task only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article: Option<ArticleTemplate>,
}

impl TaskSpec {
    /// Creates a task with a description and expected output.
    #[must_use]
    pub fn new(description: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            expected_output: expected_output.into(),
            ..Self::default()
        }
    }

    /// Adds an input parameter.
    #[must_use]
    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.inputs.insert(key.into(), value.into());
        self
    }

    /// Sets the article template.
    #[must_use]
    pub fn with_article(mut self, article: ArticleTemplate) -> Self {
        self.article = Some(article);
        self
    }
}

/// Task definitions for all stages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TasksConfig {
    /// The read task.
    #[serde(default)]
    pub read: Option<TaskSpec>,
    /// The review task.
    #[serde(default)]
    pub review: Option<TaskSpec>,
    /// The research task.
    #[serde(default)]
    pub research: Option<TaskSpec>,
    /// The compose task.
    #[serde(default)]
    pub compose: Option<TaskSpec>,
}

impl TasksConfig {
    /// Loads and validates `tasks.yaml`.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing, unparsable, or lacks a task for any stage.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let config: Self = load_yaml(path)?;
        config.validate(path)?;
        Ok(config)
    }

    /// Sets a stage's task.
    #[must_use]
    pub fn with_task(mut self, stage: StageName, task: TaskSpec) -> Self {
        *self.slot_mut(stage) = Some(task);
        self
    }

    /// Returns the task bound to a stage.
    #[must_use]
    pub fn for_stage(&self, stage: StageName) -> Option<&TaskSpec> {
        match stage {
            StageName::Read => self.read.as_ref(),
            StageName::Review => self.review.as_ref(),
            StageName::Research => self.research.as_ref(),
            StageName::Compose => self.compose.as_ref(),
        }
    }

    fn slot_mut(&mut self, stage: StageName) -> &mut Option<TaskSpec> {
        match stage {
            StageName::Read => &mut self.read,
            StageName::Review => &mut self.review,
            StageName::Research => &mut self.research,
            StageName::Compose => &mut self.compose,
        }
    }

    /// Checks every stage has a task.
    ///
    /// # Errors
    ///
    /// Returns `MissingEntry` naming the first missing task.
    pub fn validate(&self, source: &Path) -> Result<(), ConfigurationError> {
        for stage in StageName::ALL {
            if self.for_stage(stage).is_none() {
                return Err(ConfigurationError::missing_entry(PathBuf::from(source), stage.as_str()));
            }
        }
        Ok(())
    }

    /// The article template of the compose task, if configured.
    #[must_use]
    pub fn article(&self) -> Option<&ArticleTemplate> {
        self.compose.as_ref().and_then(|task| task.article.as_ref())
    }

    /// Builds the per-document inputs passed to every stage.
    #[must_use]
    pub fn document_inputs(&self, document: &str) -> BTreeMap<String, String> {
        let read = self.read.as_ref().map(ReadInputs::from_task).unwrap_or_default();
        read.into_inputs(document)
    }
}

/// Parameters of the read task: what to extract and how.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadInputs {
    /// The extraction requests; also used as the PDF tool query.
    pub requests: String,
    /// The output template the reader must follow.
    pub template: String,
    /// Quality controls.
    pub controls: String,
    /// Constraints on the output.
    pub constraints: String,
}

impl ReadInputs {
    /// Pulls the known parameters out of the read task's inputs.
    #[must_use]
    pub fn from_task(task: &TaskSpec) -> Self {
        let get = |key: &str| task.inputs.get(key).cloned().unwrap_or_default();
        Self {
            requests: get("requests"),
            template: get("template"),
            controls: get("controls"),
            constraints: get("constraints"),
        }
    }

    /// Flattens into the input map, filling the document name into the template.
    #[must_use]
    pub fn into_inputs(self, document: &str) -> BTreeMap<String, String> {
        let template = self
            .template
            .replace(LEGACY_DOCUMENT_PLACEHOLDER, document)
            .replace("{document}", document);

        let mut inputs = BTreeMap::new();
        inputs.insert("document".to_string(), document.to_string());
        inputs.insert("requests".to_string(), self.requests);
        inputs.insert("template".to_string(), template);
        inputs.insert("controls".to_string(), self.controls);
        inputs.insert("constraints".to_string(), self.constraints);
        inputs
    }
}

/// Replaces `{key}` placeholders with input values. Unknown placeholders
/// are left untouched.
#[must_use]
pub fn interpolate(text: &str, inputs: &BTreeMap<String, String>) -> String {
    let mut out = text.to_string();
    for (key, value) in inputs {
        let placeholder = format!("{{{key}}}");
        if out.contains(&placeholder) {
            out = out.replace(&placeholder, value);
        }
    }
    out
}
