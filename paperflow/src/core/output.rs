//! Raw stage output tagged with the stage that produced it.

use super::StageName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The raw text a stage returned, tagged with its producer.
///
/// The tag is set by the stage runner when the result is built; downstream
/// code dispatches on [`StageResult::stage`] and never on the role text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResult {
    /// Which stage produced this output.
    pub stage: StageName,
    /// Display role of the agent that produced it.
    pub producing_role: String,
    /// The free-form text returned by the language model.
    pub raw_text: String,
    /// When the result was produced.
    pub produced_at: DateTime<Utc>,
}

impl StageResult {
    /// Creates a new stage result stamped with the current time.
    #[must_use]
    pub fn new(stage: StageName, producing_role: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            stage,
            producing_role: producing_role.into(),
            raw_text: raw_text.into(),
            produced_at: Utc::now(),
        }
    }

    /// Number of characters in the output after trimming surrounding whitespace.
    #[must_use]
    pub fn meaningful_len(&self) -> usize {
        self.raw_text.trim().chars().count()
    }

    /// Returns true if the output is empty or whitespace only.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.raw_text.trim().is_empty()
    }

    /// Renders this result as a context block for a downstream prompt.
    #[must_use]
    pub fn as_context_block(&self) -> String {
        format!("### Output of the {} stage ({})\n{}", self.stage, self.producing_role, self.raw_text.trim())
    }

    /// Converts to a dictionary representation for event payloads.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("stage".to_string(), serde_json::json!(self.stage));
        map.insert("producing_role".to_string(), serde_json::json!(self.producing_role));
        map.insert("length".to_string(), serde_json::json!(self.meaningful_len()));
        map.insert("produced_at".to_string(), serde_json::json!(self.produced_at.to_rfc3339()));
        map
    }
}
