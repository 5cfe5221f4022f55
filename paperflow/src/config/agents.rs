//! Agent profiles (`agents.yaml`).

use super::load_yaml;
use crate::core::StageName;
use crate::errors::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Role, goal and backstory of the agent bound to one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Display role (e.g. "YAML Reviewer").
    pub role: String,
    /// What the agent is trying to achieve.
    pub goal: String,
    /// Persona text given to the model.
    #[serde(default)]
    pub backstory: String,
}

impl AgentProfile {
    /// Creates a new profile.
    #[must_use]
    pub fn new(role: impl Into<String>, goal: impl Into<String>, backstory: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
            backstory: backstory.into(),
        }
    }
}

/// All agent profiles, keyed by agent name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentsConfig {
    profiles: BTreeMap<String, AgentProfile>,
}

impl AgentsConfig {
    /// Loads and validates `agents.yaml`.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing, unparsable, or lacks a profile for
    /// any stage.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let config: Self = load_yaml(path)?;
        config.validate(path)?;
        Ok(config)
    }

    /// Adds or replaces a stage's profile.
    #[must_use]
    pub fn with_profile(mut self, stage: StageName, profile: AgentProfile) -> Self {
        self.profiles.insert(stage.agent_key().to_string(), profile);
        self
    }

    /// Returns the profile bound to a stage.
    #[must_use]
    pub fn for_stage(&self, stage: StageName) -> Option<&AgentProfile> {
        self.profiles.get(stage.agent_key())
    }

    /// Checks every stage has a profile.
    ///
    /// # Errors
    ///
    /// Returns `MissingEntry` naming the first missing agent key.
    pub fn validate(&self, source: &Path) -> Result<(), ConfigurationError> {
        for stage in StageName::ALL {
            if self.for_stage(stage).is_none() {
                return Err(ConfigurationError::missing_entry(
                    PathBuf::from(source),
                    stage.agent_key(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AGENTS: &str = r"
reader:
  role: PDF Reader
  goal: Extract the requested fields from {document}
  backstory: Meticulous research assistant.
reviewer:
  role: YAML Reviewer
  goal: Make the YAML match the template
  backstory: Strict editor.
researcher:
  role: Researcher
  goal: Find related work
composer:
  role: Writer
  goal: Write a LinkedIn article
  backstory: Science communicator.
";

    #[test]
    fn test_parse_agents() {
        let config: AgentsConfig = serde_yaml::from_str(AGENTS).unwrap();
        config.validate(Path::new("agents.yaml")).unwrap();

        let reviewer = config.for_stage(StageName::Review).unwrap();
        assert_eq!(reviewer.role, "YAML Reviewer");
        assert_eq!(config.for_stage(StageName::Research).unwrap().backstory, "");
    }

    #[test]
    fn test_missing_profile_is_reported() {
        let config = AgentsConfig::default()
            .with_profile(StageName::Read, AgentProfile::new("r", "g", "b"));

        let err = config.validate(Path::new("agents.yaml")).unwrap_err();
        match err {
            ConfigurationError::MissingEntry { entry, .. } => assert_eq!(entry, "reviewer"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agents.yaml");
        std::fs::write(&path, AGENTS).unwrap();

        let config = AgentsConfig::load(&path).unwrap();
        assert_eq!(config.for_stage(StageName::Compose).unwrap().role, "Writer");
    }
}
