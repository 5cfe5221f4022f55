//! Run configuration.
//!
//! Everything a run needs is assembled once at startup into explicit values
//! and handed to the coordinator by reference:
//! - Agent profiles and task definitions loaded from YAML
//! - The resource directory layout
//! - Credentials
//! - Pipeline options (timeouts, concurrency, extraction and output modes)

mod agents;
mod layout;
mod options;
mod tasks;

pub use agents::{AgentProfile, AgentsConfig};
pub use layout::{Credentials, ResourceLayout};
pub use options::{ComposeMode, PipelineOptions, RetryPolicy};
pub use tasks::{interpolate, ReadInputs, TaskSpec, TasksConfig};

use crate::errors::ConfigurationError;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Reads and parses a YAML configuration file.
///
/// # Errors
///
/// Returns `MissingFile` when the path does not exist and `InvalidFile` when
/// it cannot be read or does not match `T`.
pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigurationError> {
    if !path.is_file() {
        return Err(ConfigurationError::MissingFile {
            path: path.to_path_buf(),
        });
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| ConfigurationError::invalid_file(path, e.to_string()))?;

    serde_yaml::from_str(&contents).map_err(|e| ConfigurationError::invalid_file(path, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_load_yaml_missing_file() {
        let err = load_yaml::<HashMap<String, String>>(Path::new("/nonexistent/agents.yaml")).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingFile { .. }));
    }

    #[test]
    fn test_load_yaml_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "key: [unclosed").unwrap();

        let err = load_yaml::<HashMap<String, String>>(&path).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidFile { .. }));
    }
}
