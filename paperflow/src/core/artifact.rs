//! Reference to a persisted artifact.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// What kind of file an artifact is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// A structured record (YAML).
    Record,
    /// A rendered document (markdown).
    Document,
}

/// A file written by one of the stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// The kind of artifact.
    pub kind: ArtifactKind,
    /// The key the artifact was stored under.
    pub key: String,
    /// Where the artifact ended up.
    pub path: PathBuf,
    /// Hex SHA-256 of the written bytes.
    pub sha256: String,
    /// Whether the write landed in the fallback location.
    #[serde(default)]
    pub fallback: bool,
}

impl ArtifactRef {
    /// Creates a reference, hashing the bytes that were written.
    #[must_use]
    pub fn new(kind: ArtifactKind, key: impl Into<String>, path: impl AsRef<Path>, bytes: &[u8]) -> Self {
        Self {
            kind,
            key: key.into(),
            path: path.as_ref().to_path_buf(),
            sha256: hex::encode(Sha256::digest(bytes)),
            fallback: false,
        }
    }

    /// Marks the artifact as written to the fallback location.
    #[must_use]
    pub fn in_fallback(mut self) -> Self {
        self.fallback = true;
        self
    }

    /// Converts the reference to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("kind".to_string(), serde_json::json!(self.kind));
        map.insert("key".to_string(), serde_json::json!(self.key));
        map.insert("path".to_string(), serde_json::json!(self.path.display().to_string()));
        map.insert("sha256".to_string(), serde_json::json!(self.sha256));
        if self.fallback {
            map.insert("fallback".to_string(), serde_json::json!(true));
        }
        map
    }
}
