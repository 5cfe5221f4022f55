//! Rendered documents (`artigos_markdown/artigo_<key>.md`).

use super::slots::FileSlots;
use crate::core::{ArtifactKind, ArtifactRef};
use crate::errors::PersistenceError;
use std::path::{Path, PathBuf};

/// Writes final documents, one file per source document.
#[derive(Debug)]
pub struct DocumentStore {
    slots: FileSlots,
}

impl DocumentStore {
    /// File name prefix of rendered documents.
    pub const PREFIX: &'static str = "artigo_";

    /// Creates a store rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            slots: FileSlots::new(dir.into(), Self::PREFIX, "md"),
        }
    }

    /// Sets a secondary directory used when writing to the primary fails.
    #[must_use]
    pub fn with_fallback_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.slots.set_fallback_dir(dir);
        self
    }

    /// The primary directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.slots.dir()
    }

    /// Path a document with this key is written to.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.slots.path_for(key)
    }

    /// Writes the document atomically.
    ///
    /// # Errors
    ///
    /// Returns `Write` if neither location accepts the file.
    pub fn save(&self, key: &str, text: &str) -> Result<ArtifactRef, PersistenceError> {
        let written = self.slots.write(key, text.as_bytes())?;
        let artifact = ArtifactRef::new(ArtifactKind::Document, &written.key, &written.path, text.as_bytes());
        tracing::debug!(key = %written.key, path = %written.path.display(), "Saved document");
        Ok(if written.fallback { artifact.in_fallback() } else { artifact })
    }

    /// Reads a stored document.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no document exists for the key.
    pub fn load(&self, key: &str) -> Result<String, PersistenceError> {
        self.slots.read(key).map(|(_, text)| text)
    }

    /// Keys of stored documents matching a glob pattern, sorted.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPattern` for a malformed pattern.
    pub fn list(&self, pattern: &str) -> Result<Vec<String>, PersistenceError> {
        self.slots.keys(pattern)
    }
}
