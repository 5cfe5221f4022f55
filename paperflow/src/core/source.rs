//! Source documents.

use crate::errors::ConfigurationError;
use crate::store::document_key;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One input PDF.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Original file name, e.g. `Smith - Deep Nets.pdf`.
    pub identifier: String,
    /// Where the content is read from.
    pub path: PathBuf,
}

impl SourceDocument {
    /// Creates a document from a path; the identifier is the file name.
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let identifier = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { identifier, path }
    }

    /// Storage key used for the document's artifacts.
    #[must_use]
    pub fn key(&self) -> String {
        document_key(&self.identifier)
    }

    /// Lists `*.pdf` files (case-insensitive extension) in `dir`, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns `MissingDirectory` if `dir` cannot be read.
    pub fn discover(dir: &Path) -> Result<Vec<Self>, ConfigurationError> {
        let entries = std::fs::read_dir(dir).map_err(|_| ConfigurationError::MissingDirectory {
            path: dir.to_path_buf(),
        })?;

        let mut documents: Vec<Self> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
            })
            .map(Self::from_path)
            .collect();
        documents.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        Ok(documents)
    }
}
