//! Resource directories and credentials.

use crate::errors::ConfigurationError;
use std::fmt;
use std::path::{Path, PathBuf};

/// Relative directory holding the fallback locations.
const FALLBACK_ROOT: &str = "paperflow-output";

/// Where inputs are read from and outputs are written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLayout {
    /// Resources root.
    pub root: PathBuf,
    /// Input PDFs.
    pub pdfs: PathBuf,
    /// Persisted structured records.
    pub yamls: PathBuf,
    /// Rendered documents.
    pub markdown: PathBuf,
    /// Secondary location for documents when the primary write fails.
    pub fallback_markdown: Option<PathBuf>,
    /// Secondary location for records when the primary write fails.
    pub fallback_yamls: Option<PathBuf>,
}

impl ResourceLayout {
    /// Builds the conventional layout under a resources root.
    #[must_use]
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            pdfs: root.join("pdfs"),
            yamls: root.join("yamls"),
            markdown: root.join("artigos_markdown"),
            fallback_markdown: Some(PathBuf::from(FALLBACK_ROOT).join("artigos_markdown")),
            fallback_yamls: Some(PathBuf::from(FALLBACK_ROOT).join("yamls")),
            root,
        }
    }

    /// Sets the fallback document location.
    #[must_use]
    pub fn with_fallback_markdown(mut self, path: Option<PathBuf>) -> Self {
        self.fallback_markdown = path;
        self
    }

    /// Sets the fallback record location.
    #[must_use]
    pub fn with_fallback_yamls(mut self, path: Option<PathBuf>) -> Self {
        self.fallback_yamls = path;
        self
    }

    /// Checks that the input directory exists.
    ///
    /// # Errors
    ///
    /// Returns `MissingDirectory` if the PDF directory is absent.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        require_dir(&self.pdfs)
    }
}

fn require_dir(path: &Path) -> Result<(), ConfigurationError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(ConfigurationError::MissingDirectory {
            path: path.to_path_buf(),
        })
    }
}

/// API credentials for the external collaborators.
#[derive(Clone)]
pub struct Credentials {
    /// Key for the language-model backend.
    pub llm_api_key: String,
    /// Key for the web-search tool, if any.
    pub search_api_key: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("llm_api_key", &"<redacted>")
            .field("has_search_api_key", &self.search_api_key.is_some())
            .finish()
    }
}

impl Credentials {
    /// Validates and builds credentials.
    ///
    /// # Errors
    ///
    /// Returns `MissingCredential` when the language-model key is absent or blank.
    pub fn new(llm_api_key: Option<String>, search_api_key: Option<String>) -> Result<Self, ConfigurationError> {
        let llm_api_key = llm_api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ConfigurationError::missing_credential("OPENAI_API_KEY"))?;

        Ok(Self {
            llm_api_key,
            search_api_key: search_api_key
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
        })
    }
}
