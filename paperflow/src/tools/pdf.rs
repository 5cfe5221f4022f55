//! Passage search over a PDF's text.

use super::relevance::{rank_passages, split_passages};
use super::{ContentTool, DocumentToolFactory};
use crate::core::SourceDocument;
use crate::errors::ToolError;
use async_trait::async_trait;
use pdf_oxide::document::PdfDocument;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

const NAME: &str = "pdf_search";

/// Searches the text of one PDF for passages relevant to a query.
///
/// Text is extracted on the first query (on the blocking pool) and cached.
#[derive(Debug)]
pub struct PdfSearchTool {
    path: PathBuf,
    max_passages: usize,
    passage_chars: usize,
    passages: OnceCell<Vec<String>>,
}

impl PdfSearchTool {
    /// Creates a tool over the PDF at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_passages: 8,
            passage_chars: 1200,
            passages: OnceCell::new(),
        }
    }

    /// Sets how many passages a query returns.
    #[must_use]
    pub fn with_max_passages(mut self, max_passages: usize) -> Self {
        self.max_passages = max_passages.max(1);
        self
    }

    /// Sets the approximate passage size in characters.
    #[must_use]
    pub fn with_passage_chars(mut self, passage_chars: usize) -> Self {
        self.passage_chars = passage_chars;
        self
    }

    async fn passages(&self) -> Result<&[String], ToolError> {
        self.passages
            .get_or_try_init(|| async {
                let path = self.path.clone();
                let passage_chars = self.passage_chars;
                tokio::task::spawn_blocking(move || extract_passages(&path, passage_chars))
                    .await
                    .map_err(|err| ToolError::execution_failed(NAME, err.to_string()))?
            })
            .await
            .map(Vec::as_slice)
    }
}

fn extract_passages(path: &Path, passage_chars: usize) -> Result<Vec<String>, ToolError> {
    let mut document = PdfDocument::open(path)
        .map_err(|err| ToolError::unavailable(NAME, format!("{}: {err}", path.display())))?;
    let pages = document
        .page_count()
        .map_err(|err| ToolError::execution_failed(NAME, err.to_string()))?;

    let mut passages = Vec::new();
    for page in 0..pages {
        match document.extract_text(page) {
            Ok(text) => passages.extend(split_passages(&text, passage_chars)),
            Err(err) => tracing::warn!(path = %path.display(), page, error = %err, "Skipping unreadable page"),
        }
    }

    if passages.is_empty() {
        return Err(ToolError::execution_failed(
            NAME,
            format!("no extractable text in {}", path.display()),
        ));
    }
    tracing::debug!(path = %path.display(), pages, passages = passages.len(), "Indexed PDF");
    Ok(passages)
}

#[async_trait]
impl ContentTool for PdfSearchTool {
    fn name(&self) -> &str {
        NAME
    }

    async fn query(&self, query: &str) -> Result<String, ToolError> {
        let passages = self.passages().await?;
        Ok(rank_passages(passages, query, self.max_passages).join("\n\n---\n\n"))
    }
}

/// Opens a [`PdfSearchTool`] per source document.
#[derive(Debug, Clone)]
pub struct PdfToolFactory {
    max_passages: usize,
}

impl Default for PdfToolFactory {
    fn default() -> Self {
        Self { max_passages: 8 }
    }
}

impl PdfToolFactory {
    /// Sets how many passages each query returns.
    #[must_use]
    pub fn with_max_passages(mut self, max_passages: usize) -> Self {
        self.max_passages = max_passages;
        self
    }
}

impl DocumentToolFactory for PdfToolFactory {
    fn open(&self, document: &SourceDocument) -> Result<Arc<dyn ContentTool>, ToolError> {
        if !document.path.is_file() {
            return Err(ToolError::unavailable(
                NAME,
                format!("{} is not a readable file", document.path.display()),
            ));
        }
        Ok(Arc::new(
            PdfSearchTool::new(&document.path).with_max_passages(self.max_passages),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let doc = SourceDocument::from_path(dir.path().join("absent.pdf"));
        let err = PdfToolFactory::default().open(&doc).err().unwrap();
        assert!(matches!(err, ToolError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_invalid_pdf_fails_query() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();

        let tool = PdfToolFactory::default()
            .open(&SourceDocument::from_path(&path))
            .unwrap();
        assert_eq!(tool.name(), "pdf_search");
        assert!(tool.query("methods").await.is_err());
    }
}
