//! Content tools consulted by stages.
//!
//! The read stage searches the source PDF; the research stage searches the
//! web. Both are "query in, text out" capabilities behind [`ContentTool`].

mod relevance;

#[cfg(feature = "pdf")]
mod pdf;
#[cfg(feature = "websearch")]
mod search;

pub use relevance::{leading_words, rank_passages, relevance_score, split_passages};

#[cfg(feature = "pdf")]
pub use pdf::{PdfSearchTool, PdfToolFactory};
#[cfg(feature = "websearch")]
pub use search::SerperSearchTool;

use crate::core::SourceDocument;
use crate::errors::ToolError;
use async_trait::async_trait;
use std::sync::Arc;

/// A tool that answers a text query with text.
#[async_trait]
pub trait ContentTool: Send + Sync {
    /// Tool name for logs and prompts.
    fn name(&self) -> &str;

    /// Runs a query.
    async fn query(&self, query: &str) -> Result<String, ToolError>;
}

/// Creates the per-document tool used by the read stage.
pub trait DocumentToolFactory: Send + Sync {
    /// Opens a tool over one source document.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the document cannot be opened.
    fn open(&self, document: &SourceDocument) -> Result<Arc<dyn ContentTool>, ToolError>;
}
