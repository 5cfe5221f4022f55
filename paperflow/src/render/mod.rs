//! Markdown article rendering from structured records.

mod article;
mod template;

pub use article::{derive_title, ArticleRenderer};
pub use template::{ArticleTemplate, SectionHeading};
