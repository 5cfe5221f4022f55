//! Rendering records into markdown articles.

use super::template::{ArticleTemplate, SectionHeading};
use crate::extraction::StructuredRecord;
use std::path::Path;

/// Fills an [`ArticleTemplate`] from a [`StructuredRecord`].
#[derive(Debug, Clone, Default)]
pub struct ArticleRenderer {
    template: ArticleTemplate,
}

impl ArticleRenderer {
    /// Creates a renderer for a template.
    #[must_use]
    pub fn new(template: ArticleTemplate) -> Self {
        Self { template }
    }

    /// The template in use.
    #[must_use]
    pub fn template(&self) -> &ArticleTemplate {
        &self.template
    }

    /// Renders with the template's own section list.
    #[must_use]
    pub fn render_article(&self, record: &StructuredRecord, title: &str) -> String {
        self.render(record, title, &self.template.sections)
    }

    /// Renders `record` as markdown.
    ///
    /// Sections appear in the order of `sections`; a section whose key is
    /// absent from the record, or whose text is blank, is left out together
    /// with its heading.
    #[must_use]
    pub fn render(&self, record: &StructuredRecord, title: &str, sections: &[SectionHeading]) -> String {
        let template = &self.template;
        let mut lines: Vec<String> = Vec::new();

        lines.push(template.banner.clone());
        lines.push(match &template.title {
            Some(suffix) => format!("# {title}: {suffix}"),
            None => format!("# {title}"),
        });
        lines.push("\n---\n".to_string());

        if let Some(hook) = &template.hook {
            lines.push(hook.clone());
            lines.push("\n".to_string());
        }

        for section in sections {
            if let Some(text) = record.section_text(&section.key) {
                lines.push(format!("## {}", section.heading));
                lines.push(format!("\n{text}\n"));
            }
        }

        lines.push(format!("\n## {}", template.call_to_action_heading));
        if let Some(question) = &template.call_to_action {
            lines.push(format!("\n{question}"));
        }
        lines.push(format!("\n{}", template.closing));

        if let Some(hashtags) = &template.hashtags {
            lines.push("\n---\n".to_string());
            lines.push(hashtags.clone());
        }

        lines.join("\n")
    }
}

/// Article title from a document name of the form `Author - Title.pdf`.
///
/// Returns the text after the first `" - "` of the name (without a `.pdf`
/// extension), or the whole name when there is no separator. Storage keys
/// work too, since they are the sanitized stem.
#[must_use]
pub fn derive_title(identifier: &str) -> String {
    let path = Path::new(identifier);
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    let stem = if is_pdf {
        path.file_stem().and_then(|s| s.to_str()).unwrap_or(identifier)
    } else {
        identifier
    };
    match stem.split_once(" - ") {
        Some((_, title)) if !title.trim().is_empty() => title.trim().to_string(),
        _ => stem.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(text: &str) -> StructuredRecord {
        StructuredRecord::from_yaml(text, &["ARTICLE".to_string()]).unwrap()
    }

    fn template() -> ArticleTemplate {
        ArticleTemplate::default()
            .with_title("Ciência em foco")
            .with_hook("Você já se perguntou?")
            .with_call_to_action("O que você acha?")
            .with_hashtags("#ciencia #pesquisa")
    }

    #[test]
    fn test_full_render() {
        let rec = record("ARTICLE:\n  - GAP: Falta de dados\n    RESULTS: Melhorou 10%\n");
        let sections = vec![
            SectionHeading::new("gap", "O Problema"),
            SectionHeading::new("results", "Resultados"),
        ];
        let text = ArticleRenderer::new(template()).render(&rec, "Deep Nets", &sections);

        let expected = [
            "🔬 #CiênciaNaPrática",
            "# Deep Nets: Ciência em foco",
            "\n---\n",
            "Você já se perguntou?",
            "\n",
            "## O Problema",
            "\nFalta de dados\n",
            "## Resultados",
            "\nMelhorou 10%\n",
            "\n## Sua vez de compartilhar! 💭",
            "\nO que você acha?",
            "\nCompartilhe suas ideias nos comentários! 👇",
            "\n---\n",
            "#ciencia #pesquisa",
        ]
        .join("\n");
        assert_eq!(text, expected);
    }

    #[test]
    fn test_missing_sections_are_omitted() {
        let rec = record("ARTICLE:\n  - GAP: Falta de dados\n    OBJECTIVES: ''\n");
        let text = ArticleRenderer::new(template()).render_article(&rec, "Deep Nets");

        assert!(text.contains("## The Gap"));
        assert!(!text.contains("## Objectives"));
        assert!(!text.contains("## Methodology"));
        assert!(!text.contains("## Results"));
    }

    #[test]
    fn test_section_order_follows_mapping() {
        let rec = record("ARTICLE:\n  - GAP: g\n    RESULTS: r\n");
        let sections = vec![SectionHeading::new("results", "R"), SectionHeading::new("gap", "G")];
        let text = ArticleRenderer::default().render(&rec, "T", &sections);

        assert!(text.find("## R").unwrap() < text.find("## G").unwrap());
        assert!(text.starts_with("🔬 #CiênciaNaPrática\n# T\n"));
    }

    #[test]
    fn test_derive_title() {
        assert_eq!(derive_title("Smith - Deep Nets.pdf"), "Deep Nets");
        assert_eq!(derive_title("Smith - Deep Nets - Part 2.pdf"), "Deep Nets - Part 2");
        assert_eq!(derive_title("untitled.pdf"), "untitled");
        assert_eq!(derive_title("Smith - .pdf"), "Smith -");
        assert_eq!(derive_title("Lee - Soil v1.2 results"), "Soil v1.2 results");
    }
}
