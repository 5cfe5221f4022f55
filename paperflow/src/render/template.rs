//! Article template configuration.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A section of the article: which record key it shows and under what heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeading {
    /// Record key, matched case-insensitively (`gap` matches `GAP`).
    pub key: String,
    /// Heading shown above the section text.
    pub heading: String,
}

impl SectionHeading {
    /// Creates a section heading.
    #[must_use]
    pub fn new(key: impl Into<String>, heading: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            heading: heading.into(),
        }
    }
}

/// Fixed text blocks and section layout of a rendered article.
///
/// In YAML, `sections` is a mapping from record key to heading; its
/// declared order is the order sections appear in the article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticleTemplate {
    /// First line of the article.
    pub banner: String,
    /// Appended to the document title in the top heading.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Opening paragraph after the divider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook: Option<String>,
    /// Ordered sections.
    #[serde(with = "ordered_sections")]
    pub sections: Vec<SectionHeading>,
    /// Heading of the call-to-action block.
    pub call_to_action_heading: String,
    /// Question put to the reader.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_to_action: Option<String>,
    /// Line closing the call-to-action block.
    pub closing: String,
    /// Final hashtag line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashtags: Option<String>,
}

impl Default for ArticleTemplate {
    fn default() -> Self {
        Self {
            banner: "🔬 #CiênciaNaPrática".to_string(),
            title: None,
            hook: None,
            sections: vec![
                SectionHeading::new("gap", "The Gap"),
                SectionHeading::new("objectives", "Objectives"),
                SectionHeading::new("methodology", "Methodology"),
                SectionHeading::new("results", "Results"),
            ],
            call_to_action_heading: "Sua vez de compartilhar! 💭".to_string(),
            call_to_action: None,
            closing: "Compartilhe suas ideias nos comentários! 👇".to_string(),
            hashtags: None,
        }
    }
}

impl ArticleTemplate {
    /// Sets the title suffix.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the hook paragraph.
    #[must_use]
    pub fn with_hook(mut self, hook: impl Into<String>) -> Self {
        self.hook = Some(hook.into());
        self
    }

    /// Replaces the sections.
    #[must_use]
    pub fn with_sections(mut self, sections: Vec<SectionHeading>) -> Self {
        self.sections = sections;
        self
    }

    /// Sets the call-to-action question.
    #[must_use]
    pub fn with_call_to_action(mut self, text: impl Into<String>) -> Self {
        self.call_to_action = Some(text.into());
        self
    }

    /// Sets the hashtag line.
    #[must_use]
    pub fn with_hashtags(mut self, hashtags: impl Into<String>) -> Self {
        self.hashtags = Some(hashtags.into());
        self
    }
}

mod ordered_sections {
    use super::{fmt, Deserializer, MapAccess, SectionHeading, SerializeMap, Serializer, Visitor};

    pub fn serialize<S: Serializer>(sections: &[SectionHeading], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(sections.len()))?;
        for section in sections {
            map.serialize_entry(&section.key, &section.heading)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<SectionHeading>, D::Error> {
        struct SectionsVisitor;

        impl<'de> Visitor<'de> for SectionsVisitor {
            type Value = Vec<SectionHeading>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping from section key to heading")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut sections = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, heading)) = access.next_entry::<String, String>()? {
                    sections.push(SectionHeading { key, heading });
                }
                Ok(sections)
            }
        }

        deserializer.deserialize_map(SectionsVisitor)
    }
}
