//! The structured record extracted from stage output.

use crate::errors::ExtractionError;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

/// Key ordering used when a record is serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyOrder {
    /// Mapping keys are sorted recursively, giving stable files.
    #[default]
    Sorted,
    /// Keys keep the order they had in the source payload.
    Preserve,
}

/// A keyed document rooted at a mandatory marker key.
///
/// The marker's value is a non-empty sequence of mappings; each mapping
/// holds the section keys (`GAP`, `OBJECTIVES`, ...). Construction always
/// goes through [`StructuredRecord::from_value`], which enforces that shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredRecord {
    root_key: String,
    document: Mapping,
}

impl StructuredRecord {
    /// Validates a parsed value and wraps it.
    ///
    /// `markers` lists the accepted root keys; the first one present in the
    /// mapping becomes the record's root key.
    ///
    /// # Errors
    ///
    /// Returns `SchemaViolation` when the value is not a mapping, lacks every
    /// marker, or the marker's value is not a non-empty sequence of mappings.
    pub fn from_value(value: Value, markers: &[String]) -> Result<Self, ExtractionError> {
        let Value::Mapping(document) = value else {
            return Err(ExtractionError::schema(format!(
                "expected a mapping at the top level, found {}",
                value_kind(&value)
            )));
        };

        let root_key = markers
            .iter()
            .find(|marker| document.contains_key(marker.as_str()))
            .cloned()
            .ok_or_else(|| {
                ExtractionError::schema(format!("missing mandatory key (one of: {})", markers.join(", ")))
            })?;

        match document.get(root_key.as_str()) {
            Some(Value::Sequence(entries)) if entries.is_empty() => {
                return Err(ExtractionError::schema(format!("'{root_key}' is an empty sequence")));
            }
            Some(Value::Sequence(entries)) => {
                if let Some(position) = entries.iter().position(|entry| !entry.is_mapping()) {
                    return Err(ExtractionError::schema(format!(
                        "'{root_key}' entry {position} is a {}, expected a mapping",
                        value_kind(&entries[position])
                    )));
                }
            }
            Some(other) => {
                return Err(ExtractionError::schema(format!(
                    "'{root_key}' must be a sequence, found {}",
                    value_kind(other)
                )));
            }
            None => unreachable!("root key was found in the mapping"),
        }

        Ok(Self { root_key, document })
    }

    /// Parses YAML text into a record.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPayload` on parse errors and `SchemaViolation` on
    /// shape errors.
    pub fn from_yaml(text: &str, markers: &[String]) -> Result<Self, ExtractionError> {
        let value: Value =
            serde_yaml::from_str(text).map_err(|source| ExtractionError::MalformedPayload { source })?;
        Self::from_value(value, markers)
    }

    /// The mandatory root key this record was found under.
    #[must_use]
    pub fn root_key(&self) -> &str {
        &self.root_key
    }

    /// The value under the root key.
    #[must_use]
    pub fn root_value(&self) -> &Value {
        self.document.get(self.root_key.as_str()).unwrap_or(&Value::Null)
    }

    /// All entries under the root key.
    pub fn entries(&self) -> impl Iterator<Item = &Mapping> {
        self.root_value()
            .as_sequence()
            .into_iter()
            .flatten()
            .filter_map(Value::as_mapping)
    }

    /// The first entry, which holds the article's sections.
    #[must_use]
    pub fn entry(&self) -> Option<&Mapping> {
        self.entries().next()
    }

    /// Section keys of the first entry, in source order.
    #[must_use]
    pub fn section_keys(&self) -> Vec<String> {
        self.entry()
            .map(|entry| entry.keys().filter_map(Value::as_str).map(String::from).collect())
            .unwrap_or_default()
    }

    /// Looks up a section of the first entry, ignoring ASCII case.
    #[must_use]
    pub fn section(&self, key: &str) -> Option<&Value> {
        self.entry()?
            .iter()
            .find(|(k, _)| k.as_str().is_some_and(|k| k.eq_ignore_ascii_case(key)))
            .map(|(_, v)| v)
    }

    /// Renders a section as display text. Null and blank sections yield `None`.
    #[must_use]
    pub fn section_text(&self, key: &str) -> Option<String> {
        let text = match self.section(key)? {
            Value::Null => return None,
            Value::String(s) => s.trim().to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Sequence(items) => items
                .iter()
                .map(|item| format!("- {}", scalar_text(item)))
                .collect::<Vec<_>>()
                .join("\n"),
            other => serde_yaml::to_string(other).ok()?.trim().to_string(),
        };
        (!text.is_empty()).then_some(text)
    }

    /// The whole document as a YAML value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Mapping(self.document.clone())
    }

    /// Serializes the record.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn to_yaml(&self, order: KeyOrder) -> Result<String, serde_yaml::Error> {
        match order {
            KeyOrder::Preserve => serde_yaml::to_string(&self.document),
            KeyOrder::Sorted => serde_yaml::to_string(&sorted(&self.to_value())),
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

fn key_text(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => scalar_text(other),
    }
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Mapping(mapping) => {
            let mut entries: Vec<(Value, Value)> =
                mapping.iter().map(|(k, v)| (k.clone(), sorted(v))).collect();
            entries.sort_by_key(|(k, _)| key_text(k));
            Value::Mapping(entries.into_iter().collect())
        }
        Value::Sequence(items) => Value::Sequence(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}
