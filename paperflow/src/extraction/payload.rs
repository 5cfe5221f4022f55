//! Locating and parsing the structured payload inside free-form text.

use super::record::StructuredRecord;
use crate::errors::ExtractionError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

const FENCE: &str = "```";

/// Fence delimiters, optionally tagged with a format name (```yaml, ```yml).
static RE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[\w+-]*").expect("valid fence regex"));

/// Two or more consecutive blank lines.
static RE_BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n(?:[ \t]*\n){2,}").expect("valid blank-run regex"));

/// Where the payload slice ends once the marker has been found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceBoundary {
    /// Up to the next code fence after the marker, else the end of text.
    #[default]
    FencedBlock,
    /// Everything from the marker to the end of text.
    EndOfText,
    /// Like `FencedBlock`, but also stops at the first line after the marker
    /// line that is neither indented nor a list item.
    TopLevelSibling,
}

impl SliceBoundary {
    /// Parses the CLI spelling of a boundary.
    #[must_use]
    pub fn from_cli(value: &str) -> Option<Self> {
        match value {
            "fenced" | "fenced-block" => Some(Self::FencedBlock),
            "end-of-text" => Some(Self::EndOfText),
            "top-level" | "top-level-sibling" => Some(Self::TopLevelSibling),
            _ => None,
        }
    }
}

/// Pulls a [`StructuredRecord`] out of a raw stage response.
#[derive(Debug, Clone)]
pub struct PayloadExtractor {
    markers: Vec<String>,
    boundary: SliceBoundary,
}

impl Default for PayloadExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadExtractor {
    /// Creates an extractor with the `ARTICLE`/`ARTIGO` markers and a
    /// fenced-block boundary.
    #[must_use]
    pub fn new() -> Self {
        Self {
            markers: vec!["ARTICLE".to_string(), "ARTIGO".to_string()],
            boundary: SliceBoundary::default(),
        }
    }

    /// Replaces the accepted markers. Blank markers are ignored.
    #[must_use]
    pub fn with_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.markers = markers
            .into_iter()
            .map(Into::into)
            .map(|m: String| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        self
    }

    /// Sets the slice boundary.
    #[must_use]
    pub fn with_boundary(mut self, boundary: SliceBoundary) -> Self {
        self.boundary = boundary;
        self
    }

    /// The accepted markers.
    #[must_use]
    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    /// The configured boundary.
    #[must_use]
    pub fn boundary(&self) -> SliceBoundary {
        self.boundary
    }

    /// Extracts and validates the payload.
    ///
    /// # Errors
    ///
    /// - `NoPayloadFound` when no marker appears at a key position.
    /// - `MalformedPayload` when the slice does not parse as YAML.
    /// - `SchemaViolation` when it parses but has the wrong shape.
    pub fn extract(&self, raw: &str) -> Result<StructuredRecord, ExtractionError> {
        let slice = self.slice(raw).ok_or_else(|| ExtractionError::NoPayloadFound {
            markers: self.markers.clone(),
        })?;
        let cleaned = strip_noise(slice);
        tracing::trace!(length = cleaned.len(), boundary = ?self.boundary, "Parsing payload slice");
        StructuredRecord::from_yaml(&cleaned, &self.markers)
    }

    /// Returns the raw payload slice, before noise stripping.
    #[must_use]
    pub fn slice<'a>(&self, raw: &'a str) -> Option<&'a str> {
        let start = self.locate(raw)?;
        let rest = &raw[start..];

        let fenced_end = rest.find(FENCE).unwrap_or(rest.len());
        let end = match self.boundary {
            SliceBoundary::EndOfText => rest.len(),
            SliceBoundary::FencedBlock => fenced_end,
            SliceBoundary::TopLevelSibling => top_level_end(&rest[..fenced_end]),
        };
        Some(&rest[..end])
    }

    /// Byte offset where the payload starts.
    ///
    /// Bounded slices prefer a marker inside a fenced block, so prose that
    /// mentions the marker before the block does not capture the payload.
    /// Without a fenced marker, the earliest marker anywhere is used.
    fn locate(&self, raw: &str) -> Option<usize> {
        if self.boundary != SliceBoundary::EndOfText {
            let fenced = fenced_bodies(raw)
                .into_iter()
                .find_map(|(start, end)| self.earliest_key(&raw[start..end]).map(|at| start + at));
            if fenced.is_some() {
                return fenced;
            }
        }
        self.earliest_key(raw)
    }

    fn earliest_key(&self, text: &str) -> Option<usize> {
        self.markers
            .iter()
            .filter_map(|marker| find_key(text, marker))
            .min()
    }
}

/// Byte ranges of fenced-block bodies, in order. A body starts on the line
/// after its opening fence; an unclosed fence runs to the end of text.
fn fenced_bodies(raw: &str) -> Vec<(usize, usize)> {
    let mut bodies = Vec::new();
    let mut open: Option<usize> = None;
    for fence in RE_FENCE.find_iter(raw) {
        match open.take() {
            None => {
                let body = raw[fence.end()..]
                    .find('\n')
                    .map_or(raw.len(), |newline| fence.end() + newline + 1);
                open = Some(body);
            }
            Some(body) => bodies.push((body, fence.start().max(body))),
        }
    }
    if let Some(body) = open {
        bodies.push((body, raw.len()));
    }
    bodies
}

/// Finds `marker` used as a mapping key: preceded by start of text,
/// whitespace or a backtick, and followed by optional blanks and a colon.
fn find_key(raw: &str, marker: &str) -> Option<usize> {
    raw.match_indices(marker).map(|(at, _)| at).find(|&at| {
        let before_ok = raw[..at]
            .chars()
            .next_back()
            .map_or(true, |c| c.is_whitespace() || c == '`');
        let after = raw[at + marker.len()..].trim_start_matches([' ', '\t']);
        before_ok && after.starts_with(':')
    })
}

/// End offset of the marker's block: the first line after the first one
/// that starts at column zero and is not a list item.
fn top_level_end(slice: &str) -> usize {
    let mut offset = 0;
    for (index, line) in slice.split_inclusive('\n').enumerate() {
        let starts_block = index > 0
            && !line.trim().is_empty()
            && !line.starts_with([' ', '\t', '-'])
            && !line.starts_with(FENCE);
        if starts_block {
            return offset;
        }
        offset += line.len();
    }
    slice.len()
}

/// Removes fence delimiters, inline-code quoting of whole lines and
/// blank-line runs.
#[must_use]
pub fn strip_noise(text: &str) -> String {
    let unfenced = RE_FENCE.replace_all(text, "");
    let lines: Vec<&str> = unfenced.lines().map(unquote_line).collect();
    let joined = lines.join("\n");
    let collapsed = RE_BLANK_RUN.replace_all(&joined, "\n\n");
    collapsed.trim_matches('\n').to_string()
}

/// Drops backticks that quote a whole line (`` `ARTICLE:` ``) and lines made
/// only of backticks. Backticks inside values are kept.
fn unquote_line(line: &str) -> &str {
    let line = line.trim_end();
    if !line.is_empty() && line.trim_start().chars().all(|c| c == '`') {
        return "";
    }
    match line.strip_prefix('`').and_then(|inner| inner.strip_suffix('`')) {
        Some(inner) if !inner.contains('`') => inner,
        _ => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_yaml::Value;

    fn parse(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn test_fenced_block_with_trailing_noise() {
        let raw = "noise ```yaml\nARTICLE:\n  - GAP: x\n```\nmore noise";
        let record = PayloadExtractor::new().extract(raw).unwrap();

        assert_eq!(record.to_value(), parse("ARTICLE:\n  - GAP: x"));
    }

    #[test]
    fn test_bare_payload_without_fences() {
        let raw = "ARTIGO:\n  - GAP: lacuna\n    RESULTS: ok\n";
        let record = PayloadExtractor::new().extract(raw).unwrap();

        assert_eq!(record.root_key(), "ARTIGO");
        assert_eq!(record.section_text("results").as_deref(), Some("ok"));
    }

    #[test]
    fn test_root_value_matches_input() {
        let payload = "ARTICLE:\n  - GAP: \"lacuna de dados\"\n    METHODOLOGY: \"ensaio clínico 🧪\"\n";
        let raw = format!("Here you go:\n```yaml\n{payload}```\nThanks!");
        let record = PayloadExtractor::new().extract(&raw).unwrap();

        let expected = parse(payload);
        assert_eq!(record.root_value(), &expected["ARTICLE"]);
    }

    #[test]
    fn test_no_marker() {
        let err = PayloadExtractor::new()
            .extract("The model refused to answer.")
            .unwrap_err();
        assert!(matches!(err, ExtractionError::NoPayloadFound { .. }));
    }

    #[test]
    fn test_marker_inside_word_is_ignored() {
        let err = PayloadExtractor::new()
            .extract("SUBARTICLE: nothing here\nARTICLES: none")
            .unwrap_err();
        assert!(matches!(err, ExtractionError::NoPayloadFound { .. }));
    }

    #[test]
    fn test_malformed_slice() {
        let raw = "```yaml\nARTICLE:\n  - GAP: [unclosed\n```";
        let err = PayloadExtractor::new().extract(raw).unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedPayload { .. }));
    }

    #[test]
    fn test_end_of_text_keeps_trailing_noise() {
        let raw = "ARTICLE:\n  - GAP: x\n```\nmore noise";

        let fenced = PayloadExtractor::new().extract(raw);
        assert!(fenced.is_ok());

        let unbounded = PayloadExtractor::new()
            .with_boundary(SliceBoundary::EndOfText)
            .extract(raw)
            .unwrap_err();
        assert!(matches!(unbounded, ExtractionError::MalformedPayload { .. }));
    }

    #[test]
    fn test_top_level_sibling_boundary() {
        let raw = "ARTICLE:\n  - GAP: x\n\nLet me know if you need anything else.";
        let extractor = PayloadExtractor::new().with_boundary(SliceBoundary::TopLevelSibling);

        assert_eq!(extractor.slice(raw), Some("ARTICLE:\n  - GAP: x\n\n"));
        assert!(extractor.extract(raw).is_ok());
    }

    #[test]
    fn test_earliest_marker_wins_without_fences() {
        let raw = "ARTIGO:\n  - GAP: first\nARTICLE:\n  - GAP: second\n";
        let extractor = PayloadExtractor::new().with_boundary(SliceBoundary::TopLevelSibling);
        let record = extractor.extract(raw).unwrap();
        assert_eq!(record.root_key(), "ARTIGO");
        assert_eq!(record.section_text("GAP").as_deref(), Some("first"));
    }

    #[test]
    fn test_marker_in_prose_before_fenced_block() {
        let raw = "Here is the corrected ARTICLE: see below.\n```yaml\nARTICLE:\n  - GAP: x\n```\n";

        for boundary in [SliceBoundary::FencedBlock, SliceBoundary::TopLevelSibling] {
            let record = PayloadExtractor::new().with_boundary(boundary).extract(raw).unwrap();
            assert_eq!(record.to_value(), parse("ARTICLE:\n  - GAP: x"), "{boundary:?}");
        }
    }

    #[test]
    fn test_fenced_payload_preferred_over_earlier_bare_one() {
        let raw = "ARTIGO:\n  - GAP: draft\n\nCorrected:\n```yaml\nARTICLE:\n  - GAP: final\n```";
        let record = PayloadExtractor::new().extract(raw).unwrap();
        assert_eq!(record.section_text("GAP").as_deref(), Some("final"));
    }

    #[test]
    fn test_fence_without_marker_falls_back_to_text() {
        let raw = "```text\nno payload here\n```\nARTICLE:\n  - GAP: x\n";
        let record = PayloadExtractor::new().extract(raw).unwrap();
        assert_eq!(record.section_text("GAP").as_deref(), Some("x"));
    }

    #[test]
    fn test_custom_markers() {
        let extractor = PayloadExtractor::new().with_markers(["PAPER", " "]);
        assert_eq!(extractor.markers(), &["PAPER".to_string()]);
        assert!(extractor.extract("PAPER:\n  - GAP: x").is_ok());
        assert!(extractor.extract("ARTICLE:\n  - GAP: x").is_err());
    }

    #[test]
    fn test_strip_noise() {
        let text = "```yml\n`ARTICLE:`\n\n\n\n  - GAP: x\n```";
        assert_eq!(strip_noise(text), "ARTICLE:\n\n  - GAP: x");
    }

    #[test]
    fn test_backticks_inside_values_are_kept() {
        let raw = "```yaml\nARTICLE:\n  - GAP: run `make`\n    RESULTS: see `out`\n```";
        let record = PayloadExtractor::new().extract(raw).unwrap();
        assert_eq!(record.section_text("GAP").as_deref(), Some("run `make`"));
        assert_eq!(record.section_text("RESULTS").as_deref(), Some("see `out`"));
    }

    #[test]
    fn test_boundary_from_cli() {
        assert_eq!(SliceBoundary::from_cli("fenced"), Some(SliceBoundary::FencedBlock));
        assert_eq!(SliceBoundary::from_cli("end-of-text"), Some(SliceBoundary::EndOfText));
        assert_eq!(SliceBoundary::from_cli("top-level"), Some(SliceBoundary::TopLevelSibling));
        assert_eq!(SliceBoundary::from_cli("other"), None);
    }
}
