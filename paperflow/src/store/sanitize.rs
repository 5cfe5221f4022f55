//! Filesystem-safe keys derived from document names.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static RE_UNDERSCORE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_{2,}").expect("valid underscore-run regex"));

const UNSAFE: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Replaces filesystem-unsafe characters with `_` and collapses runs of `_`.
///
/// Idempotent: `sanitize_identifier(&sanitize_identifier(x)) == sanitize_identifier(x)`.
#[must_use]
pub fn sanitize_identifier(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| if UNSAFE.contains(&c) || c.is_control() { '_' } else { c })
        .collect();
    RE_UNDERSCORE_RUN.replace_all(&replaced, "_").into_owned()
}

/// Storage key of a source document: its sanitized file stem.
#[must_use]
pub fn document_key(identifier: &str) -> String {
    let stem = Path::new(identifier)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(identifier);
    sanitize_identifier(stem)
}
