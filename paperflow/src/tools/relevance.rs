//! Query-term overlap scoring for passages.

use crate::extraction::strip_noise;
use std::collections::HashSet;

/// Fraction of distinct query terms (lowercased, whitespace-split) that
/// occur in `text`. Returns 0.0 for an empty query.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn relevance_score(text: &str, query: &str) -> f64 {
    let query_terms: HashSet<String> = query
        .to_lowercase()
        .split_whitespace()
        .map(|term| term.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|term| term.chars().count() > 2)
        .collect();

    if query_terms.is_empty() {
        return 0.0;
    }

    let content = text.to_lowercase();
    let matches = query_terms
        .iter()
        .filter(|term| content.contains(term.as_str()))
        .count();

    matches as f64 / query_terms.len() as f64
}

/// Splits text into paragraphs and merges short neighbours until each
/// passage holds about `target_chars` characters.
#[must_use]
pub fn split_passages(text: &str, target_chars: usize) -> Vec<String> {
    let mut passages = Vec::new();
    let mut current = String::new();

    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if !current.is_empty() && current.len() + paragraph.len() > target_chars {
            passages.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }
    if !current.is_empty() {
        passages.push(current);
    }
    passages
}

/// Picks the `limit` passages most relevant to `query`.
///
/// Ties keep document order, and the result is returned in document order.
/// With no matching passage at all, the leading passages are returned.
#[must_use]
pub fn rank_passages<'a>(passages: &'a [String], query: &str, limit: usize) -> Vec<&'a str> {
    let mut scored: Vec<(usize, f64)> = passages
        .iter()
        .enumerate()
        .map(|(index, passage)| (index, relevance_score(passage, query)))
        .collect();

    if scored.iter().all(|(_, score)| *score == 0.0) {
        return passages.iter().take(limit).map(String::as_str).collect();
    }

    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    let mut picked: Vec<usize> = scored
        .into_iter()
        .filter(|(_, score)| *score > 0.0)
        .take(limit)
        .map(|(index, _)| index)
        .collect();
    picked.sort_unstable();
    picked.into_iter().map(|index| passages[index].as_str()).collect()
}

/// The first `count` words of `text` with fences and markup removed,
/// suitable as a search query.
#[must_use]
pub fn leading_words(text: &str, count: usize) -> String {
    strip_noise(text)
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| matches!(c, '`' | '#' | '*' | '-' | '"' | '\'')))
        .filter(|word| !word.is_empty() && !word.ends_with(':'))
        .take(count)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relevance_score() {
        assert!((relevance_score("Deep learning for protein folding", "protein folding") - 1.0).abs() < f64::EPSILON);
        assert!((relevance_score("Deep learning", "protein learning") - 0.5).abs() < f64::EPSILON);
        assert_eq!(relevance_score("anything", ""), 0.0);
        assert_eq!(relevance_score("anything", "a of"), 0.0);
    }

    #[test]
    fn test_split_passages_merges_short_paragraphs() {
        let text = "one\n\ntwo\n\n\n\nthree is longer than the others";
        let passages = split_passages(text, 12);
        assert_eq!(passages, vec!["one\n\ntwo", "three is longer than the others"]);
    }

    #[test]
    fn test_rank_passages_keeps_document_order() {
        let passages: Vec<String> = vec![
            "introduction and motivation".into(),
            "the methodology used a randomized trial".into(),
            "results of the randomized trial methodology".into(),
            "acknowledgements".into(),
        ];
        let ranked = rank_passages(&passages, "methodology randomized trial", 2);
        assert_eq!(ranked, vec![passages[1].as_str(), passages[2].as_str()]);
    }

    #[test]
    fn test_rank_passages_without_matches() {
        let passages: Vec<String> = vec!["alpha".into(), "beta".into(), "gamma".into()];
        assert_eq!(rank_passages(&passages, "zeta", 2), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_leading_words() {
        let text = "```yaml\nARTICLE:\n  - GAP: \"Lack of data on soil carbon\"\n```";
        assert_eq!(leading_words(text, 4), "Lack of data on");
    }
}
