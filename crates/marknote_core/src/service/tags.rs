//! Hashtag derivation from note content.
//!
//! # Invariants
//! - Output depends only on the input text.
//! - A tag is `#` followed by 2-24 chars of `[A-Za-z0-9_-]`, preceded by
//!   start-of-text or whitespace and followed by whitespace or end-of-text.
//! - Tags are lowercased and deduplicated in first-seen order.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static TAG_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#([A-Za-z0-9_-]{2,24})$").expect("valid tag regex"));

/// Extracts the tag set of `content`.
///
/// Boundaries are whitespace, so tokens are checked one whitespace-separated
/// word at a time; adjacent tags like `#a1 #b2` share a separator.
pub fn extract_tags(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tags = Vec::new();
    for token in content.split_whitespace() {
        let Some(caps) = TAG_TOKEN_RE.captures(token) else {
            continue;
        };
        let tag = caps[1].to_lowercase();
        if seen.insert(tag.clone()) {
            tags.push(tag);
        }
    }
    tags
}

/// Normalizes a tag filter value: trims, strips a leading `#`, lowercases.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim().trim_start_matches('#');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::{extract_tags, normalize_tag};

    #[test]
    fn extracts_lowercased_tags() {
        assert_eq!(
            extract_tags("hello #Work and #ideas_2 done"),
            vec!["work".to_string(), "ideas_2".to_string()]
        );
    }

    #[test]
    fn deduplicates_across_lines_and_case() {
        assert_eq!(extract_tags("todo #work\n#WORK again"), vec!["work"]);
    }

    #[test]
    fn adjacent_tags_are_both_found() {
        assert_eq!(extract_tags("#a1 #b2"), vec!["a1", "b2"]);
    }

    #[test]
    fn rejects_tokens_outside_the_grammar() {
        assert!(extract_tags("#a").is_empty());
        assert!(extract_tags("x#inline").is_empty());
        assert!(extract_tags("#trailing, #dotted.").is_empty());
        assert!(extract_tags("##double").is_empty());
        assert!(extract_tags(&format!("#{}", "a".repeat(25))).is_empty());
        assert_eq!(extract_tags(&format!("#{}", "a".repeat(24))).len(), 1);
    }

    #[test]
    fn markdown_headings_are_not_tags() {
        assert!(extract_tags("# Heading\n## Sub").is_empty());
    }

    #[test]
    fn normalize_tag_strips_hash_and_case() {
        assert_eq!(normalize_tag(" #Work ").as_deref(), Some("work"));
        assert_eq!(normalize_tag("  "), None);
        assert_eq!(normalize_tag("#"), None);
    }
}
