//! Text utilities for slugs, excerpts and feed dates
//!
//! Centralizes the derivation rules used across the content engine:
//! URL-safe slugs from titles, markup stripping, and excerpt truncation.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

/// Maximum length of a derived excerpt, in characters
pub const EXCERPT_LEN: usize = 200;

static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

static WHITESPACE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Derive a URL-safe slug from arbitrary text
///
/// Lowercases, keeps alphanumeric runs, and joins them with single hyphens.
///
/// # Examples
///
/// ```
/// use newsdesk::utils::text::slugify;
///
/// assert_eq!(slugify("Breaking: Markets Rally!"), "breaking-markets-rally");
/// assert_eq!(slugify("  Hello   World  "), "hello-world");
/// ```
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut prev_hyphen = true;

    for c in text.chars() {
        if c.is_alphanumeric() {
            for lower in c.to_lowercase() {
                slug.push(lower);
            }
            prev_hyphen = false;
        } else if !prev_hyphen {
            slug.push('-');
            prev_hyphen = true;
        }
    }

    slug.trim_matches('-').to_string()
}

/// Strip markup tags and decode HTML entities, normalizing whitespace
///
/// # Examples
///
/// ```
/// use newsdesk::utils::text::strip_tags;
///
/// assert_eq!(strip_tags("<p>Hello <b>world</b></p>"), "Hello world");
/// assert_eq!(strip_tags("a &amp; b"), "a & b");
/// ```
pub fn strip_tags(text: &str) -> String {
    let without_tags = TAG_REGEX.replace_all(text, " ");
    let decoded = html_escape::decode_html_entities(&without_tags);
    WHITESPACE_REGEX.replace_all(&decoded, " ").trim().to_string()
}

/// Derive an excerpt from body content: strip markup, truncate to
/// [`EXCERPT_LEN`] characters on a char boundary.
pub fn excerpt(content: &str) -> String {
    let stripped = strip_tags(content);
    truncate_chars(&stripped, EXCERPT_LEN)
}

/// Truncate a string to at most `max` characters
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].trim_end().to_string(),
        None => text.to_string(),
    }
}

/// Count words in text after stripping markup
pub fn word_count(text: &str) -> usize {
    strip_tags(text).split_whitespace().count()
}

/// Parse a feed timestamp, accepting RFC 2822 (`pubDate`) and RFC 3339
/// (Atom `published`) forms
pub fn parse_feed_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("Rust 1.80 Released"), "rust-1-80-released");
    }

    #[test]
    fn test_slugify_punctuation_collapses() {
        assert_eq!(slugify("What's new -- today?"), "what-s-new-today");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn test_strip_tags_removes_markup() {
        let html = "<div class=\"body\"><p>First</p><p>Second</p></div>";
        assert_eq!(strip_tags(html), "First Second");
    }

    #[test]
    fn test_strip_tags_decodes_entities() {
        assert_eq!(strip_tags("fish &amp; chips"), "fish & chips");
    }

    #[test]
    fn test_excerpt_truncates_to_limit() {
        let content = "word ".repeat(100);
        let result = excerpt(&content);
        assert!(result.chars().count() <= EXCERPT_LEN);
    }

    #[test]
    fn test_excerpt_short_content_untouched() {
        assert_eq!(excerpt("<p>short</p>"), "short");
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        // Multi-byte characters must not be split
        let text = "뉴스 데스크 시스템";
        let truncated = truncate_chars(text, 5);
        assert!(truncated.chars().count() <= 5);
    }

    #[test]
    fn test_parse_feed_date_rfc2822() {
        let parsed = parse_feed_date("Tue, 06 Aug 2024 10:30:00 +0000");
        assert!(parsed.is_some());
    }

    #[test]
    fn test_parse_feed_date_rfc3339() {
        let parsed = parse_feed_date("2024-08-06T10:30:00Z");
        assert!(parsed.is_some());
    }

    #[test]
    fn test_parse_feed_date_garbage() {
        assert!(parse_feed_date("yesterday").is_none());
        assert!(parse_feed_date("").is_none());
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count("<p>one two three</p>"), 3);
    }
}
