//! `@file` mention extraction and query-intent heuristics.
//!
//! Mentions are `@token`, `@"quoted name"`, or `@'quoted name'`
//! references to vault files. Tokens normalize to forward slashes,
//! lowercase, with `./` prefixes and trailing punctuation stripped so
//! set comparisons survive the ways users actually type paths.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

/// Punctuation stripped from the tail of bare mention tokens.
const MENTION_TRAILING_PUNCT: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}'];

/// Comparison keywords that demand per-document evidence coverage.
pub const CROSS_DOC_COMPARISON_PATTERNS: &[&str] = &[
    "compare",
    "comparar",
    "comparação",
    "comparacao",
    "versus",
    " vs ",
    "esperado x",
    "enviado x",
    "expected x",
    "item por item",
    "subitem por subitem",
];

/// Keywords that switch retrieval into the exhaustive profile.
pub const EXHAUSTIVE_QUERY_PATTERNS: &[&str] = &[
    "todos os itens",
    "todos os subitens",
    "item por item",
    "subitem por subitem",
    "sem descrições",
    "sem descricoes",
    "sem descrição",
    "sem descricao",
    "lista completa",
    "apenas lista",
    "somente lista",
    "sem detalhes",
    "compare",
    "comparar",
    "comparação",
    "comparacao",
    "versus",
    "esperado x",
    "enviado x",
    "expected x",
    "all items",
    "all subitems",
    "item by item",
    "subitem by subitem",
    "comparison",
    "without descriptions",
    "list only",
];

fn citation_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"\[\d+\]").unwrap()
    })
}

fn mention_re() -> &'static Regex {
    // The leading group rejects e-mail-like `user@host` forms; the
    // regex crate has no lookbehind, so the boundary is captured and
    // re-emitted when stripping.
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r#"(^|[^A-Za-z0-9])@("([^"]+)"|'([^']+)'|[^\s@"']+)"#).unwrap()
    })
}

/// Normalizes a mention token for robust set comparison.
#[must_use]
pub fn normalize_mention(token: &str) -> String {
    let mut normalized = token.trim().replace('\\', "/");
    while let Some(stripped) = normalized.strip_prefix("./") {
        normalized = stripped.to_string();
    }
    normalized
        .to_lowercase()
        .trim_matches('/')
        .to_string()
}

fn clean_raw_token(raw: &str, quoted: bool) -> String {
    let token = if quoted {
        raw.to_string()
    } else {
        raw.trim_end_matches(MENTION_TRAILING_PUNCT).to_string()
    };
    token.trim().to_string()
}

/// Extracts normalized mention tokens from free text, deduplicated in
/// first-seen order.
#[must_use]
pub fn extract_mentions(text: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut mentions = Vec::new();
    for caps in mention_re().captures_iter(text) {
        let (raw, quoted) = caps.get(3).or_else(|| caps.get(4)).map_or_else(
            || (caps.get(2).map_or("", |m| m.as_str()), false),
            |m| (m.as_str(), true),
        );
        let token = clean_raw_token(raw, quoted);
        let normalized = normalize_mention(&token);
        if !normalized.is_empty() && seen.insert(normalized.clone()) {
            mentions.push(normalized);
        }
    }
    mentions
}

/// Removes mentions from the text and returns the stripped query plus
/// the raw (non-normalized) mention tokens in first-seen order.
#[must_use]
pub fn strip_mentions(text: &str) -> (String, Vec<String>) {
    let mut mentions: Vec<String> = Vec::new();
    let mut seen = BTreeSet::new();

    let stripped = mention_re().replace_all(text, |caps: &regex::Captures<'_>| {
        let boundary = caps.get(1).map_or("", |m| m.as_str());
        let (raw, quoted) = caps.get(3).or_else(|| caps.get(4)).map_or_else(
            || (caps.get(2).map_or("", |m| m.as_str()), false),
            |m| (m.as_str(), true),
        );
        let token = clean_raw_token(raw, quoted);
        let key = normalize_mention(&token);
        if !key.is_empty() && seen.insert(key) {
            mentions.push(token);
        }
        format!("{boundary} ")
    });

    let stripped = stripped.split_whitespace().collect::<Vec<&str>>().join(" ");
    (stripped, mentions)
}

/// True when two normalized mention tokens likely refer to the same
/// target file: exact, `/`-boundary suffix, or shared stem.
#[must_use]
pub fn mentions_equivalent(required: &str, candidate: &str) -> bool {
    if required == candidate {
        return true;
    }
    if required.is_empty() || candidate.is_empty() {
        return false;
    }
    if required.ends_with(&format!("/{candidate}"))
        || candidate.ends_with(&format!("/{required}"))
    {
        return true;
    }
    let stem = |s: &str| {
        Path::new(s)
            .file_stem()
            .map(|v| v.to_string_lossy().to_string())
            .unwrap_or_default()
    };
    let required_stem = stem(required);
    !required_stem.is_empty() && required_stem == stem(candidate)
}

/// True when the text contains any comparison keyword.
#[must_use]
pub fn has_comparison_keyword(text: &str) -> bool {
    let lowered = text.to_lowercase();
    CROSS_DOC_COMPARISON_PATTERNS
        .iter()
        .any(|pattern| lowered.contains(pattern))
}

/// True when the text contains any exhaustive-retrieval keyword.
#[must_use]
pub fn looks_exhaustive_query(text: &str) -> bool {
    let lowered = text.to_lowercase();
    EXHAUSTIVE_QUERY_PATTERNS
        .iter()
        .any(|pattern| lowered.contains(pattern))
}

/// True when text contains inline retrieval citation markers like `[1]`.
#[must_use]
pub fn has_citation_markers(text: &str) -> bool {
    citation_marker_re().is_match(text)
}

/// Renders mentions for user/system notices.
#[must_use]
pub fn format_mentions(mentions: &[String]) -> String {
    if mentions.is_empty() {
        return "(none)".to_string();
    }
    mentions
        .iter()
        .map(|m| format!("@{m}"))
        .collect::<Vec<String>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_extract_bare_mentions() {
        let mentions = extract_mentions("compare @a.pdf and @docs/b.pdf, please");
        assert_eq!(mentions, vec!["a.pdf".to_string(), "docs/b.pdf".to_string()]);
    }

    #[test]
    fn test_extract_quoted_mentions() {
        let mentions = extract_mentions(r#"summarize @"annual report.pdf" now"#);
        assert_eq!(mentions, vec!["annual report.pdf".to_string()]);
    }

    #[test]
    fn test_email_like_text_is_not_a_mention() {
        assert!(extract_mentions("mail me at someone@example.com").is_empty());
    }

    #[test]
    fn test_mentions_dedupe_by_normalized_key() {
        let mentions = extract_mentions("look at @A.pdf and @./a.pdf again");
        assert_eq!(mentions, vec!["a.pdf".to_string()]);
    }

    #[test]
    fn test_strip_mentions_preserves_query() {
        let (stripped, mentions) = strip_mentions("@report.pdf weak points in methodology");
        assert_eq!(stripped, "weak points in methodology");
        assert_eq!(mentions, vec!["report.pdf".to_string()]);
    }

    #[test_case("a.pdf", "a.pdf", true; "exact")]
    #[test_case("docs/a.pdf", "a.pdf", true; "suffix")]
    #[test_case("a.pdf", "a.md", true; "shared stem")]
    #[test_case("a.pdf", "b.pdf", false; "different")]
    #[test_case("", "a.pdf", false; "empty required")]
    fn test_mentions_equivalent(required: &str, candidate: &str, expected: bool) {
        assert_eq!(mentions_equivalent(required, candidate), expected);
    }

    #[test]
    fn test_normalize_mention_forms() {
        assert_eq!(normalize_mention("./Docs\\Report.PDF"), "docs/report.pdf");
        assert_eq!(normalize_mention("/a/b/"), "a/b");
    }

    #[test]
    fn test_keyword_heuristics() {
        assert!(has_comparison_keyword("Compare the two reports item por item"));
        assert!(!has_comparison_keyword("summarize the report"));
        assert!(looks_exhaustive_query("lista completa dos itens"));
        assert!(looks_exhaustive_query("all items, list only"));
        assert!(!looks_exhaustive_query("what is the main finding?"));
    }

    #[test]
    fn test_citation_markers() {
        assert!(has_citation_markers("as shown in [1] and [12]"));
        assert!(!has_citation_markers("no markers here"));
    }

    #[test]
    fn test_format_mentions() {
        assert_eq!(format_mentions(&[]), "(none)");
        assert_eq!(
            format_mentions(&["a.pdf".to_string(), "b.pdf".to_string()]),
            "@a.pdf, @b.pdf"
        );
    }
}
