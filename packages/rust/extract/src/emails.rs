//! Email address extraction.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use leadgen_shared::EmailExtractionCapability;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("email regex")
});

/// Placeholder and tracking domains that never belong to a real contact.
const IGNORED_DOMAINS: &[&str] = &[
    "example.com",
    "domain.com",
    "email.com",
    "test.com",
    "sentry.io",
    "wixpress.com",
    "sentry-next.wixpress.com",
];

/// Suffixes of asset file names that look like addresses (`logo@2x.png`).
const ASSET_SUFFIXES: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp"];

/// [`EmailExtractionCapability`] backed by a regex scan.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexEmailExtractor;

impl EmailExtractionCapability for RegexEmailExtractor {
    fn extract(&self, text: &str) -> Vec<String> {
        extract_emails(text)
    }
}

/// Distinct, lower-cased addresses in `text`, in document order.
pub fn extract_emails(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();

    EMAIL_RE
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches('.').to_lowercase())
        .filter(|email| !is_ignored(email))
        .filter(|email| seen.insert(email.clone()))
        .collect()
}

fn is_ignored(email: &str) -> bool {
    if ASSET_SUFFIXES.iter().any(|s| email.ends_with(s)) {
        return true;
    }
    let domain = email.rsplit('@').next().unwrap_or_default();
    IGNORED_DOMAINS
        .iter()
        .any(|d| domain == *d || domain.ends_with(&format!(".{d}")))
}

/// Byte offset of the first case-insensitive occurrence of `email` in `text`.
pub fn find_email(text: &str, email: &str) -> Option<usize> {
    let needle = email.as_bytes();
    if needle.is_empty() || needle.len() > text.len() {
        return None;
    }
    text.as_bytes()
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
}
