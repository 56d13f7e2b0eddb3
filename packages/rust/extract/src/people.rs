//! Decision-maker heuristics: role markers and the names next to them.

use std::sync::LazyLock;

use regex::Regex;

use crate::emails::find_email;

/// Role markers, longest first so `managing director` wins over `director`.
pub const ROLE_MARKERS: &[&str] = &[
    "managing director",
    "chief executive",
    "co-founder",
    "founder",
    "president",
    "director",
    "partner",
    "owner",
    "ceo",
    "cmo",
];

/// How far (in bytes) from an address a role marker still counts as context.
pub const ROLE_CONTEXT_WINDOW: usize = 100;

/// How far (in bytes) from a role marker a name is looked for.
const NAME_WINDOW: usize = 60;

static ROLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives = ROLE_MARKERS
        .iter()
        .map(|m| regex::escape(m))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternatives})\b")).expect("role regex")
});

/// Capitalised name tokens: `Jane`, `O'Neil`, `Anna-Liisa`.
const NAME_TOKEN: &str = r"\p{Lu}\p{Ll}+(?:[-'’]\p{Lu}?\p{Ll}+)?";

/// A name immediately before a role marker: `Jane Doe, CEO`, `Jane Doe (Founder)`.
static NAME_BEFORE_ROLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"({NAME_TOKEN}(?:\s+{NAME_TOKEN}){{1,2}})\s*(?:[,|(–—-]\s*)?{}",
        r"(?:(?:is|was)\s+)?(?:(?:our|the|and)\s+)?$"
    ))
    .expect("name-before-role regex")
});

/// A name immediately after a role marker: `CEO Jane Doe`, `Founder: Jane Doe`.
static NAME_AFTER_ROLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^\s*(?:[:,|)–—-]\s*)?({NAME_TOKEN}(?:\s+{NAME_TOKEN}){{0,2}})"
    ))
    .expect("name-after-role regex")
});

/// Capitalised words that are never part of a person's name.
const NOT_NAME_WORDS: &[&str] = &[
    "ab", "about", "agency", "and", "call", "ceo", "chief", "cmo", "co-founder", "contact",
    "coo", "cto", "digital", "director", "email", "executive", "founder", "get", "gmbh",
    "head", "hello", "hi", "inc", "llc", "ltd", "managing", "marketing", "media", "meet",
    "mobile", "office", "officer", "our", "owner", "oy", "partner", "phone", "president",
    "sales", "social", "team", "tel", "the", "us", "we",
];

/// Whether the local part of an address names a role (`ceo@`, `jane.founder@`).
pub fn local_part_has_role(email: &str) -> bool {
    let local = email.split('@').next().unwrap_or_default().to_lowercase();
    ROLE_MARKERS
        .iter()
        .map(|m| m.replace([' ', '-'], ""))
        .any(|m| local.contains(&m))
}

/// Whether a role marker appears within [`ROLE_CONTEXT_WINDOW`] bytes of
/// the first occurrence of `email` in `text`.
pub fn role_mentioned_near(text: &str, email: &str) -> bool {
    let Some(start) = find_email(text, email) else {
        return false;
    };
    let end = start + email.len();
    let lo = floor_boundary(text, start.saturating_sub(ROLE_CONTEXT_WINDOW));
    let hi = ceil_boundary(text, (end + ROLE_CONTEXT_WINDOW).min(text.len()));

    mentions_role(&text[lo..start]) || mentions_role(&text[end..hi])
}

/// A role marker that is not itself part of an address (`ceo@x.fi`).
fn mentions_role(context: &str) -> bool {
    ROLE_RE.find_iter(context).any(|m| {
        !context[m.end()..].starts_with('@') && !context[..m.start()].ends_with(['@', '.'])
    })
}

/// Find a plausible decision-maker name: a capitalised two or three word
/// name right before or after a role marker.
///
/// With an `anchor` (byte offset, usually where the chosen address sits),
/// the candidate closest to it wins; otherwise the first in document order.
pub fn find_decision_maker(text: &str, anchor: Option<usize>) -> Option<String> {
    let mut candidates: Vec<(usize, String)> = Vec::new();

    for role in ROLE_RE.find_iter(text) {
        let before_start = floor_boundary(text, role.start().saturating_sub(NAME_WINDOW));
        if let Some(caps) = NAME_BEFORE_ROLE.captures(&text[before_start..role.start()]) {
            if let Some(name) = caps.get(1).and_then(|m| clean_name(m.as_str())) {
                candidates.push((role.start(), name));
            }
        }

        let after_end = ceil_boundary(text, (role.end() + NAME_WINDOW).min(text.len()));
        if let Some(caps) = NAME_AFTER_ROLE.captures(&text[role.end()..after_end]) {
            if let Some(name) = caps.get(1).and_then(|m| clean_name(m.as_str())) {
                candidates.push((role.start(), name));
            }
        }
    }

    match anchor {
        Some(anchor) => candidates
            .into_iter()
            .min_by_key(|(pos, _)| pos.abs_diff(anchor))
            .map(|(_, name)| name),
        None => candidates.into_iter().next().map(|(_, name)| name),
    }
}

/// Trim non-name words off both ends; keep the result only if two or three
/// name words remain.
fn clean_name(raw: &str) -> Option<String> {
    let is_name_word = |w: &&str| !NOT_NAME_WORDS.contains(&w.to_lowercase().as_str());

    let words: Vec<&str> = raw.split_whitespace().collect();
    let start = words.iter().position(|w| is_name_word(w))?;
    let end = words.iter().rposition(|w| is_name_word(w))?;
    let kept = &words[start..=end];

    if !(2..=3).contains(&kept.len()) || !kept.iter().all(is_name_word) {
        return None;
    }
    Some(kept.join(" "))
}

fn floor_boundary(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_boundary(text: &str, mut idx: usize) -> usize {
    while idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
