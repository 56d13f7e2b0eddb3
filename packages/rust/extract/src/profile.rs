//! Services / niche / size-signal heuristic over website text.

use std::sync::LazyLock;

use regex::Regex;

/// What an agency's website says about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgencyProfile {
    /// Canonical service names, comma separated.
    pub services: String,
    /// Dominant client vertical, if any stands out.
    pub niche: Option<String>,
    /// Company size signals (team size, client count, age).
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Keyword tables
// ---------------------------------------------------------------------------

const SERVICES: &[(&str, &[&str])] = &[
    (
        "Social Media Management",
        &[
            "social media management",
            "social media marketing",
            "community management",
            "social media",
        ],
    ),
    (
        "Content Creation",
        &[
            "content creation",
            "content marketing",
            "content production",
            "copywriting",
            "video production",
        ],
    ),
    (
        "Paid Advertising",
        &[
            "paid advertising",
            "paid social",
            "paid media",
            "ppc",
            "google ads",
            "facebook ads",
            "meta ads",
        ],
    ),
    ("Influencer Marketing", &["influencer marketing", "influencers?"]),
    ("SEO", &["seo", "search engine optimi[sz]ation"]),
    ("Web Design", &["web design", "website design", "web development"]),
    ("Branding", &["branding", "brand strategy", "brand identity"]),
    ("Email Marketing", &["email marketing", "newsletters?"]),
];

const NICHES: &[(&str, &[&str])] = &[
    ("ecommerce", &["e-?commerce", "online stores?", "webshops?", "shopify", "retail"]),
    ("B2B SaaS", &["saas", "b2b", "software companies"]),
    ("healthcare", &["healthcare", "health care", "clinics?", "medical", "wellness"]),
    ("hospitality", &["hospitality", "restaurants?", "hotels?", "tourism", "travel"]),
    ("real estate", &["real estate", "realtors?", "property"]),
    ("local business", &["local business(?:es)?", "small business(?:es)?", "smbs?"]),
    ("fashion & beauty", &["fashion", "beauty", "cosmetics", "apparel"]),
    ("education", &["education", "universit(?:y|ies)", "e-?learning"]),
    ("finance", &["fintech", "finance", "banking", "insurance"]),
];

type KeywordTable = Vec<(&'static str, Regex)>;

fn compile(table: &[(&'static str, &[&str])]) -> KeywordTable {
    table
        .iter()
        .map(|(name, patterns)| {
            let re = Regex::new(&format!(r"(?i)\b(?:{})\b", patterns.join("|")))
                .expect("keyword regex");
            (*name, re)
        })
        .collect()
}

static SERVICE_RES: LazyLock<KeywordTable> = LazyLock::new(|| compile(SERVICES));
static NICHE_RES: LazyLock<KeywordTable> = LazyLock::new(|| compile(NICHES));

static TEAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\b(\d{1,4})\+?\s*",
        r"(?:employees|people|experts|specialists|professionals|team members)\b",
    ))
    .expect("team regex")
});

static CLIENTS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,5})\+?\s*(?:happy\s+|satisfied\s+)?(?:clients|customers|brands)\b")
        .expect("clients regex")
});

static YEARS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,3})\+?\s*years?\s+(?:of\s+experience|in\s+business|of\s+expertise)")
        .expect("years regex")
});

static FOUNDED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:founded|established|since)\s+(?:in\s+)?((?:19|20)\d{2})\b")
        .expect("founded regex")
});

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Derive an agency profile from page text.
///
/// Returns `None` when no service keyword matches, which the enrichment
/// stage treats as "no extractable content".
pub fn derive_profile(text: &str) -> Option<AgencyProfile> {
    let services: Vec<&str> = SERVICE_RES
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(name, _)| *name)
        .collect();

    if services.is_empty() {
        return None;
    }

    Some(AgencyProfile {
        services: services.join(", "),
        niche: best_niche(text),
        notes: size_signals(text),
    })
}

/// The vertical with the most keyword hits; the earlier table entry wins ties.
fn best_niche(text: &str) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for (name, re) in NICHE_RES.iter() {
        let hits = re.find_iter(text).count();
        if hits > 0 && best.is_none_or(|(_, top)| hits > top) {
            best = Some((*name, hits));
        }
    }
    best.map(|(name, _)| name.to_string())
}

fn size_signals(text: &str) -> Option<String> {
    let mut notes = Vec::new();

    if let Some(n) = first_capture(&TEAM_RE, text) {
        notes.push(format!("Team of {n}+"));
    }
    if let Some(n) = first_capture(&CLIENTS_RE, text) {
        notes.push(format!("{n}+ clients"));
    }
    if let Some(n) = first_capture(&YEARS_RE, text) {
        notes.push(format!("{n}+ years in business"));
    }
    if let Some(year) = first_capture(&FOUNDED_RE, text) {
        notes.push(format!("Founded {year}"));
    }

    (!notes.is_empty()).then(|| notes.join(", "))
}

fn first_capture<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
