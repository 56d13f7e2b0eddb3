//! Agency directory page parsers.
//!
//! Both directories render server-side listings:
//! - Clutch: `div.provider-info` blocks with an `h3.company_title` and an
//!   `a.website-link` (often a tracking redirect wrapping the real URL)
//! - Sortlist: `div.agency-card` blocks with an `h3` and a link to the
//!   agency's profile page, which carries the outbound website link

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use leadgen_shared::{SearchHit, is_tracking_param};

// ---------------------------------------------------------------------------
// Selectors (compiled once)
// ---------------------------------------------------------------------------

static CLUTCH_LISTING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.provider-info").expect("clutch listing selector"));

static CLUTCH_NAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h3.company_title").expect("clutch name selector"));

static CLUTCH_WEBSITE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.website-link[href]").expect("clutch website selector"));

static SORTLIST_CARD: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.agency-card").expect("sortlist card selector"));

static HEADING: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h3").expect("h3 selector"));

static ANY_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("link selector"));

static OUTBOUND_LINK: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"a[rel~="nofollow"][target="_blank"][href]"#).expect("outbound selector")
});

/// Query parameters that tracking redirects use for the destination.
const REDIRECT_PARAMS: &[&str] = &["u", "url", "to", "target", "dest"];

// ---------------------------------------------------------------------------
// Clutch
// ---------------------------------------------------------------------------

/// Parse a Clutch listing page into search hits, in page order.
pub(crate) fn parse_clutch_listing(html: &str, page_url: &Url) -> Vec<SearchHit> {
    let doc = Html::parse_document(html);
    let mut hits = Vec::new();

    for listing in doc.select(&CLUTCH_LISTING) {
        let name = listing.select(&CLUTCH_NAME).next().map(element_text);
        let website = listing
            .select(&CLUTCH_WEBSITE)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| resolve_website(href, page_url));

        match (name, website) {
            (Some(name), Some(website)) if !name.is_empty() => {
                hits.push(SearchHit { name, website });
            }
            _ => tracing::debug!("skipping incomplete Clutch listing"),
        }
    }

    hits
}

// ---------------------------------------------------------------------------
// Sortlist
// ---------------------------------------------------------------------------

/// An agency card from a Sortlist search page: name and profile URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SortlistCard {
    pub name: String,
    pub profile_url: String,
}

/// Parse a Sortlist search page into agency cards, in page order.
pub(crate) fn parse_sortlist_cards(html: &str, page_url: &Url) -> Vec<SortlistCard> {
    let doc = Html::parse_document(html);

    doc.select(&SORTLIST_CARD)
        .filter_map(|card| {
            let name = card.select(&HEADING).next().map(element_text)?;
            let href = card.select(&ANY_LINK).next()?.value().attr("href")?;
            let profile_url = page_url.join(href.trim()).ok()?;
            (!name.is_empty()).then(|| SortlistCard {
                name,
                profile_url: profile_url.to_string(),
            })
        })
        .collect()
}

/// The agency's own website from a Sortlist profile page.
pub(crate) fn parse_sortlist_website(html: &str, page_url: &Url) -> Option<String> {
    let doc = Html::parse_document(html);
    doc.select(&OUTBOUND_LINK)
        .filter_map(|a| a.value().attr("href"))
        .find_map(|href| resolve_website(href, page_url))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn element_text(el: ElementRef<'_>) -> String {
    let raw = el.text().collect::<Vec<_>>().join(" ");
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve `href` against the page and unwrap tracking redirects to the
/// destination website, dropping referral parameters and the fragment.
/// Only http(s) results are accepted.
fn resolve_website(href: &str, page_url: &Url) -> Option<String> {
    let resolved = page_url.join(href.trim()).ok()?;

    let unwrapped = resolved
        .query_pairs()
        .find(|(key, _)| REDIRECT_PARAMS.contains(&key.as_ref()))
        .and_then(|(_, value)| Url::parse(&value).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https"));
    let mut target = unwrapped.unwrap_or(resolved);

    if !matches!(target.scheme(), "http" | "https") {
        return None;
    }
    target.set_fragment(None);
    strip_tracking_params(&mut target);
    Some(target.to_string())
}

fn strip_tracking_params(url: &mut Url) {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
}
