//! Contact stage: decision-maker name and email from the agency website.

use std::collections::HashMap;

use tracing::{debug, instrument, warn};
use url::Url;

use leadgen_extract::{find_decision_maker, find_email, local_part_has_role, role_mentioned_near};
use leadgen_shared::{
    ContactStatus, ContentFetchCapability, EmailExtractionCapability, FetchedContent, LeadRecord,
    PageLink, RecordStage,
};

/// Link text or path fragments of contact, about and team pages.
const CONTACT_HINTS: &[&str] = &[
    "contact",
    "kontakt",
    "yhteystiedot",
    "ota yhteyttä",
    "get-in-touch",
    "get in touch",
    "reach-us",
    "contacto",
    "contato",
    "about",
    "meista",
    "team",
    "tiimi",
];

/// Paths tried when the homepage links to no contact-like page.
const FALLBACK_PATHS: &[&str] = &["/contact", "/contact-us", "/yhteystiedot", "/about"];

/// Limits for the contact search.
#[derive(Debug, Clone, Copy)]
pub struct ContactOptions {
    /// Contact/about pages fetched per record, on top of the homepage.
    pub max_pages: usize,
}

impl Default for ContactOptions {
    fn default() -> Self {
        Self { max_pages: 3 }
    }
}

/// An address seen on one or more fetched pages.
#[derive(Debug)]
struct Candidate {
    email: String,
    /// Index of the first page the address was seen on.
    page: usize,
    /// Shallowest path depth the address was seen at.
    depth: usize,
    /// Position in overall discovery order.
    order: usize,
    role: bool,
}

/// Resolve a decision-maker for `record`.
///
/// Reads the homepage and up to `max_pages` contact-like pages. Among the
/// addresses found, one tied to a role marker wins, then the one on the
/// shallowest page, then the first seen. Fetch failures degrade to
/// `NotFound`; whatever was resolved is kept.
#[instrument(skip_all, fields(agency = %record.agency_name(), url = %record.website()))]
pub async fn find_contact(
    record: &mut LeadRecord,
    fetch: &dyn ContentFetchCapability,
    extract: &dyn EmailExtractionCapability,
    options: ContactOptions,
) -> ContactStatus {
    let pages = collect_pages(record.website(), fetch, options).await;

    let chosen = rank_candidates(&pages, extract);
    let name = match &chosen {
        Some(candidate) => {
            let text = &pages[candidate.page].text;
            find_decision_maker(text, find_email(text, &candidate.email))
                .or_else(|| first_name_on(&pages))
        }
        None => first_name_on(&pages),
    };

    debug!(
        pages = pages.len(),
        email = ?chosen.as_ref().map(|c| c.email.as_str()),
        name = ?name,
        "contact search finished"
    );

    let status = record.record_contact(name, chosen.map(|c| c.email));
    record.advance_to(RecordStage::ContactResolved);
    status
}

/// Homepage first, then contact-like pages. Failed fetches are skipped.
async fn collect_pages(
    website: &str,
    fetch: &dyn ContentFetchCapability,
    options: ContactOptions,
) -> Vec<FetchedContent> {
    let home = match fetch.fetch(website).await {
        Ok(home) => home,
        Err(e) => {
            warn!(error = %e, "homepage fetch failed");
            return Vec::new();
        }
    };

    let mut targets = contact_links(&home.links, options.max_pages);
    if targets.is_empty() {
        targets = fallback_urls(&home, website, options.max_pages);
    }

    let mut pages = vec![home];
    for url in targets {
        match fetch.fetch(&url).await {
            Ok(page) => pages.push(page),
            Err(e) => debug!(url = %url, error = %e, "contact page fetch failed"),
        }
    }
    pages
}

fn contact_links(links: &[PageLink], limit: usize) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for link in links {
        if urls.len() >= limit {
            break;
        }
        let text = link.text.to_lowercase();
        let url = link.url.to_lowercase();
        let is_contact = CONTACT_HINTS
            .iter()
            .any(|hint| text.contains(hint) || url.contains(hint));
        if is_contact && !urls.contains(&link.url) {
            urls.push(link.url.clone());
        }
    }
    urls
}

fn fallback_urls(home: &FetchedContent, website: &str, limit: usize) -> Vec<String> {
    let Ok(base) = Url::parse(&home.url).or_else(|_| Url::parse(website)) else {
        return Vec::new();
    };
    FALLBACK_PATHS
        .iter()
        .filter_map(|path| base.join(path).ok())
        .map(String::from)
        .take(limit)
        .collect()
}

fn rank_candidates(
    pages: &[FetchedContent],
    extract: &dyn EmailExtractionCapability,
) -> Option<Candidate> {
    let mut found: Vec<Candidate> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (page_idx, page) in pages.iter().enumerate() {
        let depth = path_depth(&page.url);
        for email in extract.extract(&page.text) {
            let role = local_part_has_role(&email) || role_mentioned_near(&page.text, &email);
            match index.get(&email) {
                Some(&i) => {
                    let existing = &mut found[i];
                    existing.role |= role;
                    existing.depth = existing.depth.min(depth);
                }
                None => {
                    index.insert(email.clone(), found.len());
                    found.push(Candidate {
                        email,
                        page: page_idx,
                        depth,
                        order: found.len(),
                        role,
                    });
                }
            }
        }
    }

    found
        .into_iter()
        .min_by_key(|c| (!c.role, c.depth, c.order))
}

fn first_name_on(pages: &[FetchedContent]) -> Option<String> {
    pages.iter().find_map(|p| find_decision_maker(&p.text, None))
}

/// Number of non-empty path segments; the homepage is 0.
fn path_depth(url: &str) -> usize {
    Url::parse(url)
        .ok()
        .and_then(|u| u.path_segments().map(|s| s.filter(|seg| !seg.is_empty()).count()))
        .unwrap_or(0)
}
