//! Enrichment stage: services, niche and size notes from the agency website.

use tracing::{debug, instrument, warn};

use leadgen_extract::derive_profile;
use leadgen_shared::{
    ContentFetchCapability, EnrichmentStatus, FetchedContent, LeadRecord, RecordStage,
};

/// Link text or path fragments of pages that usually describe what an
/// agency sells.
const SERVICE_PAGE_HINTS: &[&str] = &[
    "services",
    "palvelut",
    "what-we-do",
    "what we do",
    "solutions",
    "about",
    "meista",
];

/// Enrich `record` from its website.
///
/// The homepage is fetched first; when it says nothing about services, one
/// services/about page is fetched and read together with it. Fetch and
/// derivation failures mark the record incomplete and never escape.
#[instrument(skip_all, fields(agency = %record.agency_name(), url = %record.website()))]
pub async fn enrich(
    record: &mut LeadRecord,
    fetch: &dyn ContentFetchCapability,
) -> EnrichmentStatus {
    match fetch.fetch(record.website()).await {
        Ok(home) => {
            let profile = match derive_profile(&home.text) {
                Some(profile) => Some(profile),
                None => {
                    let extra = services_page_text(&home, fetch).await;
                    extra.and_then(|text| derive_profile(&format!("{} {text}", home.text)))
                }
            };

            match profile {
                Some(profile) => {
                    debug!(services = %profile.services, niche = ?profile.niche, "profile derived");
                    record.mark_enriched(Some(profile.services), profile.niche, profile.notes);
                }
                None => {
                    warn!("no services found on website");
                    record.mark_enrichment_failed("no extractable content");
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "website fetch failed");
            record.mark_enrichment_failed(&e.to_string());
        }
    }

    record.advance_to(RecordStage::Enriched);
    record.enrichment_status()
}

async fn services_page_text(
    home: &FetchedContent,
    fetch: &dyn ContentFetchCapability,
) -> Option<String> {
    let link = home.links.iter().find(|link| {
        let text = link.text.to_lowercase();
        let url = link.url.to_lowercase();
        SERVICE_PAGE_HINTS
            .iter()
            .any(|hint| text.contains(hint) || url.contains(hint))
    })?;

    match fetch.fetch(&link.url).await {
        Ok(page) => Some(page.text),
        Err(e) => {
            debug!(url = %link.url, error = %e, "services page fetch failed");
            None
        }
    }
}
