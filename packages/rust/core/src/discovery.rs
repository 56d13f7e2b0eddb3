//! Discovery stage: seed records from the configured search sources.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use url::Url;

use leadgen_shared::{LeadRecord, SearchCapability, is_tracking_param};

/// Outcome of the discovery stage.
#[derive(Debug)]
pub enum Discovery {
    /// Merged, de-duplicated seeds (possibly empty when every source answered
    /// with nothing).
    Found(Vec<LeadRecord>),
    /// No source could be queried at all.
    Failed { reason: String },
}

/// Query the sources in order, each at most once, merge the hits and keep at
/// most `count` records.
///
/// Sources after the one that fills `count` are not queried. Websites are
/// de-duplicated by [`website_key`]; the first occurrence wins. Hits without
/// a name or website are dropped and do not count toward `count`.
#[instrument(skip_all, fields(country = %country, query = %query, count))]
pub async fn discover(
    country: &str,
    count: usize,
    query: &str,
    sources: &[Arc<dyn SearchCapability>],
) -> Discovery {
    let mut seen = HashSet::new();
    let mut records = Vec::new();
    let mut failures = Vec::new();

    for source in sources {
        if records.len() >= count {
            break;
        }
        let hits = match source.query(country, query, count).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(source = source.name(), error = %e, "search source failed");
                failures.push(e.to_string());
                continue;
            }
        };
        info!(source = source.name(), hits = hits.len(), "search source answered");

        for hit in hits {
            if records.len() >= count {
                break;
            }
            let Ok(record) = LeadRecord::new(hit.name, hit.website, country) else {
                debug!(source = source.name(), "dropping hit without name or website");
                continue;
            };
            if seen.insert(website_key(record.website())) {
                records.push(record);
            }
        }
    }

    if sources.is_empty() {
        return Discovery::Failed {
            reason: "no search sources configured".into(),
        };
    }
    if failures.len() == sources.len() {
        return Discovery::Failed {
            reason: failures.join("; "),
        };
    }

    info!(seeds = records.len(), "discovery complete");
    Discovery::Found(records)
}

/// Identity of a website for de-duplication.
///
/// Ignores case, the scheme, a leading `www.`, trailing slashes, the fragment
/// and referral query parameters. Unparseable input falls back to the
/// trimmed, lower-cased text.
fn website_key(website: &str) -> String {
    let trimmed = website.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let Some(url) = Url::parse(&candidate).ok().filter(|u| u.host_str().is_some()) else {
        return trimmed.trim_end_matches('/').to_lowercase();
    };

    let host = url.host_str().unwrap_or_default();
    let mut key = host.strip_prefix("www.").unwrap_or(host).to_string();
    if let Some(port) = url.port() {
        key.push_str(&format!(":{port}"));
    }
    key.push_str(url.path().trim_end_matches('/'));

    let query: Vec<String> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    if !query.is_empty() {
        key.push('?');
        key.push_str(&query.join("&"));
    }
    key.to_lowercase()
}
