//! Agency directory search providers.
//!
//! Each provider implements [`SearchCapability`] by scraping a public agency
//! directory listing for the configured country and service:
//! - [`ClutchSource`] reads name and website straight off the listing page
//! - [`SortlistSource`] reads agency cards, then visits each profile page
//!   for the outbound website link

mod parser;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, instrument, warn};
use url::Url;

use leadgen_shared::{
    AppConfig, FetchFailure, LeadGenError, Result, RetryPolicy, SearchCapability, SearchHit,
    with_retry,
};

/// Maximum number of redirects to follow for directory pages.
const MAX_REDIRECTS: usize = 5;

/// Browser-like User-Agent; directories serve bots an empty shell.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

const DEFAULT_CLUTCH_URL: &str = "https://clutch.co";
const DEFAULT_SORTLIST_URL: &str = "https://www.sortlist.com";

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Settings shared by all directory providers.
#[derive(Debug, Clone)]
pub struct SourceOptions {
    /// Timeout for HTTP requests in seconds.
    pub timeout_secs: u64,
    /// Pause between consecutive requests to the same directory.
    pub rate_limit_ms: u64,
    pub retry: RetryPolicy,
    pub clutch_base_url: String,
    pub sortlist_base_url: String,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for SourceOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            timeout_secs: config.http.timeout_secs,
            rate_limit_ms: config.http.rate_limit_ms,
            retry: config.http.retry.clone(),
            clutch_base_url: DEFAULT_CLUTCH_URL.into(),
            sortlist_base_url: DEFAULT_SORTLIST_URL.into(),
        }
    }
}

/// Map configured source names to provider instances, in order.
pub fn build_sources(
    names: &[String],
    options: &SourceOptions,
) -> Result<Vec<Arc<dyn SearchCapability>>> {
    let client = build_client(options)?;

    names
        .iter()
        .map(|name| -> Result<Arc<dyn SearchCapability>> {
            match name.trim().to_lowercase().as_str() {
                "clutch" => Ok(Arc::new(ClutchSource::new(client.clone(), options.clone()))),
                "sortlist" => Ok(Arc::new(SortlistSource::new(client.clone(), options.clone()))),
                other => Err(LeadGenError::config(format!("unknown search source: {other}"))),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Clutch
// ---------------------------------------------------------------------------

/// Clutch.co agency listings.
pub struct ClutchSource {
    client: Client,
    options: SourceOptions,
}

impl ClutchSource {
    pub fn new(client: Client, options: SourceOptions) -> Self {
        Self { client, options }
    }
}

#[async_trait]
impl SearchCapability for ClutchSource {
    fn name(&self) -> &str {
        "clutch"
    }

    #[instrument(skip_all, fields(source = "clutch", country = %country))]
    async fn query(&self, country: &str, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let listing_url = directory_url(
            &self.options.clutch_base_url,
            &format!("agencies/{}/{}", service_slug(query), slugify(country)),
        )
        .map_err(|e| unavailable(self.name(), e))?;

        let html = fetch_html(&self.client, &listing_url, &self.options.retry)
            .await
            .map_err(|e| unavailable(self.name(), e))?;

        let mut hits = parser::parse_clutch_listing(&html, &listing_url);
        hits.truncate(limit);

        info!(found = hits.len(), "Clutch listing parsed");
        Ok(hits)
    }
}

// ---------------------------------------------------------------------------
// Sortlist
// ---------------------------------------------------------------------------

/// Sortlist agency search.
pub struct SortlistSource {
    client: Client,
    options: SourceOptions,
}

impl SortlistSource {
    pub fn new(client: Client, options: SourceOptions) -> Self {
        Self { client, options }
    }
}

#[async_trait]
impl SearchCapability for SortlistSource {
    fn name(&self) -> &str {
        "sortlist"
    }

    #[instrument(skip_all, fields(source = "sortlist", country = %country))]
    async fn query(&self, country: &str, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let search_url = directory_url(
            &self.options.sortlist_base_url,
            &format!("s/{}/{}", slugify(country), service_slug(query)),
        )
        .map_err(|e| unavailable(self.name(), e))?;

        let html = fetch_html(&self.client, &search_url, &self.options.retry)
            .await
            .map_err(|e| unavailable(self.name(), e))?;

        let cards = parser::parse_sortlist_cards(&html, &search_url);
        debug!(cards = cards.len(), "Sortlist search page parsed");

        let pause = Duration::from_millis(self.options.rate_limit_ms);
        let mut hits = Vec::new();

        for (i, card) in cards.into_iter().enumerate() {
            if hits.len() >= limit {
                break;
            }
            if i > 0 && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }

            let Ok(profile_url) = Url::parse(&card.profile_url) else {
                continue;
            };
            let profile = match fetch_html(&self.client, &profile_url, &self.options.retry).await {
                Ok(html) => html,
                Err(e) => {
                    warn!(agency = %card.name, error = %e, "skipping Sortlist profile");
                    continue;
                }
            };

            match parser::parse_sortlist_website(&profile, &profile_url) {
                Some(website) => hits.push(SearchHit {
                    name: card.name,
                    website,
                }),
                None => debug!(agency = %card.name, "no website on Sortlist profile"),
            }
        }

        info!(found = hits.len(), "Sortlist search parsed");
        Ok(hits)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a reqwest client with appropriate settings.
fn build_client(options: &SourceOptions) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(Duration::from_secs(options.timeout_secs))
        .build()
        .map_err(|e| LeadGenError::Network(format!("failed to build HTTP client: {e}")))
}

/// Fetch a directory page body, retrying transient failures.
async fn fetch_html(client: &Client, url: &Url, retry: &RetryPolicy) -> Result<String> {
    with_retry(retry, url.as_str(), || async {
        let response = client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| request_error(url.as_str(), &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LeadGenError::fetch(
                url.as_str(),
                FetchFailure::HttpStatus(status.as_u16()),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| request_error(url.as_str(), &e))
    })
    .await
}

fn request_error(url: &str, e: &reqwest::Error) -> LeadGenError {
    let reason = if e.is_timeout() {
        FetchFailure::Timeout
    } else {
        FetchFailure::Unreachable(e.to_string())
    };
    LeadGenError::fetch(url, reason)
}

fn unavailable(provider: &str, e: LeadGenError) -> LeadGenError {
    LeadGenError::SourceUnavailable {
        provider: provider.to_string(),
        message: e.to_string(),
    }
}

/// Join a directory path onto a configured base URL.
fn directory_url(base: &str, path: &str) -> Result<Url> {
    let base = format!("{}/", base.trim_end_matches('/'));
    Url::parse(&base)
        .and_then(|b| b.join(path))
        .map_err(|e| LeadGenError::config(format!("invalid directory URL {base}{path}: {e}")))
}

/// Generate a URL-safe slug from free text.
pub(crate) fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Directory category slug for a search query, without a trailing
/// "agency"/"agencies".
pub(crate) fn service_slug(query: &str) -> String {
    let slug = slugify(query);
    for suffix in ["-agencies", "-agency"] {
        if let Some(stripped) = slug.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options_for(server: &MockServer) -> SourceOptions {
        SourceOptions {
            timeout_secs: 5,
            rate_limit_ms: 0,
            retry: RetryPolicy {
                max_attempts: 2,
                base_delay_ms: 1,
                max_delay_ms: 1,
            },
            clutch_base_url: server.uri(),
            sortlist_base_url: server.uri(),
        }
    }

    #[test]
    fn slugs_from_query_and_country() {
        assert_eq!(
            service_slug("social media marketing agency"),
            "social-media-marketing"
        );
        assert_eq!(service_slug("SEO Agencies"), "seo");
        assert_eq!(service_slug("branding"), "branding");
        assert_eq!(slugify("United Kingdom"), "united-kingdom");
    }

    #[test]
    fn unknown_source_is_config_error() {
        let names = vec!["clutch".to_string(), "yelp".to_string()];
        let err = build_sources(&names, &SourceOptions::default())
            .err()
            .expect("unknown source rejected");
        assert!(matches!(err, LeadGenError::Config { .. }));
    }

    #[test]
    fn known_sources_build_in_order() {
        let names = vec!["Sortlist".to_string(), "clutch".to_string()];
        let sources = build_sources(&names, &SourceOptions::default()).unwrap();
        let built: Vec<&str> = sources.iter().map(|s| s.name()).collect();
        assert_eq!(built, ["sortlist", "clutch"]);
    }

    #[tokio::test]
    async fn clutch_query_with_mock_server() {
        let server = MockServer::start().await;
        let listing = r#"<html><body>
            <div class="provider-info">
                <h3 class="company_title">Pixel Post</h3>
                <a class="website-link" href="https://pixelpost.fi">Visit</a>
            </div>
            <div class="provider-info">
                <h3 class="company_title">Nordic Buzz</h3>
                <a class="website-link" href="https://nordicbuzz.com">Visit</a>
            </div>
        </body></html>"#;

        Mock::given(method("GET"))
            .and(path("/agencies/social-media-marketing/finland"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing))
            .mount(&server)
            .await;

        let client = build_client(&options_for(&server)).unwrap();
        let source = ClutchSource::new(client, options_for(&server));
        let hits = source
            .query("Finland", "social media marketing agency", 1)
            .await
            .unwrap();

        assert_eq!(
            hits,
            vec![SearchHit {
                name: "Pixel Post".into(),
                website: "https://pixelpost.fi/".into(),
            }]
        );
    }

    #[tokio::test]
    async fn clutch_unreachable_listing_is_source_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = build_client(&options_for(&server)).unwrap();
        let source = ClutchSource::new(client, options_for(&server));
        let err = source.query("Finland", "seo", 10).await.unwrap_err();

        match err {
            LeadGenError::SourceUnavailable { provider, message } => {
                assert_eq!(provider, "clutch");
                assert!(message.contains("HTTP 503"));
            }
            other => panic!("expected SourceUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn sortlist_follows_profiles_and_skips_failures() {
        let server = MockServer::start().await;
        let search = r#"
            <div class="agency-card"><a href="/agency/nordic-buzz"><h3>Nordic Buzz</h3></a></div>
            <div class="agency-card"><a href="/agency/broken"><h3>Broken Profile</h3></a></div>
            <div class="agency-card"><a href="/agency/pixel"><h3>Pixel Post</h3></a></div>
        "#;

        Mock::given(method("GET"))
            .and(path("/s/finland/social-media-marketing"))
            .respond_with(ResponseTemplate::new(200).set_body_string(search))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/agency/nordic-buzz"))
            .respond_with(ResponseTemplate::new(200).set_body_string(concat!(
                r#"<a href="https://nordicbuzz.com" "#,
                r#"rel="nofollow noopener" target="_blank">Site</a>"#,
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/agency/broken"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/agency/pixel"))
            .respond_with(ResponseTemplate::new(200).set_body_string(concat!(
                r#"<a href="https://pixelpost.fi" "#,
                r#"rel="nofollow noopener" target="_blank">Site</a>"#,
            )))
            .mount(&server)
            .await;

        let client = build_client(&options_for(&server)).unwrap();
        let source = SortlistSource::new(client, options_for(&server));
        let hits = source
            .query("Finland", "social media marketing agency", 10)
            .await
            .unwrap();

        let names: Vec<&str> = hits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, ["Nordic Buzz", "Pixel Post"]);
        assert_eq!(hits[1].website, "https://pixelpost.fi/");
    }
}
