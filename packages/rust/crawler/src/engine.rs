//! Polite HTTP page fetcher.
//!
//! Requests to the same host are spaced at least `rate_limit_ms` apart and
//! transient failures are retried with backoff. Private or non-HTTP targets
//! are refused before any request is made and again on every redirect hop.
//! Bodies are read up to `max_body_bytes`.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::{Attempt, Policy};
use reqwest::{Client, Response};
use scraper::Html;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use url::Url;

use leadgen_shared::{
    ContentFetchCapability, FetchConfig, FetchFailure, FetchedContent, LeadGenError, Result,
    with_retry,
};

use crate::html::{extract_links, html_to_text};

/// User-Agent string for fetch requests.
const USER_AGENT: &str = concat!("leadgen/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

// ---------------------------------------------------------------------------
// HttpFetcher
// ---------------------------------------------------------------------------

/// [`ContentFetchCapability`] backed by `reqwest`.
pub struct HttpFetcher {
    config: FetchConfig,
    client: Client,
    pacer: HostPacer,
}

impl HttpFetcher {
    /// Create a fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self> {
        let allow_private = config.allow_private_hosts;
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(Policy::custom(move |attempt| follow_redirect(attempt, allow_private)))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LeadGenError::Network(format!("failed to build HTTP client: {e}")))?;

        let pacer = HostPacer::new(Duration::from_millis(config.rate_limit_ms));
        Ok(Self {
            config,
            client,
            pacer,
        })
    }

    async fn fetch_once(&self, url: &Url) -> Result<FetchedContent> {
        if let Some(host) = url.host_str() {
            self.pacer.wait(host).await;
        }
        debug!(%url, "fetching page");

        let response = self
            .client
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

        let final_url = response.url().clone();
        let body = read_capped(response, self.config.max_body_bytes)
            .await
            .map_err(|e| request_error(url.as_str(), &e))?;

        Ok(parse_page(&body, &final_url, self.config.max_text_chars))
    }
}

/// Read at most `limit` bytes of the body; the rest is never downloaded.
async fn read_capped(mut response: Response, limit: usize) -> reqwest::Result<String> {
    let mut buf: Vec<u8> = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let room = limit.saturating_sub(buf.len());
        if chunk.len() >= room {
            buf.extend_from_slice(&chunk[..room]);
            debug!(limit, "response body truncated");
            break;
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn follow_redirect(attempt: Attempt<'_>, allow_private: bool) -> reqwest::redirect::Action {
    match redirect_refusal(attempt.url(), attempt.previous().len(), allow_private) {
        Some(reason) => {
            warn!(to = %attempt.url(), reason, "redirect refused");
            attempt.error(reason)
        }
        None => attempt.follow(),
    }
}

/// Why a redirect to `target` must not be followed, if it must not.
/// `hops` counts the requests already made in this chain.
fn redirect_refusal(target: &Url, hops: usize, allow_private: bool) -> Option<&'static str> {
    if hops >= MAX_REDIRECTS {
        Some("too many redirects")
    } else if !matches!(target.scheme(), "http" | "https") {
        Some("redirect to non-http target")
    } else if !allow_private && is_ssrf_target(target) {
        Some("redirect to private target")
    } else {
        None
    }
}

#[async_trait]
impl ContentFetchCapability for HttpFetcher {
    #[instrument(skip_all, fields(url = %url))]
    async fn fetch(&self, url: &str) -> Result<FetchedContent> {
        let parsed = parse_target(url)?;

        // Check SSRF
        if !self.config.allow_private_hosts && is_ssrf_target(&parsed) {
            warn!(%url, "SSRF protection: blocked");
            return Err(LeadGenError::fetch(
                url,
                FetchFailure::Unreachable("private or non-http target refused".into()),
            ));
        }

        with_retry(&self.config.retry, url, || self.fetch_once(&parsed)).await
    }
}

/// Parse a website string, assuming `https://` when no scheme is given.
fn parse_target(url: &str) -> Result<Url> {
    let trimmed = url.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    Url::parse(&candidate).map_err(|e| {
        LeadGenError::fetch(url, FetchFailure::Unreachable(format!("invalid URL: {e}")))
    })
}

fn request_error(url: &str, e: &reqwest::Error) -> LeadGenError {
    let reason = if e.is_timeout() {
        FetchFailure::Timeout
    } else {
        FetchFailure::Unreachable(e.to_string())
    };
    LeadGenError::fetch(url, reason)
}

/// Turn a response body into text and same-site links.
fn parse_page(body: &str, url: &Url, max_text_chars: usize) -> FetchedContent {
    let doc = Html::parse_document(body);
    FetchedContent {
        url: url.to_string(),
        text: html_to_text(&doc, max_text_chars),
        links: extract_links(&doc, url),
    }
}

// ---------------------------------------------------------------------------
// Per-host pacing
// ---------------------------------------------------------------------------

/// Hands out request slots per host, at least `interval` apart.
struct HostPacer {
    interval: Duration,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl HostPacer {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    /// Wait until `host` may be contacted again.
    async fn wait(&self, host: &str) {
        if self.interval.is_zero() {
            return;
        }

        let slot = {
            let mut slots = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = slots.get(host).copied().filter(|s| *s > now).unwrap_or(now);
            slots.insert(host.to_string(), slot + self.interval);
            slot
        };

        tokio::time::sleep_until(slot).await;
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
pub fn is_ssrf_target(url: &Url) -> bool {
    // Block non-HTTP schemes
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    match url.host() {
        Some(url::Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(url::Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(url::Host::Domain(host)) => {
            host == "localhost" || host.ends_with(".local") || host.ends_with(".internal")
        }
        None => true,
    }
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique local, fe80::/10 link-local
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}
