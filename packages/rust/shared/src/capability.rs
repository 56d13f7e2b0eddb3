//! Narrow interfaces to the external collaborators the pipeline consumes.
//!
//! Stages only see these traits; the concrete scrapers, fetcher, LLM client
//! and exporters live in their own crates and are picked at construction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::ExportRow;

/// One agency returned by a search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub name: String,
    pub website: String,
}

/// A hyperlink found on a fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    /// Absolute URL, fragment stripped.
    pub url: String,
    /// Visible anchor text, trimmed.
    pub text: String,
}

/// Readable text and same-site links of a fetched page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedContent {
    /// Final URL after redirects.
    pub url: String,
    pub text: String,
    pub links: Vec<PageLink>,
}

/// A prompt for the text-generation backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub system: String,
    pub prompt: String,
}

/// Looks up agencies for a country and query.
#[async_trait]
pub trait SearchCapability: Send + Sync {
    /// Provider name used in logs and errors.
    fn name(&self) -> &str;

    /// Return up to `limit` agencies. Fails with `SourceUnavailable` when the
    /// provider cannot be queried at all.
    async fn query(&self, country: &str, query: &str, limit: usize) -> Result<Vec<SearchHit>>;
}

/// Fetches a page and returns its text and links.
#[async_trait]
pub trait ContentFetchCapability: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedContent>;
}

/// Pulls email-like strings out of text.
pub trait EmailExtractionCapability: Send + Sync {
    /// Distinct addresses in document order.
    fn extract(&self, text: &str) -> Vec<String>;
}

/// Produces text from a prompt.
#[async_trait]
pub trait TextGenerationCapability: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Persists export rows. Append-only; creates its target if absent.
#[async_trait]
pub trait ExportCapability: Send + Sync {
    /// Human-readable target, e.g. a file path or a spreadsheet id.
    fn location(&self) -> String;

    /// Append `rows`, returning how many were written.
    async fn write(&self, rows: &[ExportRow]) -> Result<usize>;
}
