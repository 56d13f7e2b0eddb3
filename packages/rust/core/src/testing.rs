//! In-memory capability fakes shared by the stage and runner tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use leadgen_shared::{
    ContentFetchCapability, ExportCapability, ExportRow, FetchFailure, FetchedContent,
    GenerationRequest, LeadGenError, PageLink, Result, SearchCapability, SearchHit,
    TextGenerationCapability,
};

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

pub struct FakeSearch {
    name: String,
    hits: Option<Vec<SearchHit>>,
    queries: AtomicUsize,
}

impl FakeSearch {
    pub fn returning(name: &str, hits: &[(&str, &str)]) -> Self {
        Self {
            name: name.into(),
            hits: Some(
                hits.iter()
                    .map(|(n, w)| SearchHit {
                        name: (*n).into(),
                        website: (*w).into(),
                    })
                    .collect(),
            ),
            queries: AtomicUsize::new(0),
        }
    }

    pub fn unavailable(name: &str) -> Self {
        Self {
            name: name.into(),
            hits: None,
            queries: AtomicUsize::new(0),
        }
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchCapability for FakeSearch {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(&self, _country: &str, _query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        match &self.hits {
            Some(hits) => Ok(hits.iter().take(limit).cloned().collect()),
            None => Err(LeadGenError::SourceUnavailable {
                provider: self.name.clone(),
                message: "listing returned HTTP 503".into(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Fetch
// ---------------------------------------------------------------------------

/// Serves canned pages by exact URL; anything else is a 404.
#[derive(Default)]
pub struct FakeFetch {
    pages: HashMap<String, FetchedContent>,
    failures: HashMap<String, FetchFailure>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetch {
    pub fn page(mut self, url: &str, text: &str, links: &[(&str, &str)]) -> Self {
        self.pages.insert(
            url.into(),
            FetchedContent {
                url: url.into(),
                text: text.into(),
                links: links
                    .iter()
                    .map(|(u, t)| PageLink {
                        url: (*u).into(),
                        text: (*t).into(),
                    })
                    .collect(),
            },
        );
        self
    }

    pub fn failing(mut self, url: &str, reason: FetchFailure) -> Self {
        self.failures.insert(url.into(), reason);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentFetchCapability for FakeFetch {
    async fn fetch(&self, url: &str) -> Result<FetchedContent> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(reason) = self.failures.get(url) {
            return Err(LeadGenError::fetch(url, reason.clone()));
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| LeadGenError::fetch(url, FetchFailure::HttpStatus(404)))
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

pub struct FakeGenerate {
    reply: Option<String>,
    prompts: Mutex<Vec<GenerationRequest>>,
}

impl FakeGenerate {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<GenerationRequest> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerationCapability for FakeGenerate {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.prompts.lock().unwrap().push(request.clone());
        self.reply.clone().ok_or_else(|| LeadGenError::Generation {
            message: "rate limited".into(),
            status: Some(429),
        })
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryExport {
    rows: Mutex<Vec<ExportRow>>,
    broken: bool,
}

impl MemoryExport {
    pub fn broken() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            broken: true,
        }
    }

    pub fn rows(&self) -> Vec<ExportRow> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExportCapability for MemoryExport {
    fn location(&self) -> String {
        "memory".into()
    }

    async fn write(&self, rows: &[ExportRow]) -> Result<usize> {
        if self.broken {
            return Err(LeadGenError::Export("disk full".into()));
        }
        self.rows.lock().unwrap().extend_from_slice(rows);
        Ok(rows.len())
    }
}
