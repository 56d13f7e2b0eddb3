//! End-to-end run: discovery → enrichment → contact → outreach → scoring/export.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Serialize, Serializer};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use leadgen_shared::{
    AppConfig, ContactStatus, ContentFetchCapability, EmailExtractionCapability,
    EnrichmentStatus, ExportCapability, LeadGenError, LeadRecord, Result, SearchCapability,
    TextGenerationCapability,
};

use crate::contact::{self, ContactOptions};
use crate::discovery::{self, Discovery};
use crate::enrichment;
use crate::outreach::{self, OutreachTemplate};
use crate::scoring::{self, ExportStatus, TierCounts};

/// Parameters of one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub country: String,
    /// Leads to collect.
    pub count: usize,
    pub query: String,
    /// Records processed at once inside a stage.
    pub concurrency: usize,
    pub contact: ContactOptions,
    pub outreach: OutreachTemplate,
}

impl From<&AppConfig> for RunConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            country: config.search.country.clone(),
            count: config.search.count,
            query: config.search.query.clone(),
            concurrency: config.pipeline.concurrency,
            contact: ContactOptions {
                max_pages: config.pipeline.contact_pages,
            },
            outreach: OutreachTemplate::from(&config.outreach),
        }
    }
}

/// The external collaborators a run uses, chosen by the caller.
#[derive(Clone)]
pub struct Capabilities {
    pub sources: Vec<Arc<dyn SearchCapability>>,
    pub fetch: Arc<dyn ContentFetchCapability>,
    pub extract: Arc<dyn EmailExtractionCapability>,
    pub generate: Arc<dyn TextGenerationCapability>,
    pub export: Arc<dyn ExportCapability>,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a record finished a stage.
    fn record_done(&self, stage: &str, agency: &str, current: usize, total: usize);
    /// Called when the run completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn record_done(&self, _stage: &str, _agency: &str, _current: usize, _total: usize) {}
    fn done(&self, _summary: &RunSummary) {}
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// What a run did, for the terminal and for `--summary-json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    #[serde(rename = "elapsed_secs", serialize_with = "as_secs")]
    pub elapsed: Duration,
    pub country: String,
    pub query: String,
    pub requested: usize,
    pub discovered: usize,
    pub enrichment_complete: usize,
    pub enrichment_incomplete: usize,
    pub contact_found: usize,
    pub contact_not_found: usize,
    pub outreach_generated: usize,
    pub outreach_failed: usize,
    pub tiers: TierCounts,
    pub cancelled: bool,
    pub export: ExportStatus,
}

fn as_secs<S: Serializer>(elapsed: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(elapsed.as_secs_f64())
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.cancelled { " (cancelled)" } else { "" };
        writeln!(f, "Run {}{state}", self.run_id)?;
        writeln!(f, "  country      {}", self.country)?;
        writeln!(f, "  query        {}", self.query)?;
        writeln!(f, "  discovered   {} of {} requested", self.discovered, self.requested)?;
        writeln!(
            f,
            "  enrichment   {} complete, {} incomplete",
            self.enrichment_complete, self.enrichment_incomplete
        )?;
        writeln!(
            f,
            "  contacts     {} found, {} not found",
            self.contact_found, self.contact_not_found
        )?;
        writeln!(
            f,
            "  outreach     {} generated, {} failed",
            self.outreach_generated, self.outreach_failed
        )?;
        writeln!(f, "  lead scores  {}", self.tiers)?;
        writeln!(f, "  export       {}", self.export)?;
        write!(f, "  elapsed      {:.1}s", self.elapsed.as_secs_f64())
    }
}

/// Per-stage tallies gathered while the batch moves through the stages.
#[derive(Debug, Default, Clone, Copy)]
struct StageCounts {
    enrichment_complete: usize,
    enrichment_incomplete: usize,
    contact_found: usize,
    contact_not_found: usize,
    outreach_generated: usize,
    outreach_failed: usize,
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Run the full pipeline.
///
/// 1. Discovery: seed records from every source
/// 2. Enrichment, contact and outreach, each over the whole batch
/// 3. Scoring and export of every record
///
/// Only configuration problems and an empty discovery end the run early.
/// After `cancel` fires no new per-record work starts, but every record
/// gathered so far is still scored and exported.
#[instrument(
    skip_all,
    fields(country = %config.country, query = %config.query, count = config.count)
)]
pub async fn run_pipeline(
    config: &RunConfig,
    caps: &Capabilities,
    progress: &dyn ProgressReporter,
    cancel: &CancellationToken,
) -> Result<RunSummary> {
    if config.count == 0 {
        return Err(LeadGenError::config("count must be at least 1"));
    }
    if config.concurrency == 0 {
        return Err(LeadGenError::config("concurrency must be at least 1"));
    }

    let start = Instant::now();
    let run_id = Uuid::now_v7();
    let started_at = Utc::now();

    info!(%run_id, "starting lead generation run");

    // --- Phase 1: Discovery ---
    progress.phase("Discovering agencies");
    let found = tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        outcome = discovery::discover(
            &config.country,
            config.count,
            &config.query,
            &caps.sources,
        ) => Some(outcome),
    };

    let records = match found {
        Some(Discovery::Found(records)) if !records.is_empty() => records,
        Some(Discovery::Found(_)) => {
            return Err(LeadGenError::DiscoveryFailed {
                message: format!(
                    "no agencies found for \"{}\" in {}",
                    config.query, config.country
                ),
            });
        }
        Some(Discovery::Failed { reason }) => {
            return Err(LeadGenError::DiscoveryFailed { message: reason });
        }
        None => {
            warn!("cancelled during discovery");
            Vec::new()
        }
    };
    let discovered = records.len();

    // --- Phases 2-4: per-record stages ---
    let (mut records, counts) = run_stages(records, config, caps, progress, cancel).await;

    // --- Phase 5: Scoring and export ---
    progress.phase("Scoring and exporting");
    let (tiers, export) = scoring::score_and_export(&mut records, caps.export.as_ref()).await;

    let summary = RunSummary {
        run_id,
        started_at,
        elapsed: start.elapsed(),
        country: config.country.clone(),
        query: config.query.clone(),
        requested: config.count,
        discovered,
        enrichment_complete: counts.enrichment_complete,
        enrichment_incomplete: counts.enrichment_incomplete,
        contact_found: counts.contact_found,
        contact_not_found: counts.contact_not_found,
        outreach_generated: counts.outreach_generated,
        outreach_failed: counts.outreach_failed,
        tiers,
        cancelled: cancel.is_cancelled(),
        export,
    };

    progress.done(&summary);

    info!(
        %run_id,
        discovered,
        hot = tiers.hot,
        warm = tiers.warm,
        cold = tiers.cold,
        cancelled = summary.cancelled,
        elapsed_ms = summary.elapsed.as_millis(),
        "lead generation run complete"
    );

    Ok(summary)
}

/// Enrichment, contact and outreach, stage-major.
async fn run_stages(
    records: Vec<LeadRecord>,
    config: &RunConfig,
    caps: &Capabilities,
    progress: &dyn ProgressReporter,
    cancel: &CancellationToken,
) -> (Vec<LeadRecord>, StageCounts) {
    let mut counts = StageCounts::default();
    let workers = config.concurrency;
    let fetch = caps.fetch.as_ref();
    let extract = caps.extract.as_ref();
    let generate = caps.generate.as_ref();

    progress.phase("Enriching agency profiles");
    let (records, outcomes): (Vec<_>, Vec<_>) = for_each_record(
        "enrichment",
        records,
        workers,
        cancel,
        progress,
        move |mut record| async move {
            let status = enrichment::enrich(&mut record, fetch).await;
            (record, status)
        },
    )
    .await
    .into_iter()
    .unzip();
    for status in outcomes.into_iter().flatten() {
        match status {
            EnrichmentStatus::Complete => counts.enrichment_complete += 1,
            _ => counts.enrichment_incomplete += 1,
        }
    }
    info!(
        complete = counts.enrichment_complete,
        incomplete = counts.enrichment_incomplete,
        "enrichment stage finished"
    );

    progress.phase("Finding decision-makers");
    let options = config.contact;
    let (records, outcomes): (Vec<_>, Vec<_>) = for_each_record(
        "contact",
        records,
        workers,
        cancel,
        progress,
        move |mut record| async move {
            let status = contact::find_contact(&mut record, fetch, extract, options).await;
            (record, status)
        },
    )
    .await
    .into_iter()
    .unzip();
    for status in outcomes.into_iter().flatten() {
        match status {
            ContactStatus::Found => counts.contact_found += 1,
            _ => counts.contact_not_found += 1,
        }
    }
    info!(
        found = counts.contact_found,
        not_found = counts.contact_not_found,
        "contact stage finished"
    );

    progress.phase("Drafting outreach messages");
    let template = &config.outreach;
    let (records, outcomes): (Vec<_>, Vec<_>) = for_each_record(
        "outreach",
        records,
        workers,
        cancel,
        progress,
        move |mut record| async move {
            let stored = outreach::generate_outreach(&mut record, generate, template).await;
            (record, stored)
        },
    )
    .await
    .into_iter()
    .unzip();
    for stored in outcomes.into_iter().flatten() {
        if stored {
            counts.outreach_generated += 1;
        } else {
            counts.outreach_failed += 1;
        }
    }
    info!(
        generated = counts.outreach_generated,
        failed = counts.outreach_failed,
        "outreach stage finished"
    );

    (records, counts)
}

/// Apply `work` to every record with at most `workers` in flight, keeping
/// batch order. Records reached after cancellation are passed through
/// untouched with no outcome.
async fn for_each_record<F, Fut, T>(
    stage: &'static str,
    records: Vec<LeadRecord>,
    workers: usize,
    cancel: &CancellationToken,
    progress: &dyn ProgressReporter,
    work: F,
) -> Vec<(LeadRecord, Option<T>)>
where
    F: Fn(LeadRecord) -> Fut,
    Fut: Future<Output = (LeadRecord, T)>,
{
    let total = records.len();
    let finished = AtomicUsize::new(0);
    let (finished, work) = (&finished, &work);

    stream::iter(records)
        .map(move |record| async move {
            if cancel.is_cancelled() {
                return (record, None);
            }
            let (record, outcome) = work(record).await;
            let current = finished.fetch_add(1, Ordering::Relaxed) + 1;
            progress.record_done(stage, record.agency_name(), current, total);
            (record, Some(outcome))
        })
        .buffered(workers.max(1))
        .collect()
        .await
}
