//! Pipeline stages and runner for leadgen.
//!
//! Each stage takes a [`LeadRecord`](leadgen_shared::LeadRecord) plus the
//! capabilities it needs and never fails the run on a per-record problem.
//! [`pipeline::run_pipeline`] sequences them stage by stage over the batch.

pub mod contact;
pub mod discovery;
pub mod enrichment;
pub mod llm;
pub mod outreach;
pub mod pipeline;
pub mod scoring;

#[cfg(test)]
mod testing;

pub use contact::{ContactOptions, find_contact};
pub use discovery::{Discovery, discover};
pub use enrichment::enrich;
pub use llm::ChatCompletionsClient;
pub use outreach::{OutreachTemplate, build_request, generate_outreach, truncate_to_word_limit};
pub use pipeline::{
    Capabilities, ProgressReporter, RunConfig, RunSummary, SilentProgress, run_pipeline,
};
pub use scoring::{ExportStatus, TierCounts, score_all, score_and_export};
