//! Shared record model, capability traits, error model, and configuration
//! for leadgen.
//!
//! This crate is the foundation depended on by all other leadgen crates.
//! It provides:
//! - [`LeadGenError`]: the unified error type
//! - The lead record and its scoring rule ([`LeadRecord`], [`LeadScore`], [`ExportRow`])
//! - Capability traits the pipeline stages consume ([`SearchCapability`] and friends)
//! - Configuration ([`AppConfig`], [`FetchConfig`], config loading)
//! - A retry helper for transient external failures ([`with_retry`])

pub mod capability;
pub mod config;
pub mod error;
pub mod retry;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use capability::{
    ContentFetchCapability, EmailExtractionCapability, ExportCapability, FetchedContent,
    GenerationRequest, PageLink, SearchCapability, SearchHit, TextGenerationCapability,
};
pub use config::{
    AppConfig, ExportFormat, FetchConfig, HttpConfig, KNOWN_SOURCES, LlmConfig, OutputConfig,
    OutreachConfig, PipelineConfig, SearchConfig, SheetsConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, validate_api_key,
};
pub use error::{FetchFailure, LeadGenError, Result};
pub use retry::{RetryPolicy, with_retry};
pub use types::{
    ContactStatus, EXPORT_COLUMNS, EnrichmentStatus, ExportRow, LeadRecord, LeadScore,
    MAX_OUTREACH_WORDS, RecordStage, is_tracking_param, looks_like_email, word_count,
};
