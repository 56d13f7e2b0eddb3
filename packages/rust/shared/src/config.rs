//! Application configuration for leadgen.
//!
//! User config lives at `~/.leadgen/leadgen.toml`. Precedence, lowest first:
//! built-in defaults, the config file, environment variables, CLI flags.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LeadGenError, Result};
use crate::retry::RetryPolicy;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "leadgen.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".leadgen";

/// Search provider names accepted in `[search] sources`.
pub const KNOWN_SOURCES: [&str; 2] = ["clutch", "sortlist"];

// ---------------------------------------------------------------------------
// Config structs (matching leadgen.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub outreach: OutreachConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub sheets: SheetsConfig,
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Country the agencies should be based in.
    #[serde(default = "default_country")]
    pub country: String,

    /// Number of leads to collect.
    #[serde(default = "default_count")]
    pub count: usize,

    /// Kind of agency to look for.
    #[serde(default = "default_query")]
    pub query: String,

    /// Directory providers to query, in order.
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            country: default_country(),
            count: default_count(),
            query: default_query(),
            sources: default_sources(),
        }
    }
}

fn default_country() -> String {
    "Finland".into()
}
fn default_count() -> usize {
    20
}
fn default_query() -> String {
    "social media marketing agency".into()
}
fn default_sources() -> Vec<String> {
    KNOWN_SOURCES.iter().map(|s| s.to_string()).collect()
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// OpenAI-compatible API root.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_llm_timeout() -> u64 {
    60
}

/// `[http]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,

    /// Minimum ms between requests to the same host.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,

    /// Page text is cut to this many characters.
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,

    /// Response bodies are read up to this many bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout(),
            rate_limit_ms: default_rate_limit(),
            max_text_chars: default_max_text_chars(),
            max_body_bytes: default_max_body_bytes(),
            retry: RetryPolicy::default(),
        }
    }
}

fn default_http_timeout() -> u64 {
    15
}
fn default_rate_limit() -> u64 {
    1500
}
fn default_max_text_chars() -> usize {
    20_000
}
fn default_max_body_bytes() -> usize {
    5 * 1024 * 1024
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Records processed at once inside a stage.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Contact/about pages fetched per record, on top of the homepage.
    #[serde(default = "default_contact_pages")]
    pub contact_pages: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            contact_pages: default_contact_pages(),
        }
    }
}

fn default_concurrency() -> usize {
    1
}
fn default_contact_pages() -> usize {
    3
}

/// `[outreach]` section. Empty values are left out of the prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutreachConfig {
    #[serde(default)]
    pub sender_name: String,

    #[serde(default)]
    pub sender_company: String,

    /// One-sentence pitch the message should convey.
    #[serde(default)]
    pub value_proposition: String,
}

/// Export sink selected by `[output] format`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Jsonl,
    None,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Csv => "csv",
            Self::Jsonl => "jsonl",
            Self::None => "none",
        })
    }
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_file")]
    pub file: String,

    #[serde(default)]
    pub format: ExportFormat,

    #[serde(default = "default_log_file")]
    pub log_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file: default_output_file(),
            format: ExportFormat::default(),
            log_file: default_log_file(),
        }
    }
}

fn default_output_file() -> String {
    "outputs/leads.csv".into()
}
fn default_log_file() -> String {
    "outputs/logs.txt".into()
}

/// `[sheets]` section: optional Google Sheets mirror of the export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Spreadsheet id from the sheet URL.
    #[serde(default)]
    pub sheet_id: String,

    /// Path to a service-account JSON key.
    #[serde(default)]
    pub credentials_file: String,

    /// Tab the rows are appended to.
    #[serde(default = "default_sheet_range")]
    pub range: String,

    #[serde(default = "default_sheets_api")]
    pub api_base_url: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sheet_id: String::new(),
            credentials_file: String::new(),
            range: default_sheet_range(),
            api_base_url: default_sheets_api(),
        }
    }
}

fn default_sheet_range() -> String {
    "Sheet1".into()
}
fn default_sheets_api() -> String {
    "https://sheets.googleapis.com".into()
}

// ---------------------------------------------------------------------------
// Fetch config (runtime, derived from [http])
// ---------------------------------------------------------------------------

/// Runtime settings for outbound page fetches.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub rate_limit_ms: u64,
    pub max_text_chars: usize,
    pub max_body_bytes: usize,
    pub retry: RetryPolicy,
    /// Permit loopback/private targets. Only tests turn this on.
    pub allow_private_hosts: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            timeout_secs: config.http.timeout_secs,
            rate_limit_ms: config.http.rate_limit_ms,
            max_text_chars: config.http.max_text_chars,
            max_body_bytes: config.http.max_body_bytes,
            retry: config.http.retry.clone(),
            allow_private_hosts: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Overrides and validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Apply the environment overrides, reading variables through `lookup`.
    ///
    /// Unparseable numbers are reported rather than silently ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("TARGET_COUNTRY") {
            self.search.country = v;
        }
        if let Some(v) = get("TARGET_COUNT") {
            self.search.count = v.trim().parse().map_err(|_| {
                LeadGenError::config(format!("TARGET_COUNT must be a whole number, got {v:?}"))
            })?;
        }
        if let Some(v) = get("SEARCH_QUERY") {
            self.search.query = v;
        }
        if let Some(v) = get("OUTPUT_FILE") {
            self.output.file = v;
        }
        if let Some(v) = get("LOG_FILE") {
            self.output.log_file = v;
        }
        if let Some(v) = get("LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = get("USE_GOOGLE_SHEETS") {
            self.sheets.enabled = v.trim().eq_ignore_ascii_case("true");
        }
        if let Some(v) = get("GOOGLE_SHEET_ID") {
            self.sheets.sheet_id = v;
        }
        if let Some(v) = get("GOOGLE_APPLICATION_CREDENTIALS") {
            self.sheets.credentials_file = v;
        }
        Ok(())
    }

    /// Check every setting and report all problems in one error.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.search.country.trim().is_empty() {
            problems.push("search.country must not be empty".to_string());
        }
        if self.search.count < 1 {
            problems.push("search.count must be at least 1".to_string());
        }
        if self.search.query.trim().is_empty() {
            problems.push("search.query must not be empty".to_string());
        }
        if self.search.sources.is_empty() {
            problems.push("search.sources must name at least one provider".to_string());
        }
        for source in &self.search.sources {
            if !KNOWN_SOURCES.contains(&source.to_lowercase().as_str()) {
                problems.push(format!(
                    "unknown search source {source:?} (expected one of {})",
                    KNOWN_SOURCES.join(", ")
                ));
            }
        }
        if self.output.file.trim().is_empty() {
            problems.push("output.file must not be empty".to_string());
        }
        if self.output.log_file.trim().is_empty() {
            problems.push("output.log_file must not be empty".to_string());
        }
        if self.pipeline.concurrency < 1 {
            problems.push("pipeline.concurrency must be at least 1".to_string());
        }
        if self.llm.model.trim().is_empty() {
            problems.push("llm.model must not be empty".to_string());
        }
        if self.sheets.enabled {
            if self.sheets.sheet_id.trim().is_empty() {
                problems.push("sheets.sheet_id is required when sheets are enabled".to_string());
            }
            if self.sheets.credentials_file.trim().is_empty() {
                problems.push(
                    "sheets.credentials_file is required when sheets are enabled".to_string(),
                );
            }
            if self.sheets.range.trim().is_empty() {
                problems.push("sheets.range must not be empty".to_string());
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(LeadGenError::config(format!(
                "invalid configuration:\n  - {}",
                problems.join("\n  - ")
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.leadgen/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LeadGenError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.leadgen/leadgen.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LeadGenError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| LeadGenError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write a default config file to `path` (or the default location),
/// creating parent directories. Returns the path written.
pub fn init_config(path: Option<&Path>) -> Result<PathBuf> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| LeadGenError::io(dir, e))?;
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| LeadGenError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LeadGenError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the LLM API key from the env var named in `[llm] api_key_env`.
pub fn validate_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.llm.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val.trim().to_string()),
        _ => Err(LeadGenError::config(format!(
            "LLM API key not found. Set the {var_name} environment variable."
        ))),
    }
}
