//! CLI command definitions, routing, and tracing setup.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, bail};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use leadgen_core::{
    Capabilities, ChatCompletionsClient, ProgressReporter, RunConfig, RunSummary, run_pipeline,
};
use leadgen_crawler::HttpFetcher;
use leadgen_discovery::{SourceOptions, build_sources};
use leadgen_export::{SheetsExporter, build_exporter};
use leadgen_extract::RegexEmailExtractor;
use leadgen_shared::{
    AppConfig, ExportCapability, ExportFormat, FetchConfig, init_config, load_config,
    load_config_from, validate_api_key,
};

/// Exit status after Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// leadgen: find marketing agencies and draft outreach to them.
#[derive(Parser)]
#[command(
    name = "leadgen",
    version,
    about = "Discover marketing agencies, enrich and score them, and draft personalised outreach.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.leadgen/leadgen.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the full lead generation pipeline.
    Run(RunArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Google Sheets export target.
    Sheets {
        #[command(subcommand)]
        action: SheetsAction,
    },
}

/// Flags of `leadgen run`; each overrides the config file and environment.
#[derive(Args, Debug, Default)]
pub(crate) struct RunArgs {
    /// Country the agencies should be based in.
    #[arg(long)]
    pub country: Option<String>,

    /// Number of leads to collect.
    #[arg(long)]
    pub count: Option<usize>,

    /// Kind of agency to search for.
    #[arg(long)]
    pub query: Option<String>,

    /// Output file for the exported leads.
    #[arg(long, value_name = "FILE")]
    pub out: Option<String>,

    /// Export format.
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// LLM model used for outreach messages.
    #[arg(long)]
    pub model: Option<String>,

    /// Records processed at once inside a stage.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Print the run summary as JSON.
    #[arg(long)]
    pub summary_json: bool,
}

impl RunArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(country) = &self.country {
            config.search.country = country.clone();
        }
        if let Some(count) = self.count {
            config.search.count = count;
        }
        if let Some(query) = &self.query {
            config.search.query = query.clone();
        }
        if let Some(out) = &self.out {
            config.output.file = out.clone();
        }
        if let Some(format) = self.format {
            config.output.format = format.into();
        }
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.pipeline.concurrency = concurrency;
        }
    }
}

/// Export format flag.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum FormatArg {
    Csv,
    Jsonl,
    None,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => Self::Csv,
            FormatArg::Jsonl => Self::Jsonl,
            FormatArg::None => Self::None,
        }
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

/// Sheets subcommands.
#[derive(Subcommand)]
pub(crate) enum SheetsAction {
    /// Remove every row from the configured tab.
    Clear,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags, mirroring events into `log_file`
/// when given.
pub(crate) fn init_tracing(cli: &Cli, log_file: Option<&Path>) -> Result<()> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "leadgen=info",
        1 => "leadgen=debug",
        _ => "leadgen=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let console = match cli.log_format {
        LogFormat::Text => fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
    };

    let file_layer = match log_file {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)
                    .wrap_err_with(|| format!("cannot create log directory {}", dir.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .wrap_err_with(|| format!("cannot open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .with(env_filter)
        .init();
    Ok(())
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<ExitCode> {
    match &cli.command {
        Command::Run(args) => cmd_run(&cli, args).await,
        Command::Config { action } => {
            init_tracing(&cli, None)?;
            match action {
                ConfigAction::Init => cmd_config_init(cli.config.as_deref()),
                ConfigAction::Show => cmd_config_show(cli.config.as_deref()),
            }
        }
        Command::Sheets { action } => {
            init_tracing(&cli, None)?;
            match action {
                SheetsAction::Clear => cmd_sheets_clear(cli.config.as_deref()).await,
            }
        }
    }
}

/// Config file (or defaults), then environment overrides.
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    config.apply_env_overrides(|name| std::env::var(name).ok())?;
    Ok(config)
}

async fn cmd_run(cli: &Cli, args: &RunArgs) -> Result<ExitCode> {
    let mut config = resolve_config(cli.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;
    let api_key = validate_api_key(&config)?;

    init_tracing(cli, Some(Path::new(&config.output.log_file)))?;

    let caps = Capabilities {
        sources: build_sources(&config.search.sources, &SourceOptions::from(&config))?,
        fetch: Arc::new(HttpFetcher::new(FetchConfig::from(&config))?),
        extract: Arc::new(RegexEmailExtractor),
        generate: Arc::new(ChatCompletionsClient::new(
            &config.llm,
            api_key,
            config.http.retry.clone(),
        )?),
        export: build_exporter(&config)?,
    };
    let run_config = RunConfig::from(&config);

    info!(
        country = %run_config.country,
        count = run_config.count,
        query = %run_config.query,
        model = %config.llm.model,
        output = %caps.export.location(),
        "starting lead generation"
    );

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, exporting the leads gathered so far");
                cancel.cancel();
            }
        }
    });

    let reporter = CliProgress::new();
    let summary = run_pipeline(&run_config, &caps, &reporter, &cancel).await?;

    if args.summary_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!();
        println!("{summary}");
        println!("  log file     {}", config.output.log_file);
        println!();
    }

    if summary.export.is_failed() {
        eprintln!("error: leads were not exported: {}", summary.export);
        return Ok(ExitCode::FAILURE);
    }
    if summary.cancelled {
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    }
    Ok(ExitCode::SUCCESS)
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn record_done(&self, stage: &str, agency: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("{stage} [{current}/{total}] {agency}"));
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

fn cmd_config_init(path: Option<&Path>) -> Result<ExitCode> {
    let path = init_config(path)?;
    println!("Config initialized at: {}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_config_show(path: Option<&Path>) -> Result<ExitCode> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");

    let key_state = match std::env::var(&config.llm.api_key_env) {
        Ok(v) if !v.trim().is_empty() => "set",
        _ => "not set",
    };
    println!("# {} is {key_state}", config.llm.api_key_env);

    config.validate()?;
    Ok(ExitCode::SUCCESS)
}

// ---------------------------------------------------------------------------
// Sheets commands
// ---------------------------------------------------------------------------

async fn cmd_sheets_clear(path: Option<&Path>) -> Result<ExitCode> {
    let config = resolve_config(path)?;
    if config.sheets.sheet_id.trim().is_empty() || config.sheets.credentials_file.trim().is_empty()
    {
        bail!(
            "set sheets.sheet_id and sheets.credentials_file \
             (or GOOGLE_SHEET_ID and GOOGLE_APPLICATION_CREDENTIALS)"
        );
    }

    let sheets = SheetsExporter::new(&config.sheets)?;
    sheets.clear().await?;
    println!("Cleared {}", sheets.location());
    Ok(ExitCode::SUCCESS)
}
