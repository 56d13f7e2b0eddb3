//! Error types for the lead-generation pipeline.
//!
//! Library crates use [`LeadGenError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::fmt;
use std::path::PathBuf;

/// Top-level error type for all lead-generation operations.
#[derive(Debug, thiserror::Error)]
pub enum LeadGenError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A record or input failed validation (e.g. an empty required field).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A search provider could not be queried at all.
    #[error("source unavailable: {provider}: {message}")]
    SourceUnavailable { provider: String, message: String },

    /// Fetching a web page failed.
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: FetchFailure },

    /// The text-generation backend failed or returned nothing usable.
    #[error("generation error: {message}")]
    Generation {
        message: String,
        /// HTTP status returned by the backend, if any.
        status: Option<u16>,
    },

    /// Discovery produced no seed records.
    #[error("discovery failed: {message}")]
    DiscoveryFailed { message: String },

    /// HTML or response parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Writing export rows failed.
    #[error("export error: {0}")]
    Export(String),

    /// Generic network/HTTP client error.
    #[error("network error: {0}")]
    Network(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Why a page fetch failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// The request timed out.
    Timeout,
    /// The server answered with a non-2xx status.
    HttpStatus(u16),
    /// The host could not be reached (DNS, connect, TLS, refused target).
    Unreachable(String),
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::HttpStatus(code) => write!(f, "HTTP {code}"),
            Self::Unreachable(detail) => write!(f, "unreachable ({detail})"),
        }
    }
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LeadGenError>;

impl LeadGenError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a fetch error for `url`.
    pub fn fetch(url: impl Into<String>, reason: FetchFailure) -> Self {
        Self::Fetch {
            url: url.into(),
            reason,
        }
    }

    /// Create a generation error without an HTTP status.
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation {
            message: msg.into(),
            status: None,
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a retry could plausibly succeed (rate limits, timeouts, 5xx).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Fetch { reason, .. } => match reason {
                FetchFailure::Timeout | FetchFailure::Unreachable(_) => true,
                FetchFailure::HttpStatus(code) => is_retryable_status(*code),
            },
            Self::Generation { status, .. } => status.is_none_or(is_retryable_status),
            Self::Network(_) => true,
            _ => false,
        }
    }
}

fn is_retryable_status(code: u16) -> bool {
    code == 429 || (500..600).contains(&code)
}
