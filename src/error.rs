//! # Error Handling
//!
//! This module defines the centralized error type for `devsync`. It uses the
//! `thiserror` library to create an `Error` enum covering every failure mode
//! of the library, each variant carrying enough context to tell the user which
//! source, file or command went wrong.
//!
//! ## Taxonomy
//!
//! - **Configuration**: fatal problems detected before any I/O, such as a
//!   source that pins both a revision and a branch, or a name that is not
//!   configured. A run never starts when one of these is present.
//! - **ConfigParse**: the configuration file itself could not be understood.
//! - **Fetch**: a remote requirements/constraints target could not be read.
//! - **VcsTool** / **Timeout**: an external VCS tool exited unsuccessfully or
//!   hung. These are per-source failures; the orchestrator turns them into a
//!   `failed` outcome rather than aborting the batch.
//! - **AllSourcesFailed**: every source of a batch failed. The outcomes are
//!   carried along so the caller can still print the report.
//!
//! Malformed dependency lines never become errors; they pass through
//! unchanged.

use thiserror::Error;

use crate::vcs::Outcome;

/// Main error type for devsync operations
#[derive(Error, Debug)]
pub enum Error {
    /// A fatal configuration problem, detected before any tool is run.
    #[error("Configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Configuration {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// The configuration file could not be parsed.
    #[error("Configuration parsing error in {path} line {line}: {message}")]
    ConfigParse {
        path: String,
        line: usize,
        message: String,
    },

    /// A remote requirements or constraints target could not be fetched.
    #[error("Fetch error for {target}: {message}")]
    Fetch { target: String, message: String },

    /// An external VCS tool exited with a non-zero status.
    #[error("{tool} {command} failed{}: {}", code.map(|c| format!(" with exit code {}", c)).unwrap_or_default(), last_line(log))]
    VcsTool {
        tool: String,
        command: String,
        code: Option<i32>,
        /// Everything the tool printed during the failed operation
        log: String,
    },

    /// An external VCS tool did not finish within the configured timeout.
    #[error("{tool} {command} timed out after {seconds}s")]
    Timeout {
        tool: String,
        command: String,
        seconds: u64,
        log: String,
    },

    /// Every source in a batch failed.
    #[error("All {} sources failed", outcomes.len())]
    AllSourcesFailed { outcomes: Vec<Outcome> },

    /// The worker pool could not be created.
    #[error("Thread pool error: {message}")]
    ThreadPool { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl Error {
    /// Shorthand for a `Configuration` error without a hint.
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
            hint: None,
        }
    }

    /// The captured tool output attached to this error, if any.
    pub fn log(&self) -> &str {
        match self {
            Error::VcsTool { log, .. } | Error::Timeout { log, .. } => log,
            _ => "",
        }
    }
}

fn last_line(log: &str) -> &str {
    log.lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .map(str::trim)
        .unwrap_or("no output")
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
