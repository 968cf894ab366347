//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `devsync` command-line tool. Each subcommand is defined in its own file.
//!
//! ## Structure
//!
//! Each command module contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and the global
//!   options and calls into the `devsync` library.
//!
//! Helpers shared by the commands that run the orchestrator live here.

pub mod checkout;
pub mod completions;
pub mod merge;
pub mod status;
pub mod update;

use std::path::PathBuf;

use anyhow::{Context, Result};

use devsync::config::Configuration;
use devsync::output::{emoji, indent, status_label, OutputConfig};
use devsync::vcs::Verb;
use devsync::workingcopies::{Report, WorkingCopies};
use devsync::Error;

/// Options given before the subcommand.
#[derive(Debug, Clone)]
pub struct Globals {
    pub config: PathBuf,
    pub color: String,
    pub threads: Option<usize>,
    pub offline: bool,
}

impl Globals {
    /// Load the configuration file and apply command-line overrides.
    pub fn load(&self) -> Result<Configuration> {
        let mut config = Configuration::from_file(&self.config)
            .with_context(|| format!("Failed to load config from {}", self.config.display()))?;
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if self.offline {
            config.offline = true;
        }
        Ok(config)
    }

    pub fn output(&self) -> OutputConfig {
        OutputConfig::from_env_and_flag(&self.color)
    }
}

/// Run `verb` over the named sources; a batch where every source failed is
/// still a report, so the caller can print it.
pub fn run_verb(config: &Configuration, verb: Verb, names: &[String]) -> Result<Report> {
    let workingcopies = WorkingCopies::new(&config.sources, config.sync_options());
    match workingcopies.run(verb, names) {
        Ok(report) => Ok(report),
        Err(Error::AllSourcesFailed { outcomes }) => Ok(Report::new(outcomes)),
        Err(e) => Err(e.into()),
    }
}

/// Print one `<status> <name>` line per outcome, failures on stderr.
pub fn print_report(out: &OutputConfig, report: &Report, verbose: bool) {
    for outcome in &report.outcomes {
        println!("{} {}", status_label(out, outcome.status), outcome.source_name);
        if verbose && !outcome.raw_log.trim().is_empty() {
            println!("{}", indent(outcome.raw_log.trim_end()));
        }
    }
    for failure in report.failures() {
        eprintln!(
            "{} {}: {}",
            emoji(out, "❌", "[ERR]"),
            failure.source_name,
            failure.message
        );
    }
}

/// The error returned when any source failed.
pub fn failure_error(report: &Report) -> anyhow::Error {
    let failed = report.failures().count();
    anyhow::anyhow!("{} of {} source(s) failed", failed, report.outcomes.len())
}

/// Shared body of `checkout` and `update`.
pub fn sync(
    verb: Verb,
    names: &[String],
    verbose: bool,
    json: bool,
    globals: &Globals,
) -> Result<()> {
    let config = globals.load()?;
    let out = globals.output();
    let report = run_verb(&config, verb, names)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&out, &report, verbose);
    }

    if report.has_failures() {
        return Err(failure_error(&report));
    }
    Ok(())
}
