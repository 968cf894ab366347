//! # Working-Copy Orchestrator
//!
//! Runs one verb (`checkout` or `update`) across a selection of sources.
//!
//! ## Process
//!
//! 1.  **Selection**: an empty name list selects every configured source;
//!     otherwise each name must match a configured source.
//! 2.  **Validation**: every selected source is resolved to its backend and
//!     validated before any I/O. Unknown names, unsupported pins and two
//!     sources sharing one path abort the whole run with a single
//!     [`Error::Configuration`] naming every offender.
//! 3.  **Execution**: adapters run on a rayon pool of exactly
//!     `options.threads` workers. A failing source becomes a `failed`
//!     [`Outcome`]; it never stops the others.
//!
//! The run itself only fails when every selected source failed.

use std::collections::HashMap;

use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::process::CommandLog;
use crate::source::Source;
use crate::vcs::{
    Backend, Outcome, OutcomeStatus, Registry, SyncOptions, Verb, WorkingCopyState,
};

/// Aggregate result of one orchestrated run, sorted by source name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub outcomes: Vec<Outcome>,
}

impl Report {
    pub fn new(mut outcomes: Vec<Outcome>) -> Self {
        outcomes.sort_by(|a, b| a.source_name.cmp(&b.source_name));
        Self { outcomes }
    }

    pub fn failures(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|outcome| outcome.is_failure())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Number of outcomes with the given status.
    pub fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == status)
            .count()
    }
}

/// One line of `status` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusLine {
    pub name: String,
    /// Whether the working copy exists on disk.
    pub present: bool,
    /// Whether the working copy was made from the configured URL.
    pub url_matches: bool,
    /// `None` when the working copy is missing or could not be queried.
    pub state: Option<WorkingCopyState>,
    pub text: String,
}

/// Drives backend adapters over a set of configured sources.
pub struct WorkingCopies<'a> {
    sources: &'a [Source],
    registry: Registry,
    options: SyncOptions,
}

impl<'a> WorkingCopies<'a> {
    /// An orchestrator using every built-in backend.
    pub fn new(sources: &'a [Source], options: SyncOptions) -> Self {
        Self::with_registry(sources, Registry::default(), options)
    }

    /// An orchestrator using the given backends (for testing).
    pub fn with_registry(sources: &'a [Source], registry: Registry, options: SyncOptions) -> Self {
        Self {
            sources,
            registry,
            options,
        }
    }

    /// The sources named, or all sources when `names` is empty.
    pub fn select(&self, names: &[String]) -> Result<Vec<&'a Source>> {
        if names.is_empty() {
            return Ok(self.sources.iter().collect());
        }
        let by_name: HashMap<&str, &'a Source> = self
            .sources
            .iter()
            .map(|source| (source.name.as_str(), source))
            .collect();
        let unknown: Vec<&str> = names
            .iter()
            .map(String::as_str)
            .filter(|name| !by_name.contains_key(name))
            .collect();
        if !unknown.is_empty() {
            let known: Vec<&str> = self.sources.iter().map(|s| s.name.as_str()).collect();
            return Err(Error::Configuration {
                message: format!("unknown source(s): {}", unknown.join(", ")),
                hint: Some(if known.is_empty() {
                    "no sources are configured".to_string()
                } else {
                    format!("configured sources: {}", known.join(", "))
                }),
            });
        }
        Ok(names.iter().filter_map(|name| by_name.get(name.as_str()).copied()).collect())
    }

    /// Resolve and validate every selected source before touching anything.
    fn prepare(&self, names: &[String]) -> Result<Vec<(&'a Source, &dyn Backend)>> {
        let selected = self.select(names)?;
        let mut jobs = Vec::with_capacity(selected.len());
        let mut problems = Vec::new();
        let mut paths: HashMap<&std::path::Path, &str> = HashMap::new();

        for source in selected {
            if let Some(other) = paths.insert(source.path.as_path(), &source.name) {
                problems.push(format!(
                    "sources '{}' and '{}' share the path {}",
                    other,
                    source.name,
                    source.path.display()
                ));
                continue;
            }
            match self
                .registry
                .get(source.kind)
                .and_then(|backend| backend.validate(source).map(|()| backend))
            {
                Ok(backend) => jobs.push((source, backend)),
                Err(Error::Configuration { message, .. }) => problems.push(message),
                Err(other) => problems.push(other.to_string()),
            }
        }

        if problems.is_empty() {
            Ok(jobs)
        } else {
            Err(Error::configuration(problems.join("; ")))
        }
    }

    pub fn checkout(&self, names: &[String]) -> Result<Report> {
        self.run(Verb::Checkout, names)
    }

    pub fn update(&self, names: &[String]) -> Result<Report> {
        self.run(Verb::Update, names)
    }

    /// Run `verb` for the selected sources on the worker pool.
    pub fn run(&self, verb: Verb, names: &[String]) -> Result<Report> {
        let jobs = self.prepare(names)?;
        if jobs.is_empty() {
            info!("No sources configured.");
            return Ok(Report::default());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.threads.max(1))
            .build()
            .map_err(|e| Error::ThreadPool {
                message: e.to_string(),
            })?;
        info!(
            "Running {} for {} source(s) with {} thread(s).",
            verb,
            jobs.len(),
            self.options.threads.max(1)
        );

        let outcomes: Vec<Outcome> = pool.install(|| {
            jobs.par_iter()
                .map(|(source, backend)| self.run_one(verb, source, *backend))
                .collect()
        });

        let report = Report::new(outcomes);
        if report.outcomes.iter().all(Outcome::is_failure) {
            return Err(Error::AllSourcesFailed {
                outcomes: report.outcomes,
            });
        }
        Ok(report)
    }

    fn run_one(&self, verb: Verb, source: &Source, backend: &dyn Backend) -> Outcome {
        if self.options.offline {
            return offline_outcome(verb, source);
        }
        let result = match verb {
            Verb::Checkout => backend.checkout(source, &self.options),
            Verb::Update => backend.update(source, &self.options),
        };
        result.unwrap_or_else(|error| {
            warn!("{} of '{}' failed: {}", verb, source.name, error);
            Outcome::failed(&source.name, verb, &error)
        })
    }

    /// Query every selected working copy, one at a time.
    pub fn status(&self, names: &[String], verbose: bool) -> Result<Vec<StatusLine>> {
        let mut lines = Vec::new();
        for source in self.select(names)? {
            let backend = self.registry.get(source.kind)?;
            if !source.path.exists() {
                lines.push(StatusLine {
                    name: source.name.clone(),
                    present: false,
                    url_matches: true,
                    state: None,
                    text: format!("{} is missing", source.path.display()),
                });
                continue;
            }
            let url_matches = backend.matches(source, &self.options).unwrap_or(false);
            let (state, text) = match backend.status(source, &self.options, verbose) {
                Ok(status) => (Some(status.state), status.text),
                Err(error) => (None, error.to_string()),
            };
            lines.push(StatusLine {
                name: source.name.clone(),
                present: true,
                url_matches,
                state,
                text,
            });
        }
        Ok(lines)
    }
}

fn offline_outcome(verb: Verb, source: &Source) -> Outcome {
    if source.path.exists() {
        info!("Offline: leaving '{}' as it is.", source.name);
        Outcome::new(
            source,
            verb,
            OutcomeStatus::Unchanged,
            "offline, working copy left as is",
            CommandLog::new(),
        )
    } else {
        let error = Error::Fetch {
            target: source.url.clone(),
            message: format!(
                "offline mode, cannot create missing working copy {}",
                source.path.display()
            ),
        };
        Outcome::failed(&source.name, verb, &error)
    }
}
