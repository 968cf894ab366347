//! # Version-Control Backends
//!
//! This module defines the uniform capability interface every supported VCS
//! implements, and the data that flows out of it.
//!
//! ## Design
//!
//! The set of backends is closed: [`VcsKind`] enumerates them and each has
//! one adapter module. Adapters implement the [`Backend`] trait and are looked
//! up through a [`Registry`] keyed by kind. The default registry contains all
//! five adapters; tests build their own registry with mock backends, the same
//! way the orchestrator would use a real one.
//!
//! Adapters never keep state between calls. Every operation re-queries the
//! working copy (current branch, current revision) before acting, because the
//! on-disk state belongs to the VCS tool and may have been changed by hand.
//!
//! - `checkout` clones a missing working copy and moves it to the pinned
//!   revision or branch.
//! - `update` fetches and re-resolves the target state; for a missing working
//!   copy it delegates to `checkout`.
//! - `status` reports the raw tool status and never mutates anything.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::process::{CommandLog, Tool};
use crate::source::{Source, VcsKind};

pub mod bazaar;
pub mod filesystem;
pub mod git;
pub mod mercurial;
pub mod subversion;

/// What to do when a server presents a certificate the tool does not trust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateTrust {
    /// Accept it without asking.
    #[default]
    Accept,
    /// Let the tool ask on the terminal.
    Prompt,
    /// Refuse it; the operation fails.
    Fail,
}

impl FromStr for CertificateTrust {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "accept" | "always" | "true" => Ok(CertificateTrust::Accept),
            "prompt" => Ok(CertificateTrust::Prompt),
            "fail" | "never" | "false" => Ok(CertificateTrust::Fail),
            other => Err(format!(
                "unknown certificate-trust '{}' (expected accept, prompt or fail)",
                other
            )),
        }
    }
}

/// Cross-cutting policy for one run, shared by every adapter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Worker pool size.
    pub threads: usize,
    /// Never contact a remote.
    pub offline: bool,
    /// Limit for each external tool invocation.
    pub timeout: Option<Duration>,
    pub certificate_trust: CertificateTrust,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            threads: crate::defaults::THREADS,
            offline: false,
            timeout: None,
            certificate_trust: CertificateTrust::default(),
        }
    }
}

impl SyncOptions {
    /// A tool invocation configured with this run's timeout and prompting policy.
    pub fn tool(&self, program: &str) -> Tool {
        Tool::new(program)
            .with_timeout(self.timeout)
            .interactive(self.certificate_trust == CertificateTrust::Prompt)
    }
}

/// The user-facing operation an outcome belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Checkout,
    Update,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verb::Checkout => f.write_str("checkout"),
            Verb::Update => f.write_str("update"),
        }
    }
}

/// Terminal status of one source for one verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Cloned,
    Updated,
    Unchanged,
    Switched,
    Failed,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Cloned => "cloned",
            OutcomeStatus::Updated => "updated",
            OutcomeStatus::Unchanged => "unchanged",
            OutcomeStatus::Switched => "switched",
            OutcomeStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of running one verb against one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub source_name: String,
    pub verb: Verb,
    pub status: OutcomeStatus,
    pub message: String,
    /// Everything the VCS tool printed during the operation.
    pub raw_log: String,
}

impl Outcome {
    pub fn new(
        source: &Source,
        verb: Verb,
        status: OutcomeStatus,
        message: impl Into<String>,
        log: CommandLog,
    ) -> Self {
        Self {
            source_name: source.name.clone(),
            verb,
            status,
            message: message.into(),
            raw_log: log.into_string(),
        }
    }

    /// A `failed` outcome built from the error that ended the operation.
    pub fn failed(source_name: &str, verb: Verb, error: &Error) -> Self {
        Self {
            source_name: source_name.to_string(),
            verb,
            status: OutcomeStatus::Failed,
            message: error.to_string(),
            raw_log: error.log().to_string(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == OutcomeStatus::Failed
    }
}

/// Summary state of a working copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkingCopyState {
    Clean,
    /// Has local modifications.
    Dirty,
    /// Clean, but has commits the remote does not.
    Ahead,
}

/// What `status` reports for one working copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkingCopyStatus {
    pub state: WorkingCopyState,
    /// Raw tool output.
    pub text: String,
}

/// The capability interface every VCS adapter implements.
pub trait Backend: Send + Sync {
    /// The kind this adapter handles.
    fn kind(&self) -> VcsKind;

    /// Reject source settings this backend cannot honour.
    ///
    /// Runs before any filesystem or network access.
    fn validate(&self, source: &Source) -> Result<()> {
        source.validate_pin()
    }

    /// Create the working copy if it does not exist yet.
    fn checkout(&self, source: &Source, options: &SyncOptions) -> Result<Outcome>;

    /// Bring an existing working copy to its configured state.
    fn update(&self, source: &Source, options: &SyncOptions) -> Result<Outcome>;

    /// Report the working copy's status without changing it.
    fn status(
        &self,
        source: &Source,
        options: &SyncOptions,
        verbose: bool,
    ) -> Result<WorkingCopyStatus>;

    /// Whether the working copy was made from the configured URL.
    fn matches(&self, _source: &Source, _options: &SyncOptions) -> Result<bool> {
        Ok(true)
    }
}

/// Maps each VCS kind to the adapter that handles it.
pub struct Registry {
    backends: BTreeMap<VcsKind, Box<dyn Backend>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            backends: BTreeMap::new(),
        }
    }

    /// Register a backend, replacing any previous one for the same kind.
    pub fn register(&mut self, backend: Box<dyn Backend>) {
        self.backends.insert(backend.kind(), backend);
    }

    /// The backend for `kind`; a missing one is a configuration error.
    pub fn get(&self, kind: VcsKind) -> Result<&dyn Backend> {
        self.backends
            .get(&kind)
            .map(|backend| backend.as_ref())
            .ok_or_else(|| Error::configuration(format!("no backend registered for vcs '{}'", kind)))
    }
}

impl Default for Registry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(git::GitBackend));
        registry.register(Box::new(mercurial::MercurialBackend));
        registry.register(Box::new(subversion::SubversionBackend));
        registry.register(Box::new(bazaar::BazaarBackend));
        registry.register(Box::new(filesystem::FilesystemBackend));
        registry
    }
}

/// Create the parent directory of a working copy before cloning into it.
pub(crate) fn ensure_parent(source: &Source) -> Result<()> {
    if let Some(parent) = source.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Outcome for a checkout whose working copy already exists.
pub(crate) fn already_present(source: &Source, verb: Verb) -> Outcome {
    log::info!("Skipped cloning of existing package '{}'.", source.name);
    Outcome::new(
        source,
        verb,
        OutcomeStatus::Unchanged,
        format!("{} already exists", source.path.display()),
        CommandLog::new(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_has_every_kind() {
        let registry = Registry::default();
        for kind in VcsKind::ALL {
            assert_eq!(registry.get(kind).unwrap().kind(), kind);
        }
    }

    #[test]
    fn test_empty_registry_reports_configuration_error() {
        let registry = Registry::new();
        let error = registry.get(VcsKind::Git).err().unwrap();
        assert!(matches!(error, Error::Configuration { .. }));
        assert!(error.to_string().contains("'git'"));
    }

    #[test]
    fn test_certificate_trust_parsing() {
        assert_eq!("accept".parse::<CertificateTrust>().unwrap(), CertificateTrust::Accept);
        assert_eq!("Prompt".parse::<CertificateTrust>().unwrap(), CertificateTrust::Prompt);
        assert_eq!("fail".parse::<CertificateTrust>().unwrap(), CertificateTrust::Fail);
        assert!("maybe".parse::<CertificateTrust>().is_err());
    }

    #[test]
    fn test_failed_outcome_carries_error_and_log() {
        let error = Error::VcsTool {
            tool: "git".to_string(),
            command: "fetch origin".to_string(),
            code: Some(128),
            log: "fatal: unable to access".to_string(),
        };
        let outcome = Outcome::failed("egg", Verb::Update, &error);
        assert!(outcome.is_failure());
        assert_eq!(outcome.source_name, "egg");
        assert!(outcome.message.contains("git fetch origin failed"));
        assert_eq!(outcome.raw_log, "fatal: unable to access");
    }

    #[test]
    fn test_outcome_serializes_lowercase() {
        let source = Source::new("egg", VcsKind::Git, "url", "sources");
        let outcome = Outcome::new(
            &source,
            Verb::Checkout,
            OutcomeStatus::Cloned,
            "Cloned",
            CommandLog::new(),
        );
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["verb"], "checkout");
        assert_eq!(json["status"], "cloned");
        assert_eq!(json["source_name"], "egg");
    }

    #[test]
    fn test_status_display() {
        assert_eq!(OutcomeStatus::Switched.to_string(), "switched");
        assert_eq!(Verb::Update.to_string(), "update");
    }
}
