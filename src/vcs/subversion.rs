//! Subversion backend, driving the `svn` command.
//!
//! Subversion branches are directories in the repository, so a source selects
//! a branch through its URL and may not set `branch`. When the configured URL
//! changes, `update` relocates the working copy with `svn switch`.

use log::{info, warn};

use crate::error::{Error, Result};
use crate::process::{CommandLog, Tool};
use crate::source::{Source, VcsKind};
use crate::vcs::{
    already_present, ensure_parent, Backend, CertificateTrust, Outcome, OutcomeStatus,
    SyncOptions, Verb, WorkingCopyState, WorkingCopyStatus,
};

pub struct SubversionBackend;

const TRUST_FAILURES: &str =
    "--trust-server-cert-failures=unknown-ca,cn-mismatch,expired,not-yet-valid,other";

fn remote_args(options: &SyncOptions) -> Vec<&'static str> {
    match options.certificate_trust {
        CertificateTrust::Accept => vec!["--non-interactive", TRUST_FAILURES],
        CertificateTrust::Prompt => Vec::new(),
        CertificateTrust::Fail => vec!["--non-interactive"],
    }
}

fn info_item(tool: &Tool, source: &Source, item: &str) -> Result<String> {
    let mut scratch = CommandLog::new();
    let output = tool.run(
        &["info", "--show-item", item],
        Some(&source.path),
        &mut scratch,
    )?;
    Ok(output.trim().to_string())
}

fn same_url(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

fn checkout(source: &Source, options: &SyncOptions, verb: Verb) -> Result<Outcome> {
    if source.path.exists() {
        return Ok(already_present(source, verb));
    }
    ensure_parent(source)?;
    if source.depth.is_some() {
        warn!("Ignoring depth for '{}': subversion checkouts have no history.", source.name);
    }

    let tool = options.tool("svn");
    let mut log = CommandLog::new();
    let path = source.path.to_string_lossy();

    let mut args = vec!["checkout", "--quiet"];
    args.extend(remote_args(options));
    if let Some(revision) = &source.revision {
        args.extend(["-r", revision.as_str()]);
    }
    args.push(source.url.as_str());
    args.push(&path);
    tool.run(&args, None, &mut log)?;

    let message = format!("Checked out '{}' with subversion from '{}'.", source.name, source.url);
    info!("{}", message);
    Ok(Outcome::new(source, verb, OutcomeStatus::Cloned, message, log))
}

impl Backend for SubversionBackend {
    fn kind(&self) -> VcsKind {
        VcsKind::Subversion
    }

    fn validate(&self, source: &Source) -> Result<()> {
        source.validate_pin()?;
        if let Some(branch) = &source.branch {
            return Err(Error::Configuration {
                message: format!(
                    "source '{}' sets branch '{}', which subversion does not support",
                    source.name, branch
                ),
                hint: Some("point 'url' at the branch directory instead".to_string()),
            });
        }
        Ok(())
    }

    fn checkout(&self, source: &Source, options: &SyncOptions) -> Result<Outcome> {
        checkout(source, options, Verb::Checkout)
    }

    fn update(&self, source: &Source, options: &SyncOptions) -> Result<Outcome> {
        if !source.path.exists() {
            return checkout(source, options, Verb::Update);
        }

        let tool = options.tool("svn");
        let mut log = CommandLog::new();
        let cwd = Some(source.path.as_path());
        let revision_before = info_item(&tool, source, "revision")?;
        let url_before = info_item(&tool, source, "url")?;

        let mut switched = false;
        let mut args = if same_url(&url_before, &source.url) {
            vec!["update", "--quiet"]
        } else {
            info!("Switching '{}' to '{}'.", source.name, source.url);
            switched = true;
            vec!["switch", "--quiet"]
        };
        args.extend(remote_args(options));
        if let Some(revision) = &source.revision {
            args.extend(["-r", revision.as_str()]);
        }
        if switched {
            args.push(source.url.as_str());
        }
        tool.run(&args, cwd, &mut log)?;
        info!("Updated '{}' with subversion.", source.name);

        let revision_after = info_item(&tool, source, "revision")?;
        let status = if switched {
            OutcomeStatus::Switched
        } else if revision_before != revision_after {
            OutcomeStatus::Updated
        } else {
            OutcomeStatus::Unchanged
        };
        let message = format!("at revision {}", revision_after);
        Ok(Outcome::new(source, Verb::Update, status, message, log))
    }

    fn status(
        &self,
        source: &Source,
        options: &SyncOptions,
        verbose: bool,
    ) -> Result<WorkingCopyStatus> {
        let tool = options.tool("svn");
        let mut log = CommandLog::new();
        let changes = tool.run(&["status"], Some(&source.path), &mut log)?;
        let state = if changes.trim().is_empty() {
            WorkingCopyState::Clean
        } else {
            WorkingCopyState::Dirty
        };
        let mut text = changes.trim_end().to_string();
        if verbose {
            let info = tool.run(&["info"], Some(&source.path), &mut log)?;
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(info.trim_end());
        }
        Ok(WorkingCopyStatus { state, text })
    }

    fn matches(&self, source: &Source, options: &SyncOptions) -> Result<bool> {
        let url = info_item(&options.tool("svn"), source, "url")?;
        Ok(same_url(&url, &source.url))
    }
}
