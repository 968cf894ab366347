//! Bazaar backend, driving the `bzr` command.
//!
//! Like subversion, a bazaar branch is a URL, so `branch` is rejected. A
//! pinned revision is enforced with `pull --overwrite -r`.

use log::{info, warn};

use crate::error::{Error, Result};
use crate::process::{CommandLog, Tool};
use crate::source::{Source, VcsKind};
use crate::vcs::{
    already_present, ensure_parent, Backend, Outcome, OutcomeStatus, SyncOptions, Verb,
    WorkingCopyState, WorkingCopyStatus,
};

pub struct BazaarBackend;

fn revno(tool: &Tool, source: &Source) -> Result<String> {
    let mut scratch = CommandLog::new();
    let output = tool.run(&["revno", "--tree"], Some(&source.path), &mut scratch)?;
    Ok(output.trim().to_string())
}

fn checkout(source: &Source, options: &SyncOptions, verb: Verb) -> Result<Outcome> {
    if source.path.exists() {
        return Ok(already_present(source, verb));
    }
    ensure_parent(source)?;
    if source.depth.is_some() {
        warn!("Ignoring depth for '{}': bazaar does not support shallow branches.", source.name);
    }

    let tool = options.tool("bzr");
    let mut log = CommandLog::new();
    let path = source.path.to_string_lossy();

    let mut args = vec!["branch", "--quiet"];
    if let Some(revision) = &source.revision {
        args.extend(["-r", revision.as_str()]);
    }
    args.push(source.url.as_str());
    args.push(&path);
    tool.run(&args, None, &mut log)?;

    let message = format!("Branched '{}' with bazaar from '{}'.", source.name, source.url);
    info!("{}", message);
    Ok(Outcome::new(source, verb, OutcomeStatus::Cloned, message, log))
}

impl Backend for BazaarBackend {
    fn kind(&self) -> VcsKind {
        VcsKind::Bazaar
    }

    fn validate(&self, source: &Source) -> Result<()> {
        source.validate_pin()?;
        if let Some(branch) = &source.branch {
            return Err(Error::Configuration {
                message: format!(
                    "source '{}' sets branch '{}', which bazaar does not support",
                    source.name, branch
                ),
                hint: Some("point 'url' at the branch instead".to_string()),
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

        let tool = options.tool("bzr");
        let mut log = CommandLog::new();
        let before = revno(&tool, source)?;

        let mut args = vec!["pull", "--quiet"];
        if let Some(revision) = &source.revision {
            args.extend(["--overwrite", "-r", revision.as_str()]);
        }
        args.push(source.url.as_str());
        tool.run(&args, Some(&source.path), &mut log)?;
        info!("Updated '{}' with bazaar.", source.name);

        let after = revno(&tool, source)?;
        let status = if before != after {
            OutcomeStatus::Updated
        } else {
            OutcomeStatus::Unchanged
        };
        Ok(Outcome::new(source, Verb::Update, status, format!("at revno {}", after), log))
    }

    fn status(
        &self,
        source: &Source,
        options: &SyncOptions,
        verbose: bool,
    ) -> Result<WorkingCopyStatus> {
        let tool = options.tool("bzr");
        let mut log = CommandLog::new();
        let changes = tool.run(&["status", "--short"], Some(&source.path), &mut log)?;
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
}
