//! Mercurial backend, driving the `hg` command.
//!
//! Named branches map directly onto the source's `branch`; a pinned revision
//! is passed to `hg update -r` as-is. Mercurial has no shallow clones, so a
//! configured depth is ignored with a warning.

use log::{info, warn};

use crate::error::Result;
use crate::process::{CommandLog, Tool};
use crate::source::{Source, VcsKind};
use crate::vcs::{
    already_present, ensure_parent, Backend, CertificateTrust, Outcome, OutcomeStatus,
    SyncOptions, Verb, WorkingCopyState, WorkingCopyStatus,
};

pub struct MercurialBackend;

fn remote_args(options: &SyncOptions) -> Vec<&'static str> {
    match options.certificate_trust {
        CertificateTrust::Accept => vec!["--insecure"],
        _ => Vec::new(),
    }
}

fn warn_depth(source: &Source) {
    if source.depth.is_some() {
        warn!(
            "Ignoring depth for '{}': mercurial does not support shallow clones.",
            source.name
        );
    }
}

/// Current `(branch, node)` of the working copy parent.
fn identify(tool: &Tool, source: &Source) -> Result<(String, String)> {
    let mut scratch = CommandLog::new();
    let output = tool.run(
        &["log", "-r", ".", "--template", "{branch}\\n{node}\\n"],
        Some(&source.path),
        &mut scratch,
    )?;
    let mut lines = output.lines();
    let branch = lines.next().unwrap_or_default().trim().to_string();
    let node = lines.next().unwrap_or_default().trim().to_string();
    Ok((branch, node))
}

fn checkout(source: &Source, options: &SyncOptions, verb: Verb) -> Result<Outcome> {
    if source.path.exists() {
        return Ok(already_present(source, verb));
    }
    ensure_parent(source)?;
    warn_depth(source);

    let tool = options.tool("hg");
    let mut log = CommandLog::new();
    let path = source.path.to_string_lossy();

    let mut args = vec!["clone", "--quiet"];
    args.extend(remote_args(options));
    if let Some(target) = source.revision.as_ref().or(source.branch.as_ref()) {
        args.extend(["--updaterev", target.as_str()]);
    }
    args.push(source.url.as_str());
    args.push(&path);
    tool.run(&args, None, &mut log)?;

    let message = format!("Cloned '{}' with mercurial from '{}'.", source.name, source.url);
    info!("{}", message);
    Ok(Outcome::new(source, verb, OutcomeStatus::Cloned, message, log))
}

impl Backend for MercurialBackend {
    fn kind(&self) -> VcsKind {
        VcsKind::Mercurial
    }

    fn checkout(&self, source: &Source, options: &SyncOptions) -> Result<Outcome> {
        checkout(source, options, Verb::Checkout)
    }

    fn update(&self, source: &Source, options: &SyncOptions) -> Result<Outcome> {
        if !source.path.exists() {
            return checkout(source, options, Verb::Update);
        }
        warn_depth(source);

        let tool = options.tool("hg");
        let mut log = CommandLog::new();
        let cwd = Some(source.path.as_path());
        let (branch_before, node_before) = identify(&tool, source)?;

        let mut pull = vec!["pull", "--quiet"];
        pull.extend(remote_args(options));
        tool.run(&pull, cwd, &mut log)?;

        let target = match (&source.revision, &source.branch) {
            (Some(revision), _) => revision.clone(),
            (None, Some(branch)) => branch.clone(),
            (None, None) => "default".to_string(),
        };
        tool.run(&["update", "--quiet", "-r", &target], cwd, &mut log)?;
        info!("Updated '{}' with mercurial.", source.name);

        let (branch_after, node_after) = identify(&tool, source)?;
        let status = if branch_before != branch_after {
            OutcomeStatus::Switched
        } else if node_before != node_after {
            OutcomeStatus::Updated
        } else {
            OutcomeStatus::Unchanged
        };
        let message = format!("at {} on branch '{}'", short(&node_after), branch_after);
        Ok(Outcome::new(source, Verb::Update, status, message, log))
    }

    fn status(
        &self,
        source: &Source,
        options: &SyncOptions,
        verbose: bool,
    ) -> Result<WorkingCopyStatus> {
        let tool = options.tool("hg");
        let mut log = CommandLog::new();
        let changes = tool.run(&["status"], Some(&source.path), &mut log)?;
        let state = if changes.trim().is_empty() {
            WorkingCopyState::Clean
        } else {
            WorkingCopyState::Dirty
        };
        let mut text = changes.trim_end().to_string();
        if verbose {
            let summary = tool.run(&["summary"], Some(&source.path), &mut log)?;
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(summary.trim_end());
        }
        Ok(WorkingCopyStatus { state, text })
    }

    fn matches(&self, source: &Source, options: &SyncOptions) -> Result<bool> {
        let output = options.tool("hg").probe(&["paths", "default"], Some(&source.path))?;
        Ok(output.success() && output.stdout.trim() == source.url)
    }
}

fn short(node: &str) -> &str {
    &node[..node.len().min(12)]
}
