//! # Git Backend
//!
//! Drives the system `git` command, which picks up SSH keys, credential
//! helpers and everything else configured in `~/.gitconfig`.
//!
//! ## Target state
//!
//! After every checkout or update the working copy is in exactly one of these
//! states, chosen from the source configuration:
//!
//! 1. **Revision pinned**: detached at that revision. No merge ever happens.
//! 2. **Branch pinned**: on a local branch of that name tracking
//!    `origin/<branch>`, fast-forwarded to the remote tip.
//! 3. **Neither**: same as 2, using the remote's default branch.
//!
//! Shallow clones fetch only one branch. Switching one to another branch first
//! adds that branch to the remote's fetch refspecs, so later fetches keep
//! `origin/<branch>` current, and fetches it at the same depth. A revision
//! outside the fetched history is fetched by id, also at the same depth.

use std::path::Path;

use log::info;

use crate::error::Result;
use crate::process::{CommandLog, Tool};
use crate::source::{Source, SubmodulePolicy, VcsKind};
use crate::vcs::{
    already_present, ensure_parent, Backend, Outcome, OutcomeStatus, SyncOptions, Verb,
    WorkingCopyState, WorkingCopyStatus,
};

const REMOTE: &str = "origin";

/// Adapter for git repositories.
pub struct GitBackend;

impl Backend for GitBackend {
    fn kind(&self) -> VcsKind {
        VcsKind::Git
    }

    fn checkout(&self, source: &Source, options: &SyncOptions) -> Result<Outcome> {
        checkout(source, options, Verb::Checkout)
    }

    fn update(&self, source: &Source, options: &SyncOptions) -> Result<Outcome> {
        if !source.path.exists() {
            return checkout(source, options, Verb::Update);
        }

        let mut wc = WorkingCopy::new(source, options.tool("git"));
        let before = wc.position()?;

        info!("Updated '{}' with git.", source.name);

        if let Some(revision) = &source.revision {
            wc.git(&["fetch", REMOTE])?;
            wc.checkout_revision(revision)?;
        } else {
            let branch = match &source.branch {
                Some(branch) => branch.clone(),
                None => wc.default_branch(options.offline)?,
            };
            wc.ensure_remote_branch(&branch)?;
            wc.git(&["fetch", REMOTE])?;
            wc.switch_branch(&branch)?;
            wc.fast_forward(&branch)?;
        }
        wc.sync_submodules()?;

        let after = wc.position()?;
        let (status, message) = if before.branch != after.branch {
            (
                OutcomeStatus::Switched,
                format!("switched to {}", after.describe()),
            )
        } else if before.head != after.head {
            (
                OutcomeStatus::Updated,
                format!("updated {}", after.describe()),
            )
        } else {
            (
                OutcomeStatus::Unchanged,
                format!("already at {}", after.describe()),
            )
        };
        Ok(Outcome::new(source, Verb::Update, status, message, wc.log))
    }

    fn status(
        &self,
        source: &Source,
        options: &SyncOptions,
        verbose: bool,
    ) -> Result<WorkingCopyStatus> {
        let tool = options.tool("git");
        let mut log = CommandLog::new();
        let output = tool.run(
            &["status", "--porcelain", "--branch"],
            Some(&source.path),
            &mut log,
        )?;
        Ok(parse_status(&output, verbose))
    }

    fn matches(&self, source: &Source, options: &SyncOptions) -> Result<bool> {
        let output = options.tool("git").probe(&["remote", "get-url", REMOTE], Some(&source.path))?;
        Ok(output.success() && output.stdout.trim() == source.url)
    }
}

fn checkout(source: &Source, options: &SyncOptions, verb: Verb) -> Result<Outcome> {
    if source.path.exists() {
        return Ok(already_present(source, verb));
    }
    ensure_parent(source)?;

    let tool = options.tool("git");
    let mut log = CommandLog::new();
    let depth = source.depth.map(|d| d.to_string());
    let path = source.path.to_string_lossy();

    let mut args = vec!["clone", "--quiet"];
    if let Some(depth) = &depth {
        args.extend(["--depth", depth.as_str()]);
    }
    if let Some(branch) = &source.branch {
        args.extend(["--branch", branch.as_str()]);
    }
    args.push(source.url.as_str());
    args.push(&path);

    let mut message = format!("Cloned '{}' with git", source.name);
    if let Some(branch) = &source.branch {
        message.push_str(&format!(" using branch '{}'", branch));
    }
    message.push_str(&format!(" from '{}'.", source.url));
    info!("{}", message);

    tool.run(&args, None, &mut log)?;

    let mut wc = WorkingCopy::new(source, tool);
    wc.log = log;
    if let Some(revision) = &source.revision {
        wc.checkout_revision(revision)?;
    }
    wc.sync_submodules()?;

    Ok(Outcome::new(source, verb, OutcomeStatus::Cloned, message, wc.log))
}

/// Branch and commit a working copy is at.
#[derive(Debug, PartialEq, Eq)]
struct Position {
    /// `None` when HEAD is detached.
    branch: Option<String>,
    head: Option<String>,
}

impl Position {
    fn describe(&self) -> String {
        let head = self.head.as_deref().map(short_id).unwrap_or("unborn");
        match &self.branch {
            Some(branch) => format!("branch '{}' ({})", branch, head),
            None => format!("revision {}", head),
        }
    }
}

fn short_id(id: &str) -> &str {
    &id[..id.len().min(10)]
}

/// A single operation on one working copy, accumulating the tool log.
struct WorkingCopy<'a> {
    source: &'a Source,
    tool: Tool,
    log: CommandLog,
}

impl<'a> WorkingCopy<'a> {
    fn new(source: &'a Source, tool: Tool) -> Self {
        Self {
            source,
            tool,
            log: CommandLog::new(),
        }
    }

    fn path(&self) -> &Path {
        &self.source.path
    }

    /// Run a git command that must succeed.
    fn git(&mut self, args: &[&str]) -> Result<String> {
        self.tool.run(args, Some(&self.source.path), &mut self.log)
    }

    /// Run a git query; `None` when it exits unsuccessfully.
    fn query(&self, args: &[&str]) -> Result<Option<String>> {
        let output = self.tool.probe(args, Some(self.path()))?;
        Ok(output.success().then(|| output.stdout.trim().to_string()))
    }

    fn position(&self) -> Result<Position> {
        Ok(Position {
            branch: self.query(&["symbolic-ref", "--quiet", "--short", "HEAD"])?,
            head: self.query(&["rev-parse", "--verify", "--quiet", "HEAD"])?,
        })
    }

    fn refs(&self, namespace: &str) -> Result<Vec<String>> {
        let output = self
            .query(&["for-each-ref", "--format=%(refname)", namespace])?
            .unwrap_or_default();
        Ok(parse_refs(&output, namespace))
    }

    fn has_local_branch(&self, branch: &str) -> Result<bool> {
        Ok(self.refs("refs/heads/")?.iter().any(|b| b == branch))
    }

    fn has_remote_branch(&self, branch: &str) -> Result<bool> {
        let namespace = format!("refs/remotes/{}/", REMOTE);
        Ok(self.refs(&namespace)?.iter().any(|b| b == branch))
    }

    fn depth_args(&self) -> Vec<String> {
        match self.source.depth {
            Some(depth) => vec!["--depth".to_string(), depth.to_string()],
            None => Vec::new(),
        }
    }

    /// The branch `origin/HEAD` points to.
    ///
    /// Asks the remote when online, since the local `origin/HEAD` is only
    /// written at clone time.
    fn default_branch(&mut self, offline: bool) -> Result<String> {
        if !offline {
            if let Some(output) = self.query(&["ls-remote", "--symref", REMOTE, "HEAD"])? {
                if let Some(branch) = parse_symref(&output) {
                    return Ok(branch);
                }
            }
        }
        let local = format!("refs/remotes/{}/HEAD", REMOTE);
        if let Some(target) = self.query(&["symbolic-ref", "--quiet", &local])? {
            let prefix = format!("refs/remotes/{}/", REMOTE);
            if let Some(branch) = target.strip_prefix(&prefix) {
                return Ok(branch.to_string());
            }
        }
        if self.has_remote_branch("main")? && !self.has_remote_branch("master")? {
            return Ok("main".to_string());
        }
        Ok("master".to_string())
    }

    /// Add `branch` to the remote's fetch refspecs unless they already cover it.
    ///
    /// Shallow clones are single-branch: without this, `origin/<branch>` is
    /// neither a valid tracking target nor advanced by later fetches.
    fn ensure_tracked(&mut self, branch: &str) -> Result<()> {
        let key = format!("remote.{}.fetch", REMOTE);
        let refspecs = self
            .query(&["config", "--get-all", &key])?
            .unwrap_or_default();
        if covers_branch(&refspecs, branch) {
            return Ok(());
        }
        self.git(&["remote", "set-branches", "--add", REMOTE, branch])?;
        Ok(())
    }

    /// Make `origin/<branch>` available locally, fetching it if needed.
    fn ensure_remote_branch(&mut self, branch: &str) -> Result<()> {
        self.ensure_tracked(branch)?;
        if self.has_remote_branch(branch)? {
            return Ok(());
        }
        let refspec = format!("+refs/heads/{0}:refs/remotes/{1}/{0}", branch, REMOTE);
        let depth = self.depth_args();
        let mut args = vec!["fetch"];
        args.extend(depth.iter().map(String::as_str));
        args.extend([REMOTE, refspec.as_str()]);
        self.git(&args)?;
        Ok(())
    }

    /// Make a revision available locally, fetching it by id if needed.
    fn ensure_revision(&mut self, revision: &str) -> Result<()> {
        let object = format!("{}^{{commit}}", revision);
        if self.query(&["cat-file", "-e", &object])?.is_some() {
            return Ok(());
        }
        let depth = self.depth_args();
        let mut args = vec!["fetch"];
        args.extend(depth.iter().map(String::as_str));
        args.extend([REMOTE, revision]);
        self.git(&args)?;
        Ok(())
    }

    fn checkout_revision(&mut self, revision: &str) -> Result<()> {
        self.ensure_revision(revision)?;
        info!("Switching to rev '{}'.", revision);
        self.git(&["checkout", "--quiet", revision])?;
        Ok(())
    }

    /// Check out `branch`, creating a tracking branch if it is only remote.
    fn switch_branch(&mut self, branch: &str) -> Result<()> {
        self.ensure_remote_branch(branch)?;
        let current = self.position()?.branch;
        if current.as_deref() == Some(branch) {
            return Ok(());
        }
        if self.has_local_branch(branch)? {
            info!("Switching to branch '{}'.", branch);
            self.git(&["checkout", "--quiet", branch])?;
        } else {
            let remote = format!("{}/{}", REMOTE, branch);
            info!("Switching to remote branch 'remotes/{}'.", remote);
            self.git(&["checkout", "--quiet", "-b", branch, "--track", &remote])?;
        }
        Ok(())
    }

    fn fast_forward(&mut self, branch: &str) -> Result<()> {
        let remote = format!("{}/{}", REMOTE, branch);
        self.git(&["merge", "--ff-only", &remote])?;
        Ok(())
    }

    fn sync_submodules(&mut self) -> Result<()> {
        let wanted = match self.source.submodules {
            SubmodulePolicy::Always => true,
            SubmodulePolicy::Never => false,
            SubmodulePolicy::IfPresent => self.path().join(".gitmodules").exists(),
        };
        if wanted {
            self.git(&["submodule", "update", "--init", "--recursive"])?;
        }
        Ok(())
    }
}

/// Whether one of the `remote.origin.fetch` refspecs maps `branch` to
/// `origin/<branch>`.
fn covers_branch(refspecs: &str, branch: &str) -> bool {
    let wildcard = format!("refs/heads/*:refs/remotes/{}/*", REMOTE);
    let exact = format!("refs/heads/{0}:refs/remotes/{1}/{0}", branch, REMOTE);
    refspecs
        .lines()
        .map(|line| line.trim().trim_start_matches('+'))
        .any(|spec| spec == wildcard || spec == exact)
}

/// Branch names below `namespace`, skipping the symbolic `HEAD`.
fn parse_refs(output: &str, namespace: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix(namespace))
        .filter(|name| *name != "HEAD")
        .map(str::to_string)
        .collect()
}

/// Extract the branch from `git ls-remote --symref <remote> HEAD` output.
fn parse_symref(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let rest = line.strip_prefix("ref:")?.trim();
        let (target, name) = rest.split_once(char::is_whitespace)?;
        if name.trim() != "HEAD" {
            return None;
        }
        target.strip_prefix("refs/heads/").map(str::to_string)
    })
}

/// Interpret `git status --porcelain --branch` output.
fn parse_status(output: &str, verbose: bool) -> WorkingCopyStatus {
    let mut branch_line = None;
    let mut changes = Vec::new();
    for line in output.lines().filter(|l| !l.trim().is_empty()) {
        if line.starts_with("## ") {
            branch_line = Some(line);
        } else {
            changes.push(line);
        }
    }

    let state = if !changes.is_empty() {
        WorkingCopyState::Dirty
    } else if branch_line.is_some_and(|l| l.contains("[ahead")) {
        WorkingCopyState::Ahead
    } else {
        WorkingCopyState::Clean
    };

    let mut lines: Vec<&str> = Vec::new();
    if verbose {
        lines.extend(branch_line);
    }
    lines.extend(changes);
    WorkingCopyStatus {
        state,
        text: lines.join("\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_covers_branch() {
        let full = "+refs/heads/*:refs/remotes/origin/*\n";
        assert!(covers_branch(full, "test"));

        let single = "+refs/heads/master:refs/remotes/origin/master";
        assert!(covers_branch(single, "master"));
        assert!(!covers_branch(single, "test"));

        let added = "+refs/heads/master:refs/remotes/origin/master\n+refs/heads/test:refs/remotes/origin/test";
        assert!(covers_branch(added, "test"));
        assert!(!covers_branch("", "master"));
    }

    #[test]
    fn test_parse_symref() {
        let output = "ref: refs/heads/develop\tHEAD\n0123456789abcdef\tHEAD\n";
        assert_eq!(parse_symref(output), Some("develop".to_string()));
    }

    #[test]
    fn test_parse_symref_without_symref_line() {
        assert_eq!(parse_symref("0123456789abcdef\tHEAD\n"), None);
        assert_eq!(parse_symref(""), None);
    }

    #[test]
    fn test_parse_refs_skips_head() {
        let output = "refs/remotes/origin/HEAD\nrefs/remotes/origin/master\nrefs/remotes/origin/feature/x\n";
        assert_eq!(
            parse_refs(output, "refs/remotes/origin/"),
            vec!["master", "feature/x"]
        );
    }

    #[test]
    fn test_parse_status_clean() {
        let status = parse_status("## master...origin/master\n", false);
        assert_eq!(status.state, WorkingCopyState::Clean);
        assert_eq!(status.text, "");
    }

    #[test]
    fn test_parse_status_verbose_keeps_branch_line() {
        let status = parse_status("## master...origin/master\n", true);
        assert_eq!(status.text, "## master...origin/master");
    }

    #[test]
    fn test_parse_status_dirty() {
        let status = parse_status("## master...origin/master\n M foo\n?? bar\n", false);
        assert_eq!(status.state, WorkingCopyState::Dirty);
        assert_eq!(status.text, " M foo\n?? bar");
    }

    #[test]
    fn test_parse_status_ahead() {
        let status = parse_status("## master...origin/master [ahead 2]\n", true);
        assert_eq!(status.state, WorkingCopyState::Ahead);
    }

    #[test]
    fn test_position_describe() {
        let on_branch = Position {
            branch: Some("master".to_string()),
            head: Some("0123456789abcdef0123".to_string()),
        };
        assert_eq!(on_branch.describe(), "branch 'master' (0123456789)");

        let detached = Position {
            branch: None,
            head: Some("abc".to_string()),
        };
        assert_eq!(detached.describe(), "revision abc");
    }

    #[test]
    fn test_revision_and_branch_rejected_by_validate() {
        let mut source = Source::new("egg", VcsKind::Git, "url", "sources");
        source.revision = Some("abc".to_string());
        source.branch = Some("test".to_string());
        assert!(GitBackend.validate(&source).is_err());
    }
}
