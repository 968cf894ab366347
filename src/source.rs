//! # Source Descriptors
//!
//! A [`Source`] is the immutable description of one package that is developed
//! from a version-control checkout instead of being installed from an index.
//! Sources are built once by the configuration loader and then only read.

use std::fmt;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Error, Result};

/// The version-control systems a source can live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VcsKind {
    Git,
    Mercurial,
    Subversion,
    Bazaar,
    /// A plain directory on the local filesystem, linked into place.
    Filesystem,
}

impl VcsKind {
    /// All kinds, in the order backends are registered.
    pub const ALL: [VcsKind; 5] = [
        VcsKind::Git,
        VcsKind::Mercurial,
        VcsKind::Subversion,
        VcsKind::Bazaar,
        VcsKind::Filesystem,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VcsKind::Git => "git",
            VcsKind::Mercurial => "hg",
            VcsKind::Subversion => "svn",
            VcsKind::Bazaar => "bzr",
            VcsKind::Filesystem => "fs",
        }
    }
}

impl fmt::Display for VcsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VcsKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "git" => Ok(VcsKind::Git),
            "hg" | "mercurial" => Ok(VcsKind::Mercurial),
            "svn" | "subversion" => Ok(VcsKind::Subversion),
            "bzr" | "bazaar" => Ok(VcsKind::Bazaar),
            "fs" | "filesystem" => Ok(VcsKind::Filesystem),
            other => Err(format!(
                "unknown vcs '{}' (expected git, hg, svn, bzr or fs)",
                other
            )),
        }
    }
}

/// What to do with nested repositories after a checkout or branch switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmodulePolicy {
    /// Always run a recursive submodule update.
    #[default]
    Always,
    /// Never touch submodules.
    Never,
    /// Update only when the working copy declares submodules.
    IfPresent,
}

impl FromStr for SubmodulePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "always" | "recursive" => Ok(SubmodulePolicy::Always),
            "never" => Ok(SubmodulePolicy::Never),
            "if-present" | "checkout" => Ok(SubmodulePolicy::IfPresent),
            other => Err(format!(
                "unknown submodules policy '{}' (expected always, never or if-present)",
                other
            )),
        }
    }
}

/// How a source ends up in the merged requirements file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstallMode {
    /// Installed as an editable (`-e`) entry.
    #[default]
    Editable,
    /// Checked out but left out of the requirements file.
    Skip,
}

impl FromStr for InstallMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "editable" | "direct" => Ok(InstallMode::Editable),
            "skip" => Ok(InstallMode::Skip),
            other => Err(format!(
                "unknown install-mode '{}' (expected editable or skip)",
                other
            )),
        }
    }
}

/// One managed package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Unique name; also the directory name below `target`.
    pub name: String,
    pub kind: VcsKind,
    pub url: String,
    /// Parent directory of the working copy, as configured.
    pub target: String,
    /// Working copy location, `target/name`.
    pub path: PathBuf,
    pub revision: Option<String>,
    pub branch: Option<String>,
    pub extras: Vec<String>,
    pub subdirectory: Option<String>,
    pub submodules: SubmodulePolicy,
    pub depth: Option<NonZeroU32>,
    pub install_mode: InstallMode,
}

impl Source {
    /// Creates a source with defaults for everything but the essentials.
    pub fn new(name: &str, kind: VcsKind, url: &str, target: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            url: url.to_string(),
            target: target.to_string(),
            path: PathBuf::from(target).join(name),
            revision: None,
            branch: None,
            extras: Vec::new(),
            subdirectory: None,
            submodules: SubmodulePolicy::default(),
            depth: None,
            install_mode: InstallMode::default(),
        }
    }

    /// The normalized package key used for suppression decisions.
    pub fn key(&self) -> String {
        normalize_key(&self.name)
    }

    /// Fails if both a revision and a branch are pinned.
    pub fn validate_pin(&self) -> Result<()> {
        if let (Some(revision), Some(branch)) = (&self.revision, &self.branch) {
            return Err(Error::Configuration {
                message: format!(
                    "source '{}' sets both revision '{}' and branch '{}'",
                    self.name, revision, branch
                ),
                hint: Some("remove one of 'revision' or 'branch'".to_string()),
            });
        }
        Ok(())
    }

    /// The `-e` line for the requirements file, or `None` when skipped.
    pub fn editable_entry(&self) -> Option<String> {
        if self.install_mode == InstallMode::Skip {
            return None;
        }
        let target = self.target.trim_start_matches("./").trim_end_matches('/');
        let mut entry = if PathBuf::from(target).is_absolute() {
            format!("-e {}/{}", target, self.name)
        } else {
            format!("-e ./{}/{}", target, self.name)
        };
        if let Some(subdirectory) = &self.subdirectory {
            entry.push('/');
            entry.push_str(subdirectory.trim_matches('/'));
        }
        if !self.extras.is_empty() {
            entry.push_str(&format!("[{}]", self.extras.join(",")));
        }
        Some(entry)
    }
}

/// Normalizes a package name into its comparison key.
///
/// Runs of characters other than ASCII letters, digits and `.` collapse into
/// a single `-`, and the result is lowercased, so `Zope_Interface` and
/// `zope-interface` share a key.
pub fn normalize_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    let mut in_run = false;
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '.' {
            key.push(c.to_ascii_lowercase());
            in_run = false;
        } else if !in_run {
            key.push('-');
            in_run = true;
        }
    }
    key
}
