//! # Configuration Loading
//!
//! This module reads the `devsync.ini` file into a read-only [`Configuration`].
//! The file has one `[settings]` section for global options and one section
//! per managed source:
//!
//! ```ini
//! [settings]
//! requirements-in = requirements.txt
//! threads = 4
//! version-overrides =
//!     requests==2.31.0
//! ignores =
//!     my.package
//!
//! [my.package]
//! url = https://github.com/example/my.package.git
//! branch = main
//! extras = test
//! ```
//!
//! Indented lines continue the value of the previous key, which is how the
//! list-valued settings are written. Lines starting with `#` or `;` are
//! comments.
//!
//! Parsing is strict about values it cannot interpret (an unknown VCS kind, a
//! depth of zero) and reports them with the line they came from. It does not
//! reject a source pinning both a revision and a branch: that is checked by the
//! orchestrator right before a run, so the error is reported per source.

use std::collections::HashSet;
use std::fs;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::warn;

use crate::defaults;
use crate::error::{Error, Result};
use crate::requirements::classify::{parse_specifier, KeySets, ParsedLine};
use crate::source::{normalize_key, InstallMode, Source, SubmodulePolicy, VcsKind};
use crate::vcs::{CertificateTrust, SyncOptions};

/// A single `key = value` entry and the line it started on.
#[derive(Clone, Debug)]
struct IniEntry {
    key: String,
    value: String,
    line: usize,
}

/// A named section with its entries in file order.
#[derive(Clone, Debug)]
struct IniSection {
    name: String,
    line: usize,
    entries: Vec<IniEntry>,
}

impl IniSection {
    fn get(&self, key: &str) -> Option<&IniEntry> {
        self.entries.iter().rev().find(|entry| entry.key == key)
    }
}

/// Parse INI content into sections.
///
/// Supports:
/// - Section headers: `[section_name]`
/// - Key-value pairs: `key = value` (or `key: value`)
/// - Continuation lines: indented lines extend the previous value
/// - Comments: lines starting with `#` or `;`
fn parse_ini(content: &str, origin: &str) -> Result<Vec<IniSection>> {
    let mut sections: Vec<IniSection> = Vec::new();

    for (index, raw) in content.lines().enumerate() {
        let line_no = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        let indented = raw.starts_with(' ') || raw.starts_with('\t');
        if indented {
            if let Some(entry) = sections.last_mut().and_then(|s| s.entries.last_mut()) {
                if !entry.value.is_empty() {
                    entry.value.push('\n');
                }
                entry.value.push_str(trimmed);
                continue;
            }
        }

        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            let name = trimmed[1..trimmed.len() - 1].trim().to_string();
            if sections.iter().any(|section| section.name == name) {
                return Err(Error::ConfigParse {
                    path: origin.to_string(),
                    line: line_no,
                    message: format!("duplicate section [{}]", name),
                });
            }
            sections.push(IniSection {
                name,
                line: line_no,
                entries: Vec::new(),
            });
            continue;
        }

        let separator = trimmed.find('=').or_else(|| trimmed.find(':'));
        let Some(pos) = separator else {
            return Err(Error::ConfigParse {
                path: origin.to_string(),
                line: line_no,
                message: format!("expected 'key = value', found '{}'", trimmed),
            });
        };
        let Some(section) = sections.last_mut() else {
            return Err(Error::ConfigParse {
                path: origin.to_string(),
                line: line_no,
                message: "entry outside of any section".to_string(),
            });
        };
        section.entries.push(IniEntry {
            key: trimmed[..pos].trim().to_lowercase(),
            value: trimmed[pos + 1..].trim().to_string(),
            line: line_no,
        });
    }

    Ok(sections)
}

/// A version override: a requirement line that replaces constraints for its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    pub key: String,
    pub line: String,
}

/// Everything a run needs, loaded once and passed by reference.
#[derive(Debug, Clone)]
pub struct Configuration {
    /// Entry point path or URL; blank means no input requirements.
    pub requirements_in: String,
    pub requirements_out: PathBuf,
    pub constraints_out: PathBuf,
    pub threads: usize,
    pub offline: bool,
    pub timeout: Option<Duration>,
    pub certificate_trust: CertificateTrust,
    pub overrides: Vec<Override>,
    /// Normalized keys of ignored packages.
    pub ignores: Vec<String>,
    /// Managed sources in configuration order.
    pub sources: Vec<Source>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            requirements_in: defaults::REQUIREMENTS_IN.to_string(),
            requirements_out: PathBuf::from(defaults::REQUIREMENTS_OUT),
            constraints_out: PathBuf::from(defaults::CONSTRAINTS_OUT),
            threads: defaults::THREADS,
            offline: false,
            timeout: None,
            certificate_trust: CertificateTrust::default(),
            overrides: Vec::new(),
            ignores: Vec::new(),
            sources: Vec::new(),
        }
    }
}

/// Source-level defaults taken from `[settings]`.
struct SourceDefaults {
    target: String,
    kind: VcsKind,
    install_mode: InstallMode,
    submodules: SubmodulePolicy,
    depth: Option<NonZeroU32>,
}

impl Configuration {
    /// Load the configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parse configuration content; `origin` names it in error messages.
    pub fn parse(content: &str, origin: &str) -> Result<Self> {
        let sections = parse_ini(content, origin)?;
        let mut config = Configuration::default();
        let mut source_defaults = SourceDefaults {
            target: defaults::TARGET.to_string(),
            kind: VcsKind::Git,
            install_mode: InstallMode::default(),
            submodules: SubmodulePolicy::default(),
            depth: None,
        };

        if let Some(settings) = sections
            .iter()
            .find(|s| s.name == defaults::SETTINGS_SECTION)
        {
            config.apply_settings(settings, &mut source_defaults, origin)?;
        }

        for section in sections
            .iter()
            .filter(|s| s.name != defaults::SETTINGS_SECTION)
        {
            let source = parse_source(section, &source_defaults, origin)?;
            config.sources.push(source);
        }

        Ok(config)
    }

    fn apply_settings(
        &mut self,
        settings: &IniSection,
        source_defaults: &mut SourceDefaults,
        origin: &str,
    ) -> Result<()> {
        for entry in &settings.entries {
            let value = entry.value.as_str();
            match entry.key.as_str() {
                "requirements-in" => self.requirements_in = value.to_string(),
                "requirements-out" => self.requirements_out = PathBuf::from(value),
                "constraints-out" => self.constraints_out = PathBuf::from(value),
                "default-target" => source_defaults.target = value.to_string(),
                "default-vcs" => source_defaults.kind = parse_value(entry, origin)?,
                "default-install-mode" => {
                    source_defaults.install_mode = parse_value(entry, origin)?
                }
                "default-submodules" => source_defaults.submodules = parse_value(entry, origin)?,
                "git-clone-depth" => {
                    source_defaults.depth = Some(parse_depth(entry, origin)?)
                }
                "threads" => self.threads = parse_positive::<usize>(entry, origin)?,
                "offline" => self.offline = parse_bool(entry, origin)?,
                "timeout" => {
                    let seconds = parse_positive::<u64>(entry, origin)?;
                    self.timeout = Some(Duration::from_secs(seconds));
                }
                "certificate-trust" => self.certificate_trust = parse_value(entry, origin)?,
                "version-overrides" => {
                    self.overrides.clear();
                    for line in entry.value.lines().map(str::trim).filter(|l| !l.is_empty()) {
                        let parsed = parse_override(line, entry, origin)?;
                        // One override per package: a later line replaces an
                        // earlier one in place.
                        match self.overrides.iter_mut().find(|o| o.key == parsed.key) {
                            Some(existing) => *existing = parsed,
                            None => self.overrides.push(parsed),
                        }
                    }
                }
                "ignores" => {
                    self.ignores = entry
                        .value
                        .lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .map(normalize_key)
                        .collect();
                }
                other => warn!(
                    "{} line {}: ignoring unknown setting '{}'",
                    origin, entry.line, other
                ),
            }
        }
        Ok(())
    }

    /// Look up a source by name.
    pub fn source(&self, name: &str) -> Option<&Source> {
        self.sources.iter().find(|source| source.name == name)
    }

    /// Names of all configured sources, in configuration order.
    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name.clone()).collect()
    }

    pub fn package_keys(&self) -> HashSet<String> {
        self.sources.iter().map(Source::key).collect()
    }

    pub fn override_keys(&self) -> HashSet<String> {
        self.overrides.iter().map(|o| o.key.clone()).collect()
    }

    pub fn ignore_keys(&self) -> HashSet<String> {
        self.ignores.iter().cloned().collect()
    }

    /// The three key sets the line classifier needs.
    pub fn key_sets(&self) -> KeySets {
        KeySets {
            packages: self.package_keys(),
            overrides: self.override_keys(),
            ignores: self.ignore_keys(),
        }
    }

    /// Cross-cutting working-copy options for this run.
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            threads: self.threads,
            offline: self.offline,
            timeout: self.timeout,
            certificate_trust: self.certificate_trust,
        }
    }
}

fn parse_source(section: &IniSection, defaults: &SourceDefaults, origin: &str) -> Result<Source> {
    let url = section.get("url").ok_or_else(|| Error::ConfigParse {
        path: origin.to_string(),
        line: section.line,
        message: format!("source [{}] has no url", section.name),
    })?;
    let kind = match section.get("vcs") {
        Some(entry) => parse_value(entry, origin)?,
        None => defaults.kind,
    };
    let target = section
        .get("target")
        .map(|e| e.value.clone())
        .unwrap_or_else(|| defaults.target.clone());

    let mut source = Source::new(&section.name, kind, &url.value, &target);
    source.install_mode = defaults.install_mode;
    source.submodules = defaults.submodules;
    source.depth = defaults.depth;

    for entry in &section.entries {
        let value = entry.value.trim();
        match entry.key.as_str() {
            "url" | "vcs" | "target" => {}
            "branch" => source.branch = non_empty(value),
            "revision" | "rev" => source.revision = non_empty(value),
            "extras" => {
                source.extras = value
                    .split([',', '\n'])
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            "subdirectory" => source.subdirectory = non_empty(value),
            "install-mode" => source.install_mode = parse_value(entry, origin)?,
            "submodules" => source.submodules = parse_value(entry, origin)?,
            "depth" => source.depth = Some(parse_depth(entry, origin)?),
            other => warn!(
                "{} line {}: ignoring unknown key '{}' in [{}]",
                origin, entry.line, other, section.name
            ),
        }
    }

    Ok(source)
}

fn parse_override(line: &str, entry: &IniEntry, origin: &str) -> Result<Override> {
    match parse_specifier(line) {
        ParsedLine::Specifier(specifier) => Ok(Override {
            key: specifier.key(),
            line: line.to_string(),
        }),
        ParsedLine::Raw(_) => Err(Error::ConfigParse {
            path: origin.to_string(),
            line: entry.line,
            message: format!("version override '{}' is not a requirement", line),
        }),
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_value<T: FromStr<Err = String>>(entry: &IniEntry, origin: &str) -> Result<T> {
    entry.value.parse().map_err(|message| Error::ConfigParse {
        path: origin.to_string(),
        line: entry.line,
        message,
    })
}

fn parse_positive<T>(entry: &IniEntry, origin: &str) -> Result<T>
where
    T: FromStr + PartialEq + Default,
{
    match entry.value.trim().parse::<T>() {
        Ok(value) if value != T::default() => Ok(value),
        _ => Err(Error::ConfigParse {
            path: origin.to_string(),
            line: entry.line,
            message: format!(
                "'{}' must be a positive integer, found '{}'",
                entry.key, entry.value
            ),
        }),
    }
}

fn parse_depth(entry: &IniEntry, origin: &str) -> Result<NonZeroU32> {
    entry
        .value
        .trim()
        .parse::<NonZeroU32>()
        .map_err(|_| Error::ConfigParse {
            path: origin.to_string(),
            line: entry.line,
            message: format!("depth must be a positive integer, found '{}'", entry.value),
        })
}

fn parse_bool(entry: &IniEntry, origin: &str) -> Result<bool> {
    match entry.value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" | "" => Ok(false),
        other => Err(Error::ConfigParse {
            path: origin.to_string(),
            line: entry.line,
            message: format!("'{}' must be true or false, found '{}'", entry.key, other),
        }),
    }
}
