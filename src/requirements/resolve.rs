//! Resolution pipeline: reads an entry point and every file it includes.
//!
//! An include target is either a URL (`http`, `https` or `file`) or a path.
//! Relative targets are resolved against the file that included them. A
//! local file that does not exist is read as empty with a warning; a remote
//! that cannot be fetched is an [`Error::Fetch`].

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use url::Url;

use super::{classify, Block, Context, Decision, Entry, KeySets, MergeResult};
use crate::error::{Error, Result};

/// Where an include target lives.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    Path(PathBuf),
    Url(Url),
}

impl Location {
    /// Resolve `target` as written inside the file at `base`, if any.
    fn resolve(target: &str, base: Option<&Location>) -> Result<Location> {
        if let Some(url) = parse_url(target) {
            return Ok(Location::Url(url));
        }
        Ok(match base {
            None => Location::Path(PathBuf::from(target)),
            Some(Location::Path(path)) => Location::Path(
                path.parent()
                    .map(|dir| dir.join(target))
                    .unwrap_or_else(|| PathBuf::from(target)),
            ),
            Some(Location::Url(url)) => Location::Url(url.join(target)?),
        })
    }

    /// The file contents, or `None` when a local file does not exist.
    fn read(&self, target: &str) -> Result<Option<String>> {
        match self {
            Location::Path(path) => read_local(path),
            Location::Url(url) if url.scheme() == "file" => {
                let path = url.to_file_path().map_err(|()| Error::Fetch {
                    target: target.to_string(),
                    message: format!("'{}' is not a local file URL", url),
                })?;
                read_local(&path)
            }
            Location::Url(url) if matches!(url.scheme(), "http" | "https") => {
                fetch(url).map(Some).map_err(|message| Error::Fetch {
                    target: target.to_string(),
                    message,
                })
            }
            Location::Url(url) => Err(Error::Fetch {
                target: target.to_string(),
                message: format!("unsupported URL scheme '{}'", url.scheme()),
            }),
        }
    }
}

/// A target parses as a URL only with a scheme longer than one character,
/// so Windows drive letters stay paths.
fn parse_url(target: &str) -> Option<Url> {
    match Url::parse(target) {
        Ok(url) if url.scheme().len() > 1 => Some(url),
        _ => None,
    }
}

fn read_local(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(fs::read_to_string(path)?))
}

fn fetch(url: &Url) -> std::result::Result<String, String> {
    let mut response = ureq::get(url.as_str()).call().map_err(|e| e.to_string())?;
    response
        .body_mut()
        .read_to_string()
        .map_err(|e| e.to_string())
}

/// Resolve `target` and everything it includes.
///
/// A blank target resolves to an empty result. Requirement lines land in
/// `requirements`, constraint lines in `constraints`; the lines of one file
/// are wrapped in a [`Block`] for its context.
pub fn resolve(target: &str, keys: &KeySets, context: Context) -> Result<MergeResult> {
    if target.trim().is_empty() {
        info!("devsync is configured to run without input requirements!");
        return Ok(MergeResult::default());
    }
    let mut resolver = Resolver {
        keys,
        stack: Vec::new(),
    };
    resolver.resolve(target.trim(), None, context)
}

struct Resolver<'a> {
    keys: &'a KeySets,
    /// Locations currently being read, innermost last.
    stack: Vec<Location>,
}

impl Resolver<'_> {
    fn resolve(
        &mut self,
        target: &str,
        base: Option<&Location>,
        context: Context,
    ) -> Result<MergeResult> {
        let location = Location::resolve(target, base)?;
        if self.stack.contains(&location) {
            warn!("Skipping '{}': it includes itself.", target);
            return Ok(MergeResult::default());
        }

        info!("Read [{}]: {}", context.tag(), target);
        let Some(content) = location.read(target)? else {
            warn!(
                "Can not read {} file '{}', it does not exist. Empty file assumed.",
                context.noun(),
                target
            );
            return Ok(MergeResult::default());
        };

        self.stack.push(location);
        let parsed = self.process(&content, context);
        self.stack.pop();
        let mut result = parsed?;

        match context {
            Context::Requirement if !result.requirements.is_empty() => {
                result.requirements = vec![Entry::Block(Block {
                    origin: target.to_string(),
                    context,
                    entries: result.requirements,
                })];
            }
            Context::Constraint if !result.constraints.is_empty() => {
                result.constraints = vec![Entry::Block(Block {
                    origin: target.to_string(),
                    context,
                    entries: result.constraints,
                })];
            }
            _ => {}
        }
        Ok(result)
    }

    fn process(&mut self, content: &str, context: Context) -> Result<MergeResult> {
        let mut result = MergeResult::default();
        for line in content.lines() {
            debug!("Process Line [{}]: {}", context.tag(), line.trim());
            let decision = classify(line, self.keys, context);
            if let Decision::Include {
                target,
                context: nested,
            } = &decision
            {
                let base = self.stack.last().cloned();
                result.extend(self.resolve(target, base.as_ref(), *nested)?);
                continue;
            }
            if let Some(output) = decision.apply(line) {
                let entry = Entry::Line(output);
                match context {
                    Context::Requirement => result.requirements.push(entry),
                    Context::Constraint => result.constraints.push(entry),
                }
            }
        }
        Ok(result)
    }
}
