//! Filesystem backend: a source that already exists as a local directory.
//!
//! The source's `url` is that directory. Checkout links it into place at the
//! working-copy path; there is nothing to fetch, so update only checks that
//! the link is there.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{Error, Result};
use crate::process::CommandLog;
use crate::source::{Source, VcsKind};
use crate::vcs::{
    ensure_parent, Backend, Outcome, OutcomeStatus, SyncOptions, Verb, WorkingCopyState,
    WorkingCopyStatus,
};

pub struct FilesystemBackend;

/// The directory a filesystem source points to.
fn origin(source: &Source) -> PathBuf {
    let url = source.url.strip_prefix("file://").unwrap_or(&source.url);
    PathBuf::from(url)
}

fn present(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

#[cfg(unix)]
fn link(origin: &Path, path: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(origin, path)
}

#[cfg(windows)]
fn link(origin: &Path, path: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(origin, path)
}

fn checkout(source: &Source, verb: Verb) -> Result<Outcome> {
    if present(&source.path) {
        return Ok(Outcome::new(
            source,
            verb,
            OutcomeStatus::Unchanged,
            format!("{} already exists", source.path.display()),
            CommandLog::new(),
        ));
    }

    let origin = origin(source);
    if !origin.is_dir() {
        return Err(Error::Configuration {
            message: format!(
                "source '{}' points to '{}', which is not a directory",
                source.name,
                origin.display()
            ),
            hint: None,
        });
    }
    let origin = fs::canonicalize(&origin)?;
    ensure_parent(source)?;
    link(&origin, &source.path)?;

    let message = format!("Linked '{}' to '{}'.", source.name, origin.display());
    info!("{}", message);
    Ok(Outcome::new(source, verb, OutcomeStatus::Cloned, message, CommandLog::new()))
}

impl Backend for FilesystemBackend {
    fn kind(&self) -> VcsKind {
        VcsKind::Filesystem
    }

    fn validate(&self, source: &Source) -> Result<()> {
        source.validate_pin()?;
        if source.revision.is_some() || source.branch.is_some() {
            return Err(Error::configuration(format!(
                "filesystem source '{}' cannot pin a revision or branch",
                source.name
            )));
        }
        Ok(())
    }

    fn checkout(&self, source: &Source, _options: &SyncOptions) -> Result<Outcome> {
        checkout(source, Verb::Checkout)
    }

    fn update(&self, source: &Source, _options: &SyncOptions) -> Result<Outcome> {
        checkout(source, Verb::Update)
    }

    fn status(
        &self,
        source: &Source,
        _options: &SyncOptions,
        _verbose: bool,
    ) -> Result<WorkingCopyStatus> {
        let text = match fs::read_link(&source.path) {
            Ok(target) => format!("linked to {}", target.display()),
            Err(_) => "local directory".to_string(),
        };
        Ok(WorkingCopyStatus {
            state: WorkingCopyState::Clean,
            text,
        })
    }

    fn matches(&self, source: &Source, _options: &SyncOptions) -> Result<bool> {
        match fs::read_link(&source.path) {
            Ok(target) => {
                let expected = fs::canonicalize(origin(source)).unwrap_or_else(|_| origin(source));
                Ok(target == expected)
            }
            Err(_) => Ok(true),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn source_in(temp: &TempDir, origin: &Path) -> Source {
        let target = temp.path().join("sources");
        Source::new(
            "egg",
            VcsKind::Filesystem,
            &origin.to_string_lossy(),
            &target.to_string_lossy(),
        )
    }

    #[test]
    fn test_checkout_links_directory() {
        let temp = TempDir::new().unwrap();
        let origin = temp.path().join("egg-checkout");
        fs::create_dir_all(&origin).unwrap();
        fs::write(origin.join("setup.py"), "").unwrap();
        let source = source_in(&temp, &origin);

        let outcome = FilesystemBackend
            .checkout(&source, &SyncOptions::default())
            .unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Cloned);
        assert!(source.path.join("setup.py").exists());
        assert!(FilesystemBackend.matches(&source, &SyncOptions::default()).unwrap());

        let again = FilesystemBackend
            .update(&source, &SyncOptions::default())
            .unwrap();
        assert_eq!(again.status, OutcomeStatus::Unchanged);

        let status = FilesystemBackend
            .status(&source, &SyncOptions::default(), true)
            .unwrap();
        assert!(status.text.starts_with("linked to"));
    }

    #[test]
    fn test_checkout_of_missing_directory_fails() {
        let temp = TempDir::new().unwrap();
        let source = source_in(&temp, &temp.path().join("nowhere"));
        let error = FilesystemBackend
            .checkout(&source, &SyncOptions::default())
            .unwrap_err();
        assert!(error.to_string().contains("not a directory"));
    }

    #[test]
    fn test_pins_are_rejected() {
        let temp = TempDir::new().unwrap();
        let mut source = source_in(&temp, temp.path());
        source.branch = Some("main".to_string());
        assert!(FilesystemBackend.validate(&source).is_err());
    }
}
