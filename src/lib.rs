//! # devsync
//!
//! This library keeps a set of version-controlled development checkouts in
//! sync and merges a project's requirements and constraints so that every
//! checked-out package is installed from its working copy. It is used by the
//! `devsync` command-line tool but has no dependency on it.
//!
//! ## Quick Example
//!
//! ```
//! use devsync::config::Configuration;
//! use devsync::requirements::{classify, Context, Decision, SuppressionReason};
//!
//! let config = Configuration::parse(
//!     "[settings]\nignores = flask\n\n[my.package]\nurl = https://example.com/my.package.git\n",
//!     "devsync.ini",
//! )
//! .unwrap();
//! let keys = config.key_sets();
//!
//! assert_eq!(
//!     classify("My.Package==1.0", &keys, Context::Requirement),
//!     Decision::Suppressed(SuppressionReason::Source)
//! );
//! assert_eq!(
//!     classify("flask==3.0", &keys, Context::Constraint),
//!     Decision::Suppressed(SuppressionReason::Ignore)
//! );
//! ```
//!
//! ## Core Concepts
//!
//! - **Configuration (`config`, `source`)**: an INI file with global settings
//!   and one section per development source.
//! - **Backends (`vcs`)**: one adapter per version-control system behind the
//!   [`vcs::Backend`] trait, each driving the system's own command-line tool
//!   through [`process::Tool`].
//! - **Orchestration (`workingcopies`)**: runs checkout or update for many
//!   sources on a bounded worker pool, isolating failures per source.
//! - **Requirements (`requirements`)**: classifies dependency lines, follows
//!   `-r`/`-c` includes and writes the merged output files.
//!
//! ## Execution Flow
//!
//! A full run loads the configuration, updates every working copy, resolves
//! the requirements entry point with the configured package keys, and writes
//! the merged requirements and constraints files.

pub mod config;
pub mod defaults;
pub mod error;
pub mod output;
pub mod process;
pub mod requirements;
pub mod source;
pub mod vcs;
pub mod workingcopies;

pub use error::{Error, Result};
