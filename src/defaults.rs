//! Default values for devsync configuration.
//!
//! This module provides centralized default values used by the configuration
//! loader and the CLI, ensuring consistency and avoiding duplication.

use std::path::PathBuf;

/// Configuration file read when `--config` is not given.
pub const CONFIG_FILE: &str = "devsync.ini";

/// Entry point for requirement resolution.
pub const REQUIREMENTS_IN: &str = "requirements.txt";

/// Merged requirements output.
pub const REQUIREMENTS_OUT: &str = "requirements-devsync.txt";

/// Merged constraints output.
pub const CONSTRAINTS_OUT: &str = "constraints-devsync.txt";

/// Parent directory for working copies.
pub const TARGET: &str = "sources";

/// Name of the section holding global settings.
pub const SETTINGS_SECTION: &str = "settings";

/// Worker pool size. Sequential unless configured otherwise.
pub const THREADS: usize = 1;

/// Returns the default configuration file path.
///
/// This can be overridden by the `--config` CLI flag or the
/// `DEVSYNC_CONFIG` environment variable.
pub fn default_config_path() -> PathBuf {
    PathBuf::from(CONFIG_FILE)
}
