//! # Output Configuration
//!
//! Controls how command reports look: whether colors and emojis are used,
//! and how per-source statuses are labelled.
//!
//! ## Respecting User Preferences
//!
//! The module respects the following environment variables and flags:
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals
//!
//! ## Usage
//!
//! ```rust,ignore
//! use devsync::output::{OutputConfig, emoji, status_label};
//! use devsync::vcs::OutcomeStatus;
//!
//! let config = OutputConfig::from_env_and_flag("auto");
//! println!("{} Fetching sources...", emoji(&config, "📥", "[FETCH]"));
//! println!("{} egg", status_label(&config, OutcomeStatus::Cloned));
//! ```

use std::env;

use console::style;

use crate::vcs::{OutcomeStatus, WorkingCopyState};
use crate::workingcopies::StatusLine;

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// `color_flag` is `always`, `never` or `auto`. In auto mode, colors are
    /// disabled if `NO_COLOR` is set, `CLICOLOR=0`, `TERM=dumb`, or stdout
    /// is not a TTY (unless `CLICOLOR_FORCE=1`).
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    fn detect_color_support() -> bool {
        // The presence of NO_COLOR (even if empty) disables colors
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    /// Create a configuration with colors always enabled.
    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    /// Create a configuration with colors always disabled.
    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Returns the emoji when colors are enabled, the plain text otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// The outcome status, colored by severity.
pub fn status_label(config: &OutputConfig, status: OutcomeStatus) -> String {
    let label = status.as_str().to_string();
    if !config.use_color {
        return label;
    }
    let styled = match status {
        OutcomeStatus::Cloned | OutcomeStatus::Updated => style(label).green(),
        OutcomeStatus::Switched => style(label).cyan(),
        OutcomeStatus::Unchanged => style(label).dim(),
        OutcomeStatus::Failed => style(label).red().bold(),
    };
    styled.force_styling(true).to_string()
}

/// The three status flags of a working copy: `!` when missing, `C` when the
/// remote differs from the configured URL, `M` when modified or `P` when it
/// has unpushed commits.
pub fn status_flags(line: &StatusLine) -> String {
    let present = if line.present { ' ' } else { '!' };
    let remote = if line.url_matches { ' ' } else { 'C' };
    let state = match line.state {
        Some(WorkingCopyState::Dirty) => 'M',
        Some(WorkingCopyState::Ahead) => 'P',
        Some(WorkingCopyState::Clean) | None => ' ',
    };
    format!("{present}{remote}{state}")
}

/// Indent every line of `text` by four spaces.
pub fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(present: bool, url_matches: bool, state: Option<WorkingCopyState>) -> StatusLine {
        StatusLine {
            name: "egg".to_string(),
            present,
            url_matches,
            state,
            text: String::new(),
        }
    }

    #[test]
    fn test_color_always() {
        let config = OutputConfig::from_env_and_flag("always");
        assert!(config.use_color);
    }

    #[test]
    fn test_color_never() {
        let config = OutputConfig::from_env_and_flag("never");
        assert!(!config.use_color);
    }

    #[test]
    fn test_emoji_helper() {
        assert_eq!(emoji(&OutputConfig::with_color(), "📥", "[FETCH]"), "📥");
        assert_eq!(emoji(&OutputConfig::without_color(), "📥", "[FETCH]"), "[FETCH]");
    }

    #[test]
    fn test_status_label_plain() {
        let label = status_label(&OutputConfig::without_color(), OutcomeStatus::Cloned);
        assert_eq!(label, "cloned");
    }

    #[test]
    fn test_status_label_colored_keeps_text() {
        let label = status_label(&OutputConfig::with_color(), OutcomeStatus::Failed);
        assert!(label.contains("failed"));
        assert!(label.contains('\u{1b}'));
    }

    #[test]
    fn test_status_flags() {
        assert_eq!(status_flags(&line(true, true, Some(WorkingCopyState::Clean))), "   ");
        assert_eq!(status_flags(&line(true, false, Some(WorkingCopyState::Dirty))), " CM");
        assert_eq!(status_flags(&line(true, true, Some(WorkingCopyState::Ahead))), "  P");
        assert_eq!(status_flags(&line(false, true, None)), "!  ");
    }

    #[test]
    fn test_indent() {
        assert_eq!(indent("a\nb"), "    a\n    b");
        assert_eq!(indent(""), "");
    }
}
