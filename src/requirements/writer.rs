//! Writes the merged requirements and constraints files.

use std::fs;
use std::path::Path;

use log::{debug, info};

use super::{delimiter, render_entries, MergeResult};
use crate::config::Configuration;
use crate::error::Result;

/// The constraints file: resolved constraint blocks, then version overrides.
pub fn render_constraints(result: &MergeResult, config: &Configuration) -> String {
    let mut out = String::new();
    render_entries(&result.constraints, &mut out);
    if config.overrides.is_empty() {
        return out;
    }

    let packages = config.package_keys();
    out.push('\n');
    out.push_str(&delimiter());
    out.push_str("\n# devsync constraint overrides\n");
    for entry in &config.overrides {
        if packages.contains(&entry.key) {
            out.push_str(&format!(
                "# {} IGNORE devsync constraint override. Source override wins!\n",
                entry.line
            ));
        } else {
            out.push_str(&entry.line);
            out.push('\n');
        }
    }
    out.push('\n');
    out
}

/// The requirements file: a pointer to the constraints file, one editable
/// entry per development source, then the resolved requirement blocks.
pub fn render_requirements(result: &MergeResult, config: &Configuration) -> String {
    let delimiter = delimiter();
    let mut out = String::new();
    out.push_str(&delimiter);
    out.push_str("\n# devsync combined constraints\n");
    out.push_str(&format!("-c {}\n\n", config.constraints_out.display()));

    out.push('\n');
    out.push_str(&delimiter);
    out.push_str("\n# devsync development sources\n");
    for source in &config.sources {
        if let Some(entry) = source.editable_entry() {
            debug!("-> {}", entry);
            out.push_str(&entry);
            out.push('\n');
        }
    }
    out.push('\n');

    render_entries(&result.requirements, &mut out);
    out
}

/// Write both output files, creating their parent directories.
pub fn write(result: &MergeResult, config: &Configuration) -> Result<()> {
    info!("Write [c]: {}", config.constraints_out.display());
    write_file(&config.constraints_out, &render_constraints(result, config))?;
    info!("Write [r]: {}", config.requirements_out.display());
    write_file(&config.requirements_out, &render_requirements(result, config))?;
    Ok(())
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Override;
    use crate::requirements::{Block, Context, Entry};
    use crate::source::{InstallMode, Source, VcsKind};
    use tempfile::TempDir;

    fn config() -> Configuration {
        let mut egg = Source::new("egg", VcsKind::Git, "https://example.com/egg.git", "sources");
        egg.extras = vec!["test".to_string(), "docs".to_string()];
        let mut ham = Source::new("ham", VcsKind::Git, "https://example.com/ham.git", "sources");
        ham.subdirectory = Some("python".to_string());
        let mut skipped = Source::new("spam", VcsKind::Git, "https://example.com/spam.git", "sources");
        skipped.install_mode = InstallMode::Skip;
        Configuration {
            sources: vec![egg, ham, skipped],
            overrides: vec![
                Override {
                    key: "requests".to_string(),
                    line: "requests==2.31.0".to_string(),
                },
                Override {
                    key: "egg".to_string(),
                    line: "egg==9.9".to_string(),
                },
            ],
            ..Configuration::default()
        }
    }

    #[test]
    fn test_requirements_layout() {
        let result = MergeResult {
            requirements: vec![Entry::Block(Block {
                origin: "requirements.txt".to_string(),
                context: Context::Requirement,
                entries: vec![Entry::Line("flask".to_string())],
            })],
            constraints: Vec::new(),
        };
        let text = render_requirements(&result, &config());
        let d = delimiter();
        let expected_head = format!(
            "{d}\n# devsync combined constraints\n-c constraints-devsync.txt\n\n\n{d}\n\
             # devsync development sources\n\
             -e ./sources/egg[test,docs]\n\
             -e ./sources/ham/python\n\n\
             {d}\n# begin requirements from: requirements.txt\n"
        );
        assert!(text.starts_with(&expected_head), "{text}");
        assert!(!text.contains("spam"));
    }

    #[test]
    fn test_constraints_overrides_section() {
        let result = MergeResult {
            requirements: Vec::new(),
            constraints: vec![Entry::Line("urllib3==2.0".to_string())],
        };
        let text = render_constraints(&result, &config());
        assert_eq!(
            text,
            format!(
                "urllib3==2.0\n\n{}\n# devsync constraint overrides\nrequests==2.31.0\n\
                 # egg==9.9 IGNORE devsync constraint override. Source override wins!\n\n",
                delimiter()
            )
        );
    }

    #[test]
    fn test_no_overrides_means_no_section() {
        let config = Configuration::default();
        let text = render_constraints(&MergeResult::default(), &config);
        assert!(text.is_empty());
    }

    #[test]
    fn test_write_creates_both_files() {
        let temp = TempDir::new().unwrap();
        let mut config = config();
        config.requirements_out = temp.path().join("out/requirements.txt");
        config.constraints_out = temp.path().join("out/constraints.txt");
        write(&MergeResult::default(), &config).unwrap();

        let requirements = fs::read_to_string(&config.requirements_out).unwrap();
        assert!(requirements.contains(&format!("-c {}", config.constraints_out.display())));
        let constraints = fs::read_to_string(&config.constraints_out).unwrap();
        assert!(constraints.contains("# devsync constraint overrides"));
    }
}
