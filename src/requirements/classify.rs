//! Dependency line classifier.
//!
//! [`classify`] is a pure function of the line, the three key sets and the
//! context. Lines that are not valid requirement specifiers are never an
//! error; they pass through untouched.

use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use log::debug;
use regex::Regex;

use super::Context;
use crate::source::normalize_key;

/// The package keys that drive suppression decisions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySets {
    /// Keys of the locally managed sources.
    pub packages: HashSet<String>,
    /// Keys with a configured version override.
    pub overrides: HashSet<String>,
    /// Keys to drop from constraints.
    pub ignores: HashSet<String>,
}

/// Why a line was commented out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressionReason {
    Source,
    Override,
    Ignore,
}

impl SuppressionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuppressionReason::Source => "source",
            SuppressionReason::Override => "override",
            SuppressionReason::Ignore => "ignore",
        }
    }
}

impl fmt::Display for SuppressionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Replace the line with the resolved contents of `target`.
    Include { target: String, context: Context },
    /// Forward the line unchanged.
    PassThrough,
    /// Keep the line only as a commented annotation.
    Suppressed(SuppressionReason),
}

impl Decision {
    /// The output line for a non-include decision.
    pub fn apply(&self, line: &str) -> Option<String> {
        match self {
            Decision::Include { .. } => None,
            Decision::PassThrough => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            Decision::Suppressed(reason) => Some(annotate(line, *reason)),
        }
    }
}

/// The commented-out form of a suppressed line.
pub fn annotate(line: &str, reason: SuppressionReason) -> String {
    format!("# {} -> devsync disabled ({})", line.trim(), reason)
}

/// A parsed requirement specifier, borrowing from the input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Specifier<'a> {
    pub name: &'a str,
    pub extras: Vec<&'a str>,
    /// Version clauses such as `>=1.0,<2`.
    pub version: Option<&'a str>,
    /// Direct reference after `@`.
    pub url: Option<&'a str>,
    /// Environment marker after `;`.
    pub marker: Option<&'a str>,
}

impl Specifier<'_> {
    /// Normalized package key.
    pub fn key(&self) -> String {
        normalize_key(self.name)
    }
}

/// Result of parsing a line as a requirement specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine<'a> {
    Specifier(Specifier<'a>),
    /// Anything else: comments, blank lines, pip options, garbage.
    Raw(&'a str),
}

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)\s*(?:\[([^\]]*)\])?\s*(.*)$")
        .expect("name pattern is valid")
});

static CLAUSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(===|==|!=|<=|>=|~=|<|>)\s*[A-Za-z0-9.*+!_-]+\s*$")
        .expect("clause pattern is valid")
});

static EXTRA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?$")
        .expect("extra pattern is valid")
});

/// Cut a trailing ` # comment` off a line.
fn strip_comment(line: &str) -> &str {
    if line.starts_with('#') {
        return "";
    }
    match line.find(" #").or_else(|| line.find("\t#")) {
        Some(index) => &line[..index],
        None => line,
    }
}

fn valid_version(version: &str) -> bool {
    let version = version.trim();
    let version = version
        .strip_prefix('(')
        .and_then(|inner| inner.strip_suffix(')'))
        .unwrap_or(version);
    !version.trim().is_empty() && version.split(',').all(|clause| CLAUSE_RE.is_match(clause))
}

/// Parse a line as a requirement specifier (`name[extras] version ; marker`
/// or `name[extras] @ url ; marker`).
pub fn parse_specifier(line: &str) -> ParsedLine<'_> {
    let text = strip_comment(line.trim()).trim();
    let Some(captures) = NAME_RE.captures(text) else {
        return ParsedLine::Raw(line);
    };
    let (Some(name), Some(rest)) = (captures.get(1), captures.get(3)) else {
        return ParsedLine::Raw(line);
    };

    let mut extras = Vec::new();
    if let Some(list) = captures.get(2) {
        for extra in list.as_str().split(',').map(str::trim).filter(|e| !e.is_empty()) {
            if !EXTRA_RE.is_match(extra) {
                return ParsedLine::Raw(line);
            }
            extras.push(extra);
        }
    }

    let rest = rest.as_str().trim();
    let (body, marker) = match rest.split_once(';') {
        Some((body, marker)) => (body.trim(), Some(marker.trim())),
        None => (rest, None),
    };

    let mut specifier = Specifier {
        name: name.as_str(),
        extras,
        version: None,
        url: None,
        marker,
    };

    if let Some(url) = body.strip_prefix('@') {
        let url = url.trim();
        if url.is_empty() {
            return ParsedLine::Raw(line);
        }
        specifier.url = Some(url);
    } else if !body.is_empty() {
        if !valid_version(body) {
            return ParsedLine::Raw(line);
        }
        specifier.version = Some(body);
    }
    ParsedLine::Specifier(specifier)
}

/// Recognise `-c X`, `-r X`, `--constraint X`, `--requirement X` and their
/// `=`-joined forms.
pub fn parse_directive(line: &str) -> Option<(Context, &str)> {
    let line = line.trim();
    const FLAGS: [(&str, Context); 4] = [
        ("--constraint", Context::Constraint),
        ("--requirement", Context::Requirement),
        ("-c", Context::Constraint),
        ("-r", Context::Requirement),
    ];
    for (flag, context) in FLAGS {
        let Some(rest) = line.strip_prefix(flag) else {
            continue;
        };
        let target = if let Some(joined) = rest.strip_prefix('=') {
            joined
        } else if rest.starts_with(char::is_whitespace) {
            rest
        } else {
            continue;
        };
        let target = strip_comment(target.trim()).trim();
        if target.is_empty() {
            return None;
        }
        return Some((context, target));
    }
    None
}

/// Decide what happens to `line` read in `context`.
///
/// Suppression rules, first match wins: a managed source's key suppresses in
/// both contexts; override and ignore keys only suppress constraints.
pub fn classify(line: &str, keys: &KeySets, context: Context) -> Decision {
    if let Some((context, target)) = parse_directive(line) {
        return Decision::Include {
            target: target.to_string(),
            context,
        };
    }
    let specifier = match parse_specifier(line) {
        ParsedLine::Specifier(specifier) => specifier,
        ParsedLine::Raw(raw) => {
            if !raw.trim().is_empty() && !raw.trim_start().starts_with('#') {
                debug!("Passing through unparsed line: {}", raw.trim());
            }
            return Decision::PassThrough;
        }
    };

    let key = specifier.key();
    if keys.packages.contains(&key) {
        return Decision::Suppressed(SuppressionReason::Source);
    }
    if context == Context::Constraint {
        if keys.overrides.contains(&key) {
            return Decision::Suppressed(SuppressionReason::Override);
        }
        if keys.ignores.contains(&key) {
            return Decision::Suppressed(SuppressionReason::Ignore);
        }
    }
    Decision::PassThrough
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn keys() -> KeySets {
        KeySets {
            packages: ["my.package", "zope-interface"].iter().map(|s| s.to_string()).collect(),
            overrides: ["requests"].iter().map(|s| s.to_string()).collect(),
            ignores: ["urllib3"].iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_parse_simple_specifiers() {
        match parse_specifier("Requests[security, socks] >= 2.0, <3 ; python_version > '3.8'") {
            ParsedLine::Specifier(specifier) => {
                assert_eq!(specifier.name, "Requests");
                assert_eq!(specifier.extras, vec!["security", "socks"]);
                assert_eq!(specifier.version, Some(">= 2.0, <3"));
                assert_eq!(specifier.marker, Some("python_version > '3.8'"));
                assert_eq!(specifier.key(), "requests");
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_parse_direct_reference_and_comment() {
        match parse_specifier("egg @ https://example.com/egg.tar.gz  # pinned") {
            ParsedLine::Specifier(specifier) => {
                assert_eq!(specifier.url, Some("https://example.com/egg.tar.gz"));
                assert_eq!(specifier.version, None);
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_unparseable_lines_are_raw() {
        for line in ["", "# comment", "-e ./src/egg", "--index-url https://x", "egg ==", "egg !!1", "[x]"] {
            assert!(matches!(parse_specifier(line), ParsedLine::Raw(_)), "{line}");
        }
    }

    #[test]
    fn test_directives() {
        assert_eq!(parse_directive("-c constraints.txt"), Some((Context::Constraint, "constraints.txt")));
        assert_eq!(parse_directive("-r  base.txt\n"), Some((Context::Requirement, "base.txt")));
        assert_eq!(
            parse_directive("--constraint=https://example.com/c.txt"),
            Some((Context::Constraint, "https://example.com/c.txt"))
        );
        assert_eq!(parse_directive("--requirement other.txt # dev"), Some((Context::Requirement, "other.txt")));
        assert_eq!(parse_directive("-c"), None);
        assert_eq!(parse_directive("-e ./src/egg"), None);
        assert_eq!(parse_directive("-rfoo.txt"), None);
    }

    #[test]
    fn test_include_decision_carries_new_context() {
        let decision = classify("-c constraints.txt\n", &keys(), Context::Requirement);
        assert_eq!(
            decision,
            Decision::Include {
                target: "constraints.txt".to_string(),
                context: Context::Constraint
            }
        );
        assert_eq!(decision.apply("-c constraints.txt"), None);
    }

    #[test]
    fn test_source_suppresses_in_both_contexts() {
        for context in [Context::Requirement, Context::Constraint] {
            assert_eq!(
                classify("My.Package==1.0", &keys(), context),
                Decision::Suppressed(SuppressionReason::Source)
            );
        }
    }

    #[test]
    fn test_override_and_ignore_only_in_constraints() {
        let keys = keys();
        assert_eq!(classify("requests==2.0", &keys, Context::Requirement), Decision::PassThrough);
        assert_eq!(classify("urllib3==1.0", &keys, Context::Requirement), Decision::PassThrough);
        assert_eq!(
            classify("requests==2.0", &keys, Context::Constraint),
            Decision::Suppressed(SuppressionReason::Override)
        );
        assert_eq!(
            classify("urllib3==1.0", &keys, Context::Constraint),
            Decision::Suppressed(SuppressionReason::Ignore)
        );
    }

    #[test]
    fn test_source_wins_over_override() {
        let mut keys = keys();
        keys.overrides.insert("my.package".to_string());
        assert_eq!(
            classify("my.package==1.0", &keys, Context::Constraint),
            Decision::Suppressed(SuppressionReason::Source)
        );
    }

    #[test]
    fn test_annotation_text() {
        let decision = classify("  My.Package==1.0  \n", &keys(), Context::Constraint);
        assert_eq!(
            decision.apply("  My.Package==1.0  \n").as_deref(),
            Some("# My.Package==1.0 -> devsync disabled (source)")
        );
    }

    #[test]
    fn test_malformed_line_passes_through_unchanged() {
        let decision = classify("this is not = a requirement", &keys(), Context::Constraint);
        assert_eq!(decision, Decision::PassThrough);
        assert_eq!(
            decision.apply("this is not = a requirement\n").as_deref(),
            Some("this is not = a requirement")
        );
    }

    proptest! {
        #[test]
        fn prop_classify_never_panics(line in "\\PC*") {
            let _ = classify(&line, &keys(), Context::Constraint);
        }

        #[test]
        fn prop_unknown_packages_pass_through(name in "[a-z][a-z0-9]{0,8}", version in "[0-9]{1,3}(\\.[0-9]{1,3}){0,2}") {
            prop_assume!(!["requests", "urllib3"].contains(&name.as_str()));
            let line = format!("{name}=={version}");
            prop_assert_eq!(classify(&line, &keys(), Context::Constraint), Decision::PassThrough);
        }

        #[test]
        fn prop_case_and_separators_do_not_change_key(sep in "[-_.]") {
            let line = format!("Zope{sep}Interface>=5");
            let expected = if sep == "." {
                Decision::PassThrough
            } else {
                Decision::Suppressed(SuppressionReason::Source)
            };
            prop_assert_eq!(classify(&line, &keys(), Context::Requirement), expected);
        }
    }
}
