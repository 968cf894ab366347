//! # Requirements Pipeline
//!
//! Merges a tree of requirements and constraints files into two flat files
//! where every locally checked-out package is disabled in favour of its
//! working copy.
//!
//! - [`classify`] decides, line by line, whether a line is an include
//!   directive, passes through, or is suppressed.
//! - [`resolve`] follows include directives recursively and groups the lines
//!   of each file into a delimited [`Block`].
//! - [`writer`] renders the final files.
//!
//! The merge result is a tree: a [`Block`] holds the lines of one file and
//! the blocks of the files it included, in input order. Rendering the tree
//! depth-first gives the flat text.

use std::fmt;

pub mod classify;
pub mod resolve;
pub mod writer;

pub use classify::{classify, Decision, KeySets, SuppressionReason};
pub use resolve::resolve;

/// The line that opens and closes every block.
pub fn delimiter() -> String {
    "#".repeat(79)
}

/// Whether lines are read as requirements (`-r`) or constraints (`-c`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Context {
    Requirement,
    Constraint,
}

impl Context {
    /// Short tag used in log lines.
    pub fn tag(&self) -> &'static str {
        match self {
            Context::Requirement => "r",
            Context::Constraint => "c",
        }
    }

    /// Plural noun used in block headers.
    pub fn noun(&self) -> &'static str {
        match self {
            Context::Requirement => "requirements",
            Context::Constraint => "constraints",
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.noun())
    }
}

/// One element of merged output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// A single line, without its line terminator.
    Line(String),
    Block(Block),
}

/// The lines contributed by one input file, wrapped in begin/end markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// The include target as written.
    pub origin: String,
    pub context: Context,
    pub entries: Vec<Entry>,
}

impl Block {
    pub fn render_into(&self, out: &mut String) {
        let delimiter = delimiter();
        let noun = self.context.noun();
        out.push_str(&delimiter);
        out.push('\n');
        out.push_str(&format!("# begin {} from: {}\n\n", noun, self.origin));
        render_entries(&self.entries, out);
        out.push('\n');
        out.push_str(&format!("# end {} from: {}\n", noun, self.origin));
        out.push_str(&delimiter);
        out.push('\n');
        if self.context == Context::Constraint {
            out.push('\n');
        }
    }
}

/// Render entries in order, each line terminated by a newline.
pub fn render_entries(entries: &[Entry], out: &mut String) {
    for entry in entries {
        match entry {
            Entry::Line(line) => {
                out.push_str(line);
                out.push('\n');
            }
            Entry::Block(block) => block.render_into(out),
        }
    }
}

/// The two ordered outputs of resolving an entry point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeResult {
    pub requirements: Vec<Entry>,
    pub constraints: Vec<Entry>,
}

impl MergeResult {
    /// Append another result after this one, keeping order.
    pub fn extend(&mut self, other: MergeResult) {
        self.requirements.extend(other.requirements);
        self.constraints.extend(other.constraints);
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty() && self.constraints.is_empty()
    }

    pub fn render_requirements(&self) -> String {
        let mut out = String::new();
        render_entries(&self.requirements, &mut out);
        out
    }

    pub fn render_constraints(&self) -> String {
        let mut out = String::new();
        render_entries(&self.constraints, &mut out);
        out
    }
}
