//! # Status Command Implementation
//!
//! Read-only report of every selected working copy. Each line starts with
//! three flag columns followed by the source name:
//!
//! - `!` the working copy is missing
//! - `C` the working copy's remote is not the configured URL
//! - `M` it has local modifications, `P` it has unpushed commits
//!
//! With `--verbose` the raw tool output (including branch tracking) follows
//! each line.

use anyhow::Result;
use clap::Args;

use devsync::output::{indent, status_flags};
use devsync::workingcopies::WorkingCopies;

use super::Globals;

/// Show the status of each working copy
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Sources to inspect (default: all configured sources)
    #[arg(value_name = "NAME")]
    pub names: Vec<String>,

    /// Include the version-control tool's status output
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the status as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the `status` command.
pub fn execute(args: StatusArgs, globals: &Globals) -> Result<()> {
    let config = globals.load()?;
    let workingcopies = WorkingCopies::new(&config.sources, config.sync_options());
    let lines = workingcopies.status(&args.names, args.verbose)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&lines)?);
        return Ok(());
    }

    for line in &lines {
        println!("{} {}", status_flags(line), line.name);
        if args.verbose && !line.text.trim().is_empty() {
            println!("{}", indent(line.text.trim_end()));
        }
    }
    Ok(())
}
