//! # Update Command Implementation
//!
//! Brings every selected working copy to its configured state: fetches from
//! the remote, then checks out the pinned revision or branch (or the remote's
//! default branch). Missing working copies are cloned first.

use anyhow::Result;
use clap::Args;

use devsync::vcs::Verb;

use super::Globals;

/// Fetch and update working copies to their configured state
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Sources to update (default: all configured sources)
    #[arg(value_name = "NAME")]
    pub names: Vec<String>,

    /// Show the output of the version-control tool for each source
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the `update` command.
pub fn execute(args: UpdateArgs, globals: &Globals) -> Result<()> {
    super::sync(Verb::Update, &args.names, args.verbose, args.json, globals)
}
