//! # Checkout Command Implementation
//!
//! Clones every selected source whose working copy does not exist yet.
//! Existing working copies are reported `unchanged` and left alone; use
//! `update` to move them.

use anyhow::Result;
use clap::Args;

use devsync::vcs::Verb;

use super::Globals;

/// Clone sources that are not checked out yet
#[derive(Args, Debug)]
pub struct CheckoutArgs {
    /// Sources to check out (default: all configured sources)
    #[arg(value_name = "NAME")]
    pub names: Vec<String>,

    /// Show the output of the version-control tool for each source
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the `checkout` command.
pub fn execute(args: CheckoutArgs, globals: &Globals) -> Result<()> {
    super::sync(Verb::Checkout, &args.names, args.verbose, args.json, globals)
}
