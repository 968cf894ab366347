//! # Merge Command Implementation
//!
//! The full run: update every configured source, resolve the requirements
//! entry point and write the merged requirements and constraints files.
//!
//! The output files are always written, even when some sources failed; the
//! command then exits non-zero after writing.

use anyhow::Result;
use clap::Args;

use devsync::output::emoji;
use devsync::requirements::{resolve, writer, Context};
use devsync::vcs::Verb;

use super::{failure_error, print_report, run_verb, Globals};

/// Update all sources and write the merged requirements and constraints
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Do not fetch or update sources; only write the merged files
    #[arg(long)]
    pub no_fetch: bool,

    /// Show the output of the version-control tool for each source
    #[arg(short, long)]
    pub verbose: bool,
}

/// Execute the `merge` command.
pub fn execute(args: MergeArgs, globals: &Globals) -> Result<()> {
    let config = globals.load()?;
    let out = globals.output();

    let report = if args.no_fetch {
        None
    } else {
        println!("{} Fetching sources...", emoji(&out, "📥", "[FETCH]"));
        let report = run_verb(&config, Verb::Update, &[])?;
        print_report(&out, &report, args.verbose);
        Some(report)
    };

    let merged = resolve(&config.requirements_in, &config.key_sets(), Context::Requirement)?;
    writer::write(&merged, &config)?;
    println!(
        "{} Wrote {} and {}",
        emoji(&out, "📝", "[WRITE]"),
        config.requirements_out.display(),
        config.constraints_out.display()
    );

    match report {
        Some(report) if report.has_failures() => Err(failure_error(&report)),
        _ => Ok(()),
    }
}
