//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands::{self, Globals};
use devsync::defaults;

/// devsync - Keep development checkouts in sync and merge their requirements
#[derive(Parser, Debug)]
#[command(name = "devsync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Configuration file to read
    #[arg(
        short,
        long,
        global = true,
        value_name = "FILE",
        env = "DEVSYNC_CONFIG",
        default_value = defaults::CONFIG_FILE
    )]
    config: PathBuf,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,

    /// Number of sources processed in parallel (overrides the configuration)
    #[arg(
        short,
        long,
        global = true,
        value_name = "N",
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    threads: Option<u16>,

    /// Never contact remotes; existing working copies are left as they are
    #[arg(short, long, global = true)]
    offline: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Clone sources that are not checked out yet
    Checkout(commands::checkout::CheckoutArgs),

    /// Fetch and update working copies to their configured state
    Update(commands::update::UpdateArgs),

    /// Show the status of each working copy
    Status(commands::status::StatusArgs),

    /// Update all sources and write the merged requirements and constraints
    Merge(commands::merge::MergeArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);

        let globals = Globals {
            config: self.config,
            color: self.color,
            threads: self.threads.map(usize::from),
            offline: self.offline,
        };

        match self.command {
            Commands::Checkout(args) => commands::checkout::execute(args, &globals),
            Commands::Update(args) => commands::update::execute(args, &globals),
            Commands::Status(args) => commands::status::execute(args, &globals),
            Commands::Merge(args) => commands::merge::execute(args, &globals),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

/// `RUST_LOG` wins over `--log-level` when set.
fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .try_init();
}
