//! Command-line interface for updraft.
//!
//! ```bash
//! updraft run                       # poll every source until Ctrl-C
//! updraft check                     # one cycle over every source
//! updraft check -s geyser -i        # one source, answer file choices
//! updraft sources                   # configured sources and installed builds
//! updraft migrate                   # rewrite legacy config/state files
//! ```
//!
//! Global options:
//! - `--config <PATH>` - configuration file (also `UPDRAFT_CONFIG`)
//! - `--verbose` / `--quiet` - log level (`debug` / `warn`); otherwise
//!   `RUST_LOG` or `info`
//! - `--no-progress` - hide download progress bars

mod check;
pub mod common;
mod migrate;
mod run;
mod sources;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Root command.
#[derive(Debug, Parser)]
#[command(
    name = "updraft",
    about = "Keep a host's add-on artifacts current",
    version,
    long_about = "updraft polls release-hosting APIs for newer builds of a host and its add-ons, \
                  downloads them atomically and hands them to the host."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true, env = "UPDRAFT_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Hide download progress bars
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Poll every source on an interval until interrupted
    Run(run::RunCommand),
    /// Run one update cycle
    Check(check::CheckCommand),
    /// List configured sources
    Sources(sources::SourcesCommand),
    /// Rewrite legacy configuration and state layouts
    Migrate(migrate::MigrateCommand),
}

impl Cli {
    /// Log filter implied by the verbosity flags.
    fn log_filter(&self) -> EnvFilter {
        if self.verbose {
            EnvFilter::new("debug")
        } else if self.quiet {
            EnvFilter::new("warn")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        }
    }

    /// Install the global tracing subscriber. Safe to call more than once.
    pub fn init_logging(&self) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(self.log_filter())
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    }

    /// Run the selected command.
    ///
    /// # Errors
    ///
    /// Whatever the command reports; `main` renders it with
    /// [`user_friendly_error`](crate::core::user_friendly_error).
    pub async fn execute(self) -> Result<()> {
        self.init_logging();
        let config = self.config.as_deref();
        let progress = !self.no_progress && !self.quiet;

        match self.command {
            Commands::Run(cmd) => cmd.execute(config).await,
            Commands::Check(cmd) => cmd.execute(config, progress).await,
            Commands::Sources(cmd) => cmd.execute(config).await,
            Commands::Migrate(cmd) => cmd.execute(config).await,
        }
    }
}
