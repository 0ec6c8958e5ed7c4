//! updraft CLI entry point.
//!
//! Parses arguments, runs the selected command and renders errors with
//! context and suggestions.

use anyhow::Result;
use clap::Parser;
use updraft::cli::Cli;
use updraft::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            user_friendly_error(e).display();
            std::process::exit(1);
        }
    }
}
