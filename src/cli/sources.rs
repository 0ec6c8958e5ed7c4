//! `updraft sources`: list configured sources and their installed builds.

use crate::config::UpdaterConfig;
use crate::state::BuildStateStore;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::Path;

/// List configured sources.
#[derive(Debug, Args)]
pub struct SourcesCommand {
    /// Include disabled sources
    #[arg(long, short)]
    all: bool,
}

impl SourcesCommand {
    /// Print one line per source.
    ///
    /// # Errors
    ///
    /// Fails when the configuration or state file cannot be read.
    pub async fn execute(self, config_path: Option<&Path>) -> Result<()> {
        let path = UpdaterConfig::resolve_path(config_path)?;
        let config = UpdaterConfig::load_from(&path).await?;
        let state = BuildStateStore::new(config.host.state_path()?).snapshot()?;

        if config.updates.sources.entries.is_empty() {
            println!("No sources configured in {}", path.display());
            return Ok(());
        }

        for (name, entry) in &config.updates.sources.entries {
            if !entry.enabled && !self.all {
                continue;
            }
            let installed = match state.records.get(name) {
                Some(record) if record.version.is_empty() => format!("build {}", record.build),
                Some(record) => format!("{} (build {})", record.version, record.build),
                None => "not installed".dimmed().to_string(),
            };
            let status = if entry.enabled { "" } else { " [disabled]" };
            println!(
                "{}{} {} -> {}/{}  {}",
                name.bold(),
                status.yellow(),
                entry.kind.cyan(),
                entry.target,
                entry.filename_for(name),
                installed
            );
        }
        Ok(())
    }
}
