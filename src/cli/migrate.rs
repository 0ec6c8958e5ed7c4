//! `updraft migrate`: rewrite legacy configuration and state layouts.

use crate::config::UpdaterConfig;
use crate::state::BuildStateStore;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::Path;

/// Rewrite legacy files in their current layout.
#[derive(Debug, Args)]
pub struct MigrateCommand {}

impl MigrateCommand {
    /// Migrate the configuration file, then the state file it points to.
    ///
    /// # Errors
    ///
    /// Fails when either file cannot be read, parsed or written.
    pub async fn execute(self, config_path: Option<&Path>) -> Result<()> {
        let path = UpdaterConfig::resolve_path(config_path)?;
        let config_changed = UpdaterConfig::migrate_file(&path).await?;

        let config = UpdaterConfig::load_from(&path).await?;
        let state = BuildStateStore::new(config.host.state_path()?);
        let state_changed = tokio::task::spawn_blocking(move || state.migrate()).await??;

        report("configuration", &path, config_changed);
        report("state", &config.host.state_path()?, state_changed);
        Ok(())
    }
}

fn report(what: &str, path: &Path, changed: bool) {
    if changed {
        println!("{} {} ({})", "migrated".green().bold(), what, path.display());
    } else {
        println!("{} {} is already current", "ok".dimmed(), what);
    }
}
