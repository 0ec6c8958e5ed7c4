//! `updraft run`: poll every source on an interval until Ctrl-C.

use super::common::Runtime;
use crate::scheduler::Scheduler;
use anyhow::Result;
use clap::Args;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Run the recurring scheduler.
#[derive(Debug, Args)]
pub struct RunCommand {
    /// Override `updates.interval_secs`
    #[arg(long, value_name = "SECONDS")]
    interval: Option<u64>,
}

impl RunCommand {
    /// Run until interrupted.
    ///
    /// # Errors
    ///
    /// Fails when the runtime cannot be built.
    pub async fn execute(self, config_path: Option<&Path>) -> Result<()> {
        let runtime = Runtime::load(config_path, false).await?;
        runtime.print_skipped();

        let interval = self
            .interval
            .map_or_else(|| runtime.config.updates.interval(), |secs| Duration::from_secs(secs.max(1)));
        info!(
            "Watching {} source(s) every {}s",
            runtime.pipeline.registry().snapshot().len(),
            interval.as_secs()
        );

        let scheduler = Scheduler::new(runtime.pipeline.clone(), interval);
        scheduler
            .run_until(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await;
        Ok(())
    }
}
