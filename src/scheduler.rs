//! Recurring update cycles.
//!
//! One worker walks every registered source sequentially per cycle. A
//! failing source is logged and the cycle moves on; a panic inside one
//! source's run is caught the same way. Connectivity failures are logged at
//! `warn` once, then at `debug` until a cycle completes without one.

use crate::constants::CONSOLE_REQUESTER;
use crate::pipeline::{JobOutcome, UpdatePipeline};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

/// What happened to every source in one cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Sources that installed a new artifact
    pub installed: Vec<String>,
    /// Sources that stopped without installing, with the reason
    pub skipped: Vec<(String, String)>,
    /// Sources waiting for a file choice
    pub suspended: Vec<String>,
    /// Sources that failed, with the error
    pub failed: Vec<(String, String)>,
    /// Whether any source failed because a host was unreachable
    pub network_errors: bool,
}

/// Periodic driver of an [`UpdatePipeline`].
#[derive(Debug)]
pub struct Scheduler {
    pipeline: Arc<UpdatePipeline>,
    interval: Duration,
    requester: String,
    network_warning_shown: AtomicBool,
}

impl Scheduler {
    /// Scheduler running a cycle every `interval`.
    pub fn new(pipeline: Arc<UpdatePipeline>, interval: Duration) -> Self {
        Self {
            pipeline,
            interval,
            requester: CONSOLE_REQUESTER.to_string(),
            network_warning_shown: AtomicBool::new(false),
        }
    }

    /// Route selections raised by this scheduler to `requester`.
    #[must_use]
    pub fn with_requester(mut self, requester: impl Into<String>) -> Self {
        self.requester = requester.into();
        self
    }

    /// The pipeline being driven.
    pub fn pipeline(&self) -> &Arc<UpdatePipeline> {
        &self.pipeline
    }

    /// Run one cycle over every source, or only `only` when given.
    pub async fn run_cycle(&self, only: Option<&str>) -> CycleReport {
        let sources = self.pipeline.registry().snapshot();
        let mut report = CycleReport::default();

        for source in sources.iter().filter(|s| only.is_none_or(|name| s.name == name)) {
            let name = source.name.clone();
            let run = self.pipeline.run_source(Arc::clone(source), &self.requester);
            let outcome = match AssertUnwindSafe(run).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => {
                    error!("Update of '{}' panicked", name);
                    report.failed.push((name, "panicked".to_string()));
                    continue;
                }
            };
            self.record(&mut report, outcome);
        }

        if !report.network_errors && self.network_warning_shown.swap(false, Ordering::Relaxed) {
            info!("Connectivity restored");
        }
        info!(
            "Update cycle done: {} installed, {} skipped, {} waiting, {} failed",
            report.installed.len(),
            report.skipped.len(),
            report.suspended.len(),
            report.failed.len()
        );
        report
    }

    fn record(&self, report: &mut CycleReport, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Installed(event) => report.installed.push(event.source),
            JobOutcome::Cancelled { source, reason } => {
                debug!("{}: {}", source, reason);
                report.skipped.push((source, reason));
            }
            JobOutcome::Suspended { source, requester } => {
                warn!("{}: waiting for '{}' to choose a file", source, requester);
                report.suspended.push(source);
            }
            JobOutcome::Failed { source, error } if error.is_network() => {
                report.network_errors = true;
                if self.network_warning_shown.swap(true, Ordering::Relaxed) {
                    debug!("{}: {}", source, error);
                } else {
                    warn!("{}: {} (further connectivity errors are logged at debug level)", source, error);
                }
                report.failed.push((source, error.to_string()));
            }
            JobOutcome::Failed { source, error } => {
                error!("{}: {}", source, error);
                report.failed.push((source, error.to_string()));
            }
        }
    }

    /// Run cycles every interval until `shutdown` resolves.
    ///
    /// The first cycle starts immediately. A cycle in progress when
    /// `shutdown` fires is abandoned between awaits; the atomic downloader
    /// leaves no partial artifact behind.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    tokio::select! {
                        () = &mut shutdown => {
                            info!("Scheduler stopping mid-cycle");
                            break;
                        }
                        _ = self.run_cycle(None) => {}
                    }
                }
            }
        }
    }
}
