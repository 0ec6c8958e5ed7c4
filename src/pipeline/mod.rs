//! The Fetch → Download → Install pipeline.
//!
//! Each run owns one [`UpdateContext`]. Steps take the context by value and
//! return a [`StepOutcome`]: `Continue` hands it to the next step, while
//! `Cancelled`, `Suspended` and `Failed` end the run early. A cancelled run
//! never reinstalls anything.
//!
//! ```text
//! FetchStep ──► DownloadStep ──► InstallStep
//!    │               │                │
//!    ├─ up to date ──┴─ Failed ───────┴─ Failed
//!    └─ several files → Suspended (parked in PendingSelections)
//! ```

mod context;
mod selection;
mod steps;

pub use context::UpdateContext;
pub use selection::{PendingSelection, PendingSelections};
pub use steps::{DownloadStep, FetchStep, InstallStep, UpdateStep, needs_update};

use crate::config::set_source_option;
use crate::core::UpdaterError;
use crate::download::{ArtifactDownloader, DownloadObserver};
use crate::host::{ControlThread, HostModules, UpdateCompletedEvent};
use crate::registry::{SourceRegistry, UpdateSource};
use crate::source::assets::pattern_from_filename;
use crate::state::BuildStateStore;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Result of one step.
#[derive(Debug)]
pub enum StepOutcome {
    /// Hand the context to the next step
    Continue(UpdateContext),
    /// Stop without error; the context carries the reason
    Cancelled(UpdateContext),
    /// Wait for a file choice
    Suspended(Box<PendingSelection>),
    /// Stop with an error
    Failed(UpdateContext, UpdaterError),
}

/// Result of a whole run.
#[derive(Debug)]
pub enum JobOutcome {
    /// A new artifact was installed
    Installed(UpdateCompletedEvent),
    /// Nothing to do, or a step cancelled the run
    Cancelled {
        /// Source name
        source: String,
        /// Cancellation reason
        reason: String,
    },
    /// Parked until the requester chooses a file
    Suspended {
        /// Source name
        source: String,
        /// Requester who has to choose
        requester: String,
    },
    /// A step failed
    Failed {
        /// Source name
        source: String,
        /// The error
        error: UpdaterError,
    },
}

impl JobOutcome {
    /// Name of the source the run was for.
    pub fn source(&self) -> &str {
        match self {
            Self::Installed(event) => &event.source,
            Self::Cancelled { source, .. } | Self::Suspended { source, .. } | Self::Failed { source, .. } => source,
        }
    }
}

/// Host layout and transfer settings shared by every run.
#[derive(Debug, Clone)]
pub struct HostLayout {
    /// Host installation root
    pub root: PathBuf,
    /// Add-on directory
    pub addon_dir: PathBuf,
    /// Backup root
    pub backup_root: PathBuf,
    /// Backups kept per source; 0 disables backups
    pub backup_retention: usize,
    /// Download connect timeout
    pub connect_timeout: Duration,
    /// Download per-chunk read timeout
    pub read_timeout: Duration,
}

/// Builds a progress observer for a named source.
pub type ObserverFactory = Arc<dyn Fn(&str) -> Arc<dyn DownloadObserver> + Send + Sync>;

/// Collaborators every step may use.
#[derive(Clone)]
pub struct PipelineServices {
    /// Host module view
    pub host: Arc<dyn HostModules>,
    /// Persisted build markers
    pub state: BuildStateStore,
    /// Atomic downloader
    pub downloader: ArtifactDownloader,
    /// Delivers completion events on the host's control thread
    pub control: Arc<ControlThread>,
    /// Paths and transfer settings
    pub layout: HostLayout,
    /// Progress observers for downloads
    pub observers: Option<ObserverFactory>,
}

impl fmt::Debug for PipelineServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineServices")
            .field("state", &self.state)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

/// Ordered list of steps.
#[derive(Clone)]
pub struct UpdateJob {
    steps: Vec<Arc<dyn UpdateStep>>,
}

impl Default for UpdateJob {
    fn default() -> Self {
        Self::new(vec![Arc::new(FetchStep), Arc::new(DownloadStep), Arc::new(InstallStep)])
    }
}

impl fmt::Debug for UpdateJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.steps.iter().map(|s| s.name())).finish()
    }
}

impl UpdateJob {
    /// Job running `steps` in order.
    pub fn new(steps: Vec<Arc<dyn UpdateStep>>) -> Self {
        Self { steps }
    }

    /// Run every step until one stops the run.
    ///
    /// Suspended runs are returned as-is so the caller can park them.
    pub async fn run(&self, mut ctx: UpdateContext, services: &PipelineServices) -> Result<UpdateContext, StepOutcome> {
        for step in &self.steps {
            debug!("{}: running {} step", ctx.source_name(), step.name());
            match step.run(ctx, services).await {
                StepOutcome::Continue(next) if next.is_cancelled() => return Err(StepOutcome::Cancelled(next)),
                StepOutcome::Continue(next) => ctx = next,
                stopped => return Err(stopped),
            }
        }
        Ok(ctx)
    }
}

/// Runs update jobs for registered sources and owns pending selections.
pub struct UpdatePipeline {
    registry: Arc<SourceRegistry>,
    services: PipelineServices,
    job: UpdateJob,
    pending: PendingSelections,
    config_path: Option<PathBuf>,
}

impl fmt::Debug for UpdatePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdatePipeline")
            .field("job", &self.job)
            .field("pending", &self.pending.len())
            .field("config_path", &self.config_path)
            .finish_non_exhaustive()
    }
}

impl UpdatePipeline {
    /// Pipeline running the standard Fetch → Download → Install job.
    pub fn new(registry: Arc<SourceRegistry>, services: PipelineServices) -> Self {
        Self {
            registry,
            services,
            job: UpdateJob::default(),
            pending: PendingSelections::new(),
            config_path: None,
        }
    }

    /// Persist interactive asset choices into the configuration at `path`.
    #[must_use]
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Replace the job.
    #[must_use]
    pub fn with_job(mut self, job: UpdateJob) -> Self {
        self.job = job;
        self
    }

    /// The source registry.
    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    /// Shared collaborators.
    pub fn services(&self) -> &PipelineServices {
        &self.services
    }

    /// Pending selections.
    pub fn pending(&self) -> &PendingSelections {
        &self.pending
    }

    /// Fresh context for `source` on behalf of `requester`.
    pub fn context_for(&self, source: Arc<UpdateSource>, requester: &str) -> UpdateContext {
        let layout = &self.services.layout;
        let destination = source.destination(&layout.root, &layout.addon_dir);
        UpdateContext::new(source, destination, requester)
    }

    /// Run the job for one source.
    pub async fn run_source(&self, source: Arc<UpdateSource>, requester: &str) -> JobOutcome {
        let ctx = self.context_for(source, requester);
        self.finish(self.job.run(ctx, &self.services).await)
    }

    /// Answer the requester's pending selection with 1-based `index`.
    ///
    /// The chosen file name becomes a durable pattern on the source (and in
    /// the configuration file, when one is set), then the run starts again
    /// from Fetch, which now resolves without asking.
    ///
    /// # Errors
    ///
    /// [`UpdaterError::Configuration`] when nothing is pending, the index is
    /// out of range, or the source can no longer be rebuilt.
    pub async fn resolve_selection(&self, requester: &str, index: usize) -> Result<JobOutcome, UpdaterError> {
        let (selection, asset) = self.pending.take_choice(requester, index)?;
        let name = selection.context.source_name().to_string();
        let pattern = pattern_from_filename(&asset.name);

        let (source, key) = self.registry.apply_asset_pattern(&name, &pattern)?;
        if let Some(path) = &self.config_path
            && let Err(e) = set_source_option(path, &name, key, &pattern).await
        {
            warn!("Could not save the file choice for '{}': {:#}", name, e);
        }

        Ok(self.run_source(source, requester).await)
    }

    fn finish(&self, result: Result<UpdateContext, StepOutcome>) -> JobOutcome {
        match result {
            Ok(ctx) => match ctx.completed {
                Some(event) => JobOutcome::Installed(event),
                None => JobOutcome::Cancelled {
                    source: ctx.source.name.clone(),
                    reason: "no step installed anything".to_string(),
                },
            },
            Err(StepOutcome::Cancelled(ctx)) => JobOutcome::Cancelled {
                source: ctx.source.name.clone(),
                reason: ctx.cancel_reason().unwrap_or("cancelled").to_string(),
            },
            Err(StepOutcome::Suspended(selection)) => {
                let outcome = JobOutcome::Suspended {
                    source: selection.context.source.name.clone(),
                    requester: selection.context.requester.clone(),
                };
                self.pending.insert(*selection);
                outcome
            }
            Err(StepOutcome::Failed(ctx, error)) => JobOutcome::Failed {
                source: ctx.source.name.clone(),
                error,
            },
            Err(StepOutcome::Continue(ctx)) => JobOutcome::Cancelled {
                source: ctx.source.name.clone(),
                reason: "run stopped early".to_string(),
            },
        }
    }
}
