//! Per-run state threaded through the steps.

use crate::download::DownloadOutcome;
use crate::host::UpdateCompletedEvent;
use crate::registry::UpdateSource;
use crate::source::LatestBuild;
use std::path::PathBuf;
use std::sync::Arc;

/// State of one pipeline run for one source.
///
/// Owned by exactly one run; steps take it by value and hand it back inside
/// their [`StepOutcome`](super::StepOutcome).
#[derive(Debug, Clone)]
pub struct UpdateContext {
    /// Source being updated
    pub source: Arc<UpdateSource>,
    /// Final artifact path
    pub destination: PathBuf,
    /// Who asked for this run; interactive selections are routed back here
    pub requester: String,
    /// Build chosen by Fetch
    pub latest: Option<LatestBuild>,
    /// Artifact committed by Download
    pub downloaded: Option<DownloadOutcome>,
    /// Event emitted by Install
    pub completed: Option<UpdateCompletedEvent>,
    cancel_reason: Option<String>,
}

impl UpdateContext {
    /// Fresh context for `source`.
    pub fn new(source: Arc<UpdateSource>, destination: PathBuf, requester: impl Into<String>) -> Self {
        Self {
            source,
            destination,
            requester: requester.into(),
            latest: None,
            downloaded: None,
            completed: None,
            cancel_reason: None,
        }
    }

    /// Name of the source.
    pub fn source_name(&self) -> &str {
        &self.source.name
    }

    /// Stop the run; later steps are skipped.
    pub fn cancel(&mut self, reason: impl Into<String>) {
        self.cancel_reason = Some(reason.into());
    }

    /// Whether [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_reason.is_some()
    }

    /// Reason given to [`cancel`](Self::cancel).
    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }
}
