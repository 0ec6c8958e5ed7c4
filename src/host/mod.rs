//! The seam between the update pipeline and the host application.
//!
//! The pipeline never touches the host directly. It asks [`HostModules`]
//! which versions are installed, and after a successful install it hands an
//! [`UpdateCompletedEvent`] to the [`ControlThread`], which invokes every
//! registered [`UpdateCompletionListener`] on the host's single designated
//! thread. Reloading the updated module is the host's business and is
//! modelled by the [`Lifecycle`] capability, adapted into a listener by
//! [`LifecycleBridge`].

mod control;
mod directory;

pub use control::ControlThread;
pub use directory::{DirectoryModules, LoggingLifecycle};

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Read-only view of the modules the host has loaded.
pub trait HostModules: Send + Sync {
    /// Version reported by the named component, if it is installed.
    fn installed_version(&self, component: &str) -> Option<String>;

    /// Version of the running host itself.
    fn host_version(&self) -> Option<String>;
}

/// Emitted once per successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCompletedEvent {
    /// Name of the update source
    pub source: String,
    /// Final on-disk location of the artifact
    pub destination: PathBuf,
    /// Installed version label
    pub version: String,
    /// Installed build number
    pub build: i64,
    /// Path the downloader produced (equal to `destination` after commit)
    pub artifact_path: PathBuf,
    /// Where the artifact was downloaded from
    pub download_url: String,
}

impl fmt::Display for UpdateCompletedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} (build {}) -> {}", self.source, self.version, self.build, self.destination.display())
    }
}

/// Receives completion events on the control thread.
pub trait UpdateCompletionListener: Send + Sync {
    /// Called once per installed update, on the control thread.
    fn on_update_completed(&self, event: &UpdateCompletedEvent);
}

/// Host capability to activate a freshly installed artifact.
pub trait Lifecycle: Send + Sync {
    /// Activate the artifact described by `event` (hot reload, schedule a
    /// restart, ...).
    ///
    /// # Errors
    ///
    /// Any host-specific failure; it is logged and does not undo the install.
    fn activate(&self, event: &UpdateCompletedEvent) -> anyhow::Result<()>;
}

/// Forwards completion events to a [`Lifecycle`].
pub struct LifecycleBridge {
    lifecycle: Arc<dyn Lifecycle>,
}

impl LifecycleBridge {
    /// Wrap a lifecycle capability.
    pub fn new(lifecycle: Arc<dyn Lifecycle>) -> Self {
        Self { lifecycle }
    }
}

impl UpdateCompletionListener for LifecycleBridge {
    fn on_update_completed(&self, event: &UpdateCompletedEvent) {
        match self.lifecycle.activate(event) {
            Ok(()) => info!("Activated {}", event),
            Err(e) => warn!("Installed {} but activation failed: {:#}", event.source, e),
        }
    }
}
