//! Wiring shared by every command: configuration, registry and pipeline.

use crate::config::UpdaterConfig;
use crate::download::{ArtifactDownloader, DownloadObserver};
use crate::host::{ControlThread, DirectoryModules, LifecycleBridge, LoggingLifecycle, UpdateCompletionListener};
use crate::net::{HttpTransport, ReqwestTransport};
use crate::pipeline::{HostLayout, ObserverFactory, PipelineServices, UpdatePipeline};
use crate::registry::{RegistryReport, SourceRegistry};
use crate::state::BuildStateStore;
use crate::utils::DownloadProgress;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Name of the thread completion events are delivered on.
pub const CONTROL_THREAD_NAME: &str = "updraft-control";

/// Everything a command needs, built from one configuration file.
pub struct Runtime {
    /// Path the configuration was loaded from
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: UpdaterConfig,
    /// Registry load report
    pub report: RegistryReport,
    /// Pipeline over the configured sources
    pub pipeline: Arc<UpdatePipeline>,
    /// Control thread; shut down when the command ends
    pub control: Arc<ControlThread>,
}

impl Runtime {
    /// Load the configuration and wire the pipeline.
    ///
    /// # Errors
    ///
    /// Fails when the configuration cannot be loaded, a host path cannot be
    /// resolved, or the HTTP client or control thread cannot start.
    pub async fn load(config_path: Option<&Path>, progress: bool) -> Result<Self> {
        let config_path = UpdaterConfig::resolve_path(config_path)?;
        let config = UpdaterConfig::load_from(&config_path).await?;
        if config.is_legacy() {
            warn!("{} uses a legacy layout; run `updraft migrate` to rewrite it", config_path.display());
        }

        let transport: Arc<dyn HttpTransport> =
            Arc::new(ReqwestTransport::new(&config.updates.net_options()).context("Failed to build HTTP client")?);
        let (registry, report) = SourceRegistry::from_config(Arc::clone(&transport), &config.updates);

        let addon_dir = config.host.addon_path()?;
        let listeners: Vec<Arc<dyn UpdateCompletionListener>> =
            vec![Arc::new(LifecycleBridge::new(Arc::new(LoggingLifecycle)))];
        let control = Arc::new(
            ControlThread::spawn(CONTROL_THREAD_NAME, listeners).context("Failed to start the control thread")?,
        );

        let observers: Option<ObserverFactory> = progress.then(|| {
            let factory: ObserverFactory =
                Arc::new(|name: &str| Arc::new(DownloadProgress::new(name)) as Arc<dyn DownloadObserver>);
            factory
        });

        let services = PipelineServices {
            host: Arc::new(DirectoryModules::new(addon_dir.clone(), config.host.version.clone())),
            state: BuildStateStore::new(config.host.state_path()?),
            downloader: ArtifactDownloader::new(transport),
            control: Arc::clone(&control),
            layout: HostLayout {
                root: config.host.root_path()?,
                addon_dir,
                backup_root: config.host.backup_path()?,
                backup_retention: config.updates.backup_retention,
                connect_timeout: Duration::from_secs(config.updates.connect_timeout_secs),
                read_timeout: Duration::from_secs(config.updates.read_timeout_secs),
            },
            observers,
        };
        let pipeline = Arc::new(UpdatePipeline::new(Arc::new(registry), services).with_config_path(&config_path));

        Ok(Self {
            config_path,
            config,
            report,
            pipeline,
            control,
        })
    }

    /// Print entries the registry skipped.
    pub fn print_skipped(&self) {
        for (name, reason) in &self.report.skipped {
            eprintln!("{} {}: {}", "skipped".yellow(), name, reason);
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.control.shutdown();
    }
}
