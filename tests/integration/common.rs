//! Shared fixture: a temporary host wired to a fake transport.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use updraft::config::UpdaterConfig;
use updraft::download::ArtifactDownloader;
use updraft::host::{ControlThread, UpdateCompletionListener};
use updraft::pipeline::{HostLayout, PipelineServices, UpdatePipeline};
use updraft::registry::{RegistryReport, SourceRegistry};
use updraft::scheduler::Scheduler;
use updraft::state::BuildStateStore;
use updraft::test_utils::{FakeTransport, RecordingListener, StaticHostModules, init_test_logging};

pub struct TestHost {
    pub temp: TempDir,
    pub transport: Arc<FakeTransport>,
    pub host: Arc<StaticHostModules>,
    pub listener: Arc<RecordingListener>,
    pub report: RegistryReport,
    pub scheduler: Scheduler,
}

impl TestHost {
    /// Host whose configuration file holds `config`; `{root}` is replaced by
    /// the temporary host root.
    pub async fn new(config: &str, host: StaticHostModules) -> Result<Self> {
        init_test_logging(None);
        let temp = TempDir::new()?;
        let root = temp.path().join("server");
        let config_text = config.replace("{root}", &root.display().to_string());
        let config_path = temp.path().join("config.toml");
        tokio::fs::write(&config_path, &config_text).await?;
        let config = UpdaterConfig::load_from(&config_path).await?;

        let transport = Arc::new(FakeTransport::new());
        let (registry, report) = SourceRegistry::from_config(transport.clone(), &config.updates);
        let host = Arc::new(host);
        let listener = Arc::new(RecordingListener::new());
        let listeners: Vec<Arc<dyn UpdateCompletionListener>> = vec![listener.clone()];

        let services = PipelineServices {
            host: host.clone(),
            state: BuildStateStore::new(config.host.state_path()?),
            downloader: ArtifactDownloader::new(transport.clone()),
            control: Arc::new(ControlThread::spawn("host-main", listeners)?),
            layout: HostLayout {
                root: config.host.root_path()?,
                addon_dir: config.host.addon_path()?,
                backup_root: config.host.backup_path()?,
                backup_retention: config.updates.backup_retention,
                connect_timeout: Duration::from_secs(2),
                read_timeout: Duration::from_secs(2),
            },
            observers: None,
        };
        let pipeline = Arc::new(UpdatePipeline::new(Arc::new(registry), services).with_config_path(&config_path));
        let scheduler = Scheduler::new(pipeline, config.updates.interval());

        Ok(Self {
            temp,
            transport,
            host,
            listener,
            report,
            scheduler,
        })
    }

    pub fn root(&self) -> PathBuf {
        self.temp.path().join("server")
    }

    pub fn config_path(&self) -> PathBuf {
        self.temp.path().join("config.toml")
    }

    pub fn pipeline(&self) -> &Arc<UpdatePipeline> {
        self.scheduler.pipeline()
    }
}
