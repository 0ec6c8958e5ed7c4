//! The Fetch, Download and Install stages.

use super::{PendingSelection, PipelineServices, StepOutcome, UpdateContext};
use crate::download::{ArtifactTransform, BackupPolicy, DownloadRequest, ExtractArchive, VerifyJar};
use crate::host::UpdateCompletedEvent;
use crate::source::ResolveContext;
use crate::source::assets::is_primary_name;
use crate::version::{VersionComparator, strip_build_suffix};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// One stage of an update run.
#[async_trait]
pub trait UpdateStep: Send + Sync {
    /// Stage name used in logs.
    fn name(&self) -> &'static str;

    /// Run the stage on `ctx`.
    async fn run(&self, ctx: UpdateContext, services: &PipelineServices) -> StepOutcome;
}

/// Whether a fetched build should be installed.
///
/// True when the fetched build is strictly greater than the stored one, or
/// when the host reports an installed version older than the fetched label.
/// A source that was never installed has no stored build and always
/// proceeds.
pub fn needs_update(stored_build: Option<i64>, latest_build: i64, installed: Option<&str>, latest_version: &str) -> bool {
    match stored_build {
        None => true,
        Some(stored) if latest_build > stored => true,
        Some(_) => installed.is_some_and(|installed| {
            let latest = strip_build_suffix(latest_version);
            VersionComparator::has_numeric_tokens(installed)
                && VersionComparator::has_numeric_tokens(latest)
                && VersionComparator::is_newer(latest, installed)
        }),
    }
}

/// Asks the source for its latest build and decides whether to continue.
#[derive(Debug, Default, Clone, Copy)]
pub struct FetchStep;

#[async_trait]
impl UpdateStep for FetchStep {
    fn name(&self) -> &'static str {
        "fetch"
    }

    async fn run(&self, mut ctx: UpdateContext, services: &PipelineServices) -> StepOutcome {
        let stored = match services.state.get(ctx.source_name()) {
            Ok(record) => record,
            Err(e) => return StepOutcome::Failed(ctx, e),
        };

        let host_version = services.host.host_version();
        let resolve = ResolveContext {
            source_name: &ctx.source.name,
            host_version: host_version.as_deref(),
        };
        let latest = match ctx.source.source.load_latest_build_info(&resolve).await {
            Ok(latest) => latest,
            Err(e) if e.is_selection_required() => {
                return match PendingSelection::from_error(ctx.clone(), e) {
                    Ok(selection) => StepOutcome::Suspended(Box::new(selection)),
                    Err(e) => StepOutcome::Failed(ctx, e),
                };
            }
            Err(e) => return StepOutcome::Failed(ctx, e),
        };

        let installed = ctx
            .source
            .source
            .installed_version(services.host.as_ref(), ctx.source.linked_component.as_deref());
        debug!(
            "{}: stored build {:?}, latest {} (build {}), installed {:?}",
            ctx.source_name(),
            stored.as_ref().map(|r| r.build),
            latest.version,
            latest.build,
            installed
        );

        if !needs_update(stored.as_ref().map(|r| r.build), latest.build, installed.as_deref(), &latest.version) {
            ctx.cancel(format!("already up to date ({})", latest.version));
            ctx.latest = Some(latest);
            return StepOutcome::Cancelled(ctx);
        }
        if latest.download_url.is_none() {
            ctx.cancel("missing download URL");
            ctx.latest = Some(latest);
            return StepOutcome::Cancelled(ctx);
        }

        info!("{}: update available: {} (build {})", ctx.source_name(), latest.version, latest.build);
        ctx.latest = Some(latest);
        StepOutcome::Continue(ctx)
    }
}

/// Downloads the chosen build over the destination.
#[derive(Debug, Default, Clone, Copy)]
pub struct DownloadStep;

impl DownloadStep {
    fn transform_for(ctx: &UpdateContext, is_archive: bool) -> Option<Arc<dyn ArtifactTransform>> {
        if is_archive {
            return Some(Arc::new(ExtractArchive::new(None)));
        }
        let name = ctx.destination.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        if is_primary_name(&name) {
            return Some(Arc::new(VerifyJar));
        }
        None
    }
}

#[async_trait]
impl UpdateStep for DownloadStep {
    fn name(&self) -> &'static str {
        "download"
    }

    async fn run(&self, mut ctx: UpdateContext, services: &PipelineServices) -> StepOutcome {
        let Some((url, checksum, is_archive)) = ctx
            .latest
            .as_ref()
            .and_then(|l| l.download_url.clone().map(|url| (url, l.checksum.clone(), l.is_archive)))
        else {
            ctx.cancel("missing download URL");
            return StepOutcome::Cancelled(ctx);
        };

        let mut request = DownloadRequest::new(url, ctx.destination.clone());
        request.connect_timeout = services.layout.connect_timeout;
        request.read_timeout = services.layout.read_timeout;
        request.checksum = checksum;
        request.transform = Self::transform_for(&ctx, is_archive);
        if services.layout.backup_retention > 0 {
            request.backup = Some(BackupPolicy {
                root: services.layout.backup_root.clone(),
                source_id: ctx.source.name.clone(),
                retention: services.layout.backup_retention,
            });
        }
        request.observer = services.observers.as_ref().map(|make| make(ctx.source_name()));

        match services.downloader.download(&request).await {
            Ok(outcome) => {
                ctx.downloaded = Some(outcome);
                StepOutcome::Continue(ctx)
            }
            Err(e) => StepOutcome::Failed(ctx, e),
        }
    }
}

/// Persists the new build and notifies the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct InstallStep;

#[async_trait]
impl UpdateStep for InstallStep {
    fn name(&self) -> &'static str {
        "install"
    }

    async fn run(&self, mut ctx: UpdateContext, services: &PipelineServices) -> StepOutcome {
        let (Some(latest), Some(downloaded)) = (ctx.latest.clone(), ctx.downloaded.clone()) else {
            ctx.cancel("nothing was downloaded");
            return StepOutcome::Cancelled(ctx);
        };

        let state = services.state.clone();
        let name = ctx.source.name.clone();
        let (build, version) = (latest.build, latest.version.clone());
        let recorded = tokio::task::spawn_blocking(move || state.record(&name, build, &version)).await;
        match recorded {
            Ok(Ok(record)) => debug!("{}: recorded build {}", ctx.source_name(), record.build),
            Ok(Err(e)) => return StepOutcome::Failed(ctx, e),
            Err(join) => {
                return StepOutcome::Failed(ctx, std::io::Error::other(format!("state writer failed: {join}")).into());
            }
        }

        let event = UpdateCompletedEvent {
            source: ctx.source.name.clone(),
            destination: ctx.destination.clone(),
            version: latest.version,
            build: latest.build,
            artifact_path: downloaded.path,
            download_url: latest.download_url.unwrap_or_default(),
        };
        if let Err(e) = services.control.dispatch(event.clone()).await {
            return StepOutcome::Failed(ctx, e);
        }
        info!("Installed {}", event);
        ctx.completed = Some(event);
        StepOutcome::Continue(ctx)
    }
}
