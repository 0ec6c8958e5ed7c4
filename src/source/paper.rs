//! Release-archive provider (PaperMC-style download API).
//!
//! Resolution walks three endpoints:
//!
//! 1. `GET /projects/<project>` for the list of game versions,
//! 2. `GET /projects/<project>/versions/<v>` for the build numbers of one version,
//! 3. `GET /projects/<project>/versions/<v>/builds/<b>` for the channel and
//!    the published SHA-256 of one build.
//!
//! The version is the pinned `version` option, else the host's own running
//! version when the project publishes it, else the newest stable version.

use super::{LatestBuild, ProviderEnv, ResolveContext, SourceOptions, VersionSource};
use crate::core::UpdaterError;
use crate::download::ChecksumValidator;
use crate::host::HostModules;
use crate::net::{HttpTransport, api_url, fetch_json};
use crate::version::VersionComparator;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.papermc.io/v2";

#[derive(Debug, Deserialize)]
struct ProjectResponse {
    versions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    builds: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct BuildResponse {
    build: i64,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    downloads: HashMap<String, DownloadEntry>,
}

#[derive(Debug, Deserialize)]
struct DownloadEntry {
    name: String,
    #[serde(default)]
    sha256: Option<String>,
}

/// Release-archive version source.
pub struct PaperSource {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    project: String,
    pinned_version: Option<String>,
    ignore_unstable: bool,
    max_builds: u32,
}

impl fmt::Debug for PaperSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaperSource")
            .field("base_url", &self.base_url)
            .field("project", &self.project)
            .field("pinned_version", &self.pinned_version)
            .field("ignore_unstable", &self.ignore_unstable)
            .finish_non_exhaustive()
    }
}

impl PaperSource {
    /// Source for `project` with default settings.
    pub fn for_project(env: &ProviderEnv, project: &str) -> Self {
        Self {
            transport: Arc::clone(&env.transport),
            base_url: DEFAULT_BASE_URL.to_string(),
            project: project.to_string(),
            pinned_version: None,
            ignore_unstable: env.ignore_unstable,
            max_builds: env.max_pages,
        }
    }

    /// Build from options: `project` (defaults to `default_project`),
    /// `version`, `base_url`, `ignore_unstable`, `max_builds`.
    ///
    /// # Errors
    ///
    /// [`UpdaterError::Configuration`] for malformed numeric options.
    pub fn from_options(
        env: &ProviderEnv,
        options: &SourceOptions,
        default_project: &str,
    ) -> Result<Self, UpdaterError> {
        let mut source =
            Self::for_project(env, &options.str("project").unwrap_or_else(|| default_project.to_string()));
        source.pinned_version = options.str("version");
        if let Some(base) = options.str("base_url") {
            source.base_url = base;
        }
        if let Some(flag) = options.bool("ignore_unstable") {
            source.ignore_unstable = flag;
        }
        if let Some(max) = options.u32("max_builds")? {
            source.max_builds = max;
        }
        Ok(source)
    }

    async fn choose_version(&self, ctx: &ResolveContext<'_>) -> Result<String, UpdaterError> {
        if let Some(pinned) = &self.pinned_version {
            return Ok(pinned.clone());
        }
        let url = api_url(&self.base_url, &["projects", &self.project], &[])?;
        let project: ProjectResponse = fetch_json(self.transport.as_ref(), &url).await?;

        if let Some(host) = ctx.host_version
            && project.versions.iter().any(|v| v == host)
        {
            return Ok(host.to_string());
        }

        project
            .versions
            .iter()
            .filter(|v| !(self.ignore_unstable && VersionComparator::looks_unstable(v)))
            .max_by(|a, b| {
                VersionComparator::compare_dotted(a, b)
                    .then_with(|| VersionComparator::compare_tokens(a, b))
            })
            .cloned()
            .ok_or_else(|| {
                UpdaterError::no_candidate(ctx.source_name, format!("project '{}' lists no stable versions", self.project))
            })
    }
}

#[async_trait]
impl VersionSource for PaperSource {
    fn provider(&self) -> &'static str {
        "paper"
    }

    fn describe(&self) -> String {
        match &self.pinned_version {
            Some(version) => format!("paper:{}@{}", self.project, version),
            None => format!("paper:{}", self.project),
        }
    }

    async fn load_latest_build_info(&self, ctx: &ResolveContext<'_>) -> Result<LatestBuild, UpdaterError> {
        let version = self.choose_version(ctx).await?;
        let url = api_url(&self.base_url, &["projects", &self.project, "versions", &version], &[])?;
        let listing: VersionResponse = fetch_json(self.transport.as_ref(), &url).await?;

        let mut builds = listing.builds;
        builds.sort_unstable_by(|a, b| b.cmp(a));
        builds.dedup();

        for build in builds.into_iter().take(self.max_builds as usize) {
            let build_str = build.to_string();
            let url = api_url(
                &self.base_url,
                &["projects", &self.project, "versions", &version, "builds", &build_str],
                &[],
            )?;
            let detail: BuildResponse = fetch_json(self.transport.as_ref(), &url).await?;

            let channel = detail.channel.as_deref().unwrap_or("default");
            if self.ignore_unstable && !channel.eq_ignore_ascii_case("default") {
                debug!("Skipping {} build {} on channel {}", self.project, detail.build, channel);
                continue;
            }

            let (name, sha256) = match detail.downloads.get("application") {
                Some(entry) => (entry.name.clone(), entry.sha256.clone()),
                None => (format!("{}-{}-{}.jar", self.project, version, detail.build), None),
            };
            let download_url = api_url(
                &self.base_url,
                &["projects", &self.project, "versions", &version, "builds", &build_str, "downloads", &name],
                &[],
            )?;

            let mut latest = LatestBuild::new(format!("{version}-b{}", detail.build), detail.build, download_url);
            latest.asset_name = Some(name);
            latest.checksum = sha256.as_deref().map(ChecksumValidator::sha256);
            return Ok(latest);
        }

        Err(UpdaterError::no_candidate(
            ctx.source_name,
            format!("no eligible {} build for version {}", self.project, version),
        ))
    }

    /// The running host version, unless the source is pinned to a different
    /// version line; then the host says nothing about the installed artifact.
    fn installed_version(&self, host: &dyn HostModules, _component: Option<&str>) -> Option<String> {
        let running = host.host_version()?;
        match &self.pinned_version {
            Some(pinned) if VersionComparator::compare_dotted(pinned, &running) != std::cmp::Ordering::Equal => {
                debug!("{} pinned to {pinned} while the host runs {running}", self.project);
                None
            }
            _ => Some(running),
        }
    }
}
