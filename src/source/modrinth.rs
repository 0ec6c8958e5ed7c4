//! Search-style versioned-project provider (Modrinth-style API).
//!
//! `GET /project/<slug>/version` returns every version of a project in one
//! array. Versions are filtered by release type, loader and target game
//! version, then ranked with [`RankKey`]: a version that targets a preferred
//! game version exactly beats one that only shares its `major.minor` family,
//! regardless of which was published later.

use super::{
    AssetDisambiguator, BestCandidate, LatestBuild, ProviderEnv, RankKey, ReleaseAsset, ResolveContext,
    SourceOptions, TargetVersions, VersionSource,
};
use crate::core::UpdaterError;
use crate::download::ChecksumValidator;
use crate::net::{HttpTransport, api_url, fetch_json};
use crate::version::resolve_build_number;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.modrinth.com/v2";

#[derive(Debug, Deserialize)]
struct ProjectVersion {
    id: String,
    version_number: String,
    #[serde(default)]
    version_type: Option<String>,
    #[serde(default)]
    date_published: Option<DateTime<Utc>>,
    #[serde(default)]
    game_versions: Vec<String>,
    #[serde(default)]
    loaders: Vec<String>,
    #[serde(default)]
    files: Vec<VersionFile>,
}

#[derive(Debug, Clone, Deserialize)]
struct VersionFile {
    url: String,
    filename: String,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    hashes: HashMap<String, String>,
}

/// Modrinth-style version source.
pub struct ModrinthSource {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    project: String,
    loaders: Vec<String>,
    game_versions: Vec<String>,
    allow_unstable: bool,
    asset_pattern: Option<Regex>,
}

impl fmt::Debug for ModrinthSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModrinthSource")
            .field("project", &self.project)
            .field("loaders", &self.loaders)
            .field("game_versions", &self.game_versions)
            .field("allow_unstable", &self.allow_unstable)
            .finish_non_exhaustive()
    }
}

impl ModrinthSource {
    /// Build from options: `project` (required), `loaders`, `game_versions`,
    /// `allow_unstable`, `asset_pattern`, `base_url`.
    ///
    /// # Errors
    ///
    /// [`UpdaterError::Configuration`] when `project` is missing or
    /// `asset_pattern` is invalid.
    pub fn from_options(env: &ProviderEnv, options: &SourceOptions) -> Result<Self, UpdaterError> {
        Ok(Self {
            transport: Arc::clone(&env.transport),
            base_url: options.str("base_url").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            project: options.required_str("project")?,
            loaders: options.list("loaders").into_iter().map(|l| l.to_ascii_lowercase()).collect(),
            game_versions: options.list("game_versions"),
            allow_unstable: options.bool("allow_unstable").unwrap_or(!env.ignore_unstable),
            asset_pattern: options.regex("asset_pattern")?,
        })
    }

    fn loader_matches(&self, version: &ProjectVersion) -> bool {
        self.loaders.is_empty()
            || version.loaders.iter().any(|l| self.loaders.contains(&l.to_ascii_lowercase()))
    }

    fn stability_matches(&self, version: &ProjectVersion) -> bool {
        self.allow_unstable
            || version.version_type.as_deref().is_none_or(|t| t.eq_ignore_ascii_case("release"))
    }

    fn choose_file(
        &self,
        ctx: &ResolveContext<'_>,
        version: &ProjectVersion,
        build: i64,
    ) -> Result<VersionFile, UpdaterError> {
        let by_name = |name: &str| version.files.iter().find(|f| f.filename == name);

        if self.asset_pattern.is_none()
            && let Some(primary) = version.files.iter().find(|f| f.primary)
        {
            return Ok(primary.clone());
        }

        let assets: Vec<ReleaseAsset> =
            version.files.iter().map(|f| ReleaseAsset::new(&f.filename, &f.url)).collect();
        let chosen = AssetDisambiguator {
            source_name: ctx.source_name,
            release_tag: &version.version_number,
            version: &version.version_number,
            build,
        }
        .choose(&assets, self.asset_pattern.as_ref())?;

        by_name(&chosen.name).cloned().ok_or_else(|| {
            UpdaterError::no_candidate(ctx.source_name, format!("file '{}' disappeared from the listing", chosen.name))
        })
    }
}

#[async_trait]
impl VersionSource for ModrinthSource {
    fn provider(&self) -> &'static str {
        "modrinth"
    }

    fn describe(&self) -> String {
        format!("modrinth:{}", self.project)
    }

    async fn load_latest_build_info(&self, ctx: &ResolveContext<'_>) -> Result<LatestBuild, UpdaterError> {
        let url = api_url(&self.base_url, &["project", &self.project, "version"], &[])?;
        let versions: Vec<ProjectVersion> = fetch_json(self.transport.as_ref(), &url).await?;
        let targets = TargetVersions::from_preferences(self.game_versions.clone(), ctx.host_version);

        let total = versions.len();
        let mut best = BestCandidate::new();
        for version in versions {
            if !self.stability_matches(&version) || !self.loader_matches(&version) {
                continue;
            }
            let Some(bucket) = targets.match_bucket(&version.game_versions) else {
                debug!("{} {} targets none of {:?}", self.project, version.version_number, targets);
                continue;
            };
            let key = RankKey {
                bucket,
                published: version.date_published,
                label: version.version_number.clone(),
                id: version.date_published.map_or(0, |d| d.timestamp()),
            };
            best.offer(key, version);
        }

        let Some((_, version)) = best.into_best() else {
            return Err(UpdaterError::no_candidate(
                ctx.source_name,
                format!("none of {total} versions of '{}' match the loader/game-version filters", self.project),
            ));
        };

        // version ids are opaque strings; the publish time is the numeric id
        // that grows with every release of a project
        let published_id = version.date_published.map(|d| d.timestamp());
        if published_id.is_none() {
            warn!("{} {} has no publish date; its build number is a label hash", self.project, version.version_number);
        }
        let build = resolve_build_number(&version.version_number, published_id);
        let file = self.choose_file(ctx, &version, build)?;
        debug!("{} resolved to {} ({})", self.project, version.version_number, version.id);

        let mut latest = LatestBuild::new(version.version_number.clone(), build, file.url.clone());
        latest.is_archive = ReleaseAsset::new(&file.filename, &file.url).is_archive;
        latest.asset_name = Some(file.filename);
        latest.checksum = file.hashes.get("sha512").map(ChecksumValidator::sha512);
        Ok(latest)
    }
}
