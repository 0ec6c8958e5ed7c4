//! Release-tag provider (GitHub releases API).

use super::{
    AssetDisambiguator, BestCandidate, LatestBuild, ProviderEnv, RankKey, ReleaseAsset, ResolveContext,
    SourceOptions, VersionSource,
};
use crate::core::UpdaterError;
use crate::net::{HttpTransport, api_url, fetch_json};
use crate::version::resolve_build_number;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// Largest `per_page` the releases API honours; larger values are capped
/// server-side.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
struct Release {
    id: i64,
    tag_name: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    assets: Vec<Asset>,
}

#[derive(Debug, Deserialize)]
struct Asset {
    name: String,
    browser_download_url: String,
}

/// GitHub releases version source.
pub struct GithubSource {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    owner: String,
    repo: String,
    allow_prerelease: bool,
    asset_pattern: Option<Regex>,
    max_pages: u32,
    page_size: u32,
}

impl fmt::Debug for GithubSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubSource")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("allow_prerelease", &self.allow_prerelease)
            .field("asset_pattern", &self.asset_pattern.as_ref().map(Regex::as_str))
            .finish_non_exhaustive()
    }
}

impl GithubSource {
    /// Build from options: `repository` as `owner/repo` (or `owner` and
    /// `repo`), `allow_prerelease`, `asset_pattern`, `max_pages`,
    /// `page_size`, `base_url`.
    ///
    /// # Errors
    ///
    /// [`UpdaterError::Configuration`] when the repository is missing or
    /// `asset_pattern` is invalid.
    pub fn from_options(env: &ProviderEnv, options: &SourceOptions) -> Result<Self, UpdaterError> {
        let (owner, repo) = match options.str("repository").and_then(|r| {
            r.split_once('/').map(|(o, n)| (o.trim().to_string(), n.trim().trim_end_matches(".git").to_string()))
        }) {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() => (owner, repo),
            _ => (options.required_str("owner")?, options.required_str("repo")?),
        };

        Ok(Self {
            transport: Arc::clone(&env.transport),
            base_url: options.str("base_url").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            owner,
            repo,
            allow_prerelease: options.bool("allow_prerelease").unwrap_or(!env.ignore_unstable),
            asset_pattern: options.regex("asset_pattern")?,
            max_pages: options.u32("max_pages")?.unwrap_or(env.max_pages),
            page_size: options.u32("page_size")?.unwrap_or(env.page_size).clamp(1, MAX_PAGE_SIZE),
        })
    }
}

#[async_trait]
impl VersionSource for GithubSource {
    fn provider(&self) -> &'static str {
        "github"
    }

    fn describe(&self) -> String {
        format!("github:{}/{}", self.owner, self.repo)
    }

    async fn load_latest_build_info(&self, ctx: &ResolveContext<'_>) -> Result<LatestBuild, UpdaterError> {
        let mut best = BestCandidate::new();

        for page in 1..=self.max_pages {
            let url = api_url(
                &self.base_url,
                &["repos", &self.owner, &self.repo, "releases"],
                &[("per_page", self.page_size.to_string()), ("page", page.to_string())],
            )?;
            let releases: Vec<Release> = fetch_json(self.transport.as_ref(), &url).await?;
            let fetched = releases.len();

            for release in releases {
                if release.draft || (release.prerelease && !self.allow_prerelease) {
                    debug!("Skipping {} release {}", self.repo, release.tag_name);
                    continue;
                }
                let key = RankKey {
                    bucket: 0,
                    published: release.published_at,
                    label: release.tag_name.clone(),
                    id: release.id,
                };
                best.offer(key, release);
            }

            if fetched < self.page_size as usize {
                break;
            }
        }

        let Some((_, release)) = best.into_best() else {
            return Err(UpdaterError::no_candidate(
                ctx.source_name,
                format!("{}/{} has no published release", self.owner, self.repo),
            ));
        };

        let build = resolve_build_number(&release.tag_name, Some(release.id));
        let assets: Vec<ReleaseAsset> = release
            .assets
            .iter()
            .map(|a| ReleaseAsset::new(&a.name, &a.browser_download_url))
            .collect();
        let asset = AssetDisambiguator {
            source_name: ctx.source_name,
            release_tag: &release.tag_name,
            version: &release.tag_name,
            build,
        }
        .choose(&assets, self.asset_pattern.as_ref())?;

        let mut latest = LatestBuild::new(release.tag_name, build, asset.download_url);
        latest.is_archive = asset.is_archive;
        latest.asset_name = Some(asset.name);
        Ok(latest)
    }
}
