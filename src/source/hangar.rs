//! Paginated hosting provider (Hangar-style API).
//!
//! Walks `GET /projects/<owner>/<slug>/versions?limit=&offset=` page by page,
//! keeping a running best, until the server reports no further results or
//! the page limit is reached.

use super::{
    BestCandidate, LatestBuild, ProviderEnv, RankKey, ReleaseAsset, ResolveContext, SourceOptions,
    TargetVersions, VersionSource,
};
use crate::core::UpdaterError;
use crate::download::ChecksumValidator;
use crate::net::{HttpTransport, api_url, fetch_json};
use crate::version::resolve_build_number;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://hangar.papermc.io/api/v1";

#[derive(Debug, Deserialize)]
struct Page {
    pagination: Pagination,
    #[serde(default)]
    result: Vec<HangarVersion>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    count: u64,
    #[serde(default)]
    limit: Option<u64>,
    #[serde(default)]
    offset: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HangarVersion {
    id: i64,
    name: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    visibility: Option<String>,
    #[serde(default)]
    review_state: Option<String>,
    #[serde(default)]
    pinned_status: Option<String>,
    #[serde(default)]
    channel: Option<Channel>,
    #[serde(default)]
    downloads: HashMap<String, PlatformDownload>,
    #[serde(default)]
    platform_dependencies: HashMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    name: String,
    #[serde(default)]
    flags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlatformDownload {
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    external_url: Option<String>,
    #[serde(default)]
    file_info: Option<FileInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileInfo {
    name: String,
    #[serde(default)]
    sha256_hash: Option<String>,
}

/// Hangar-style version source.
pub struct HangarSource {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    owner: String,
    slug: String,
    platform: String,
    channel: Option<String>,
    game_versions: Vec<String>,
    allow_unstable: bool,
    require_reviewed: bool,
    max_pages: u32,
    page_size: u32,
}

impl fmt::Debug for HangarSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HangarSource")
            .field("owner", &self.owner)
            .field("slug", &self.slug)
            .field("platform", &self.platform)
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

impl HangarSource {
    /// Build from options: `project` as `owner/slug` (or separate `owner`
    /// and `slug`), `platform` (default `PAPER`), `channel`,
    /// `game_versions`, `allow_unstable`, `require_reviewed`, `max_pages`,
    /// `page_size`, `base_url`.
    ///
    /// # Errors
    ///
    /// [`UpdaterError::Configuration`] when the project cannot be determined.
    pub fn from_options(env: &ProviderEnv, options: &SourceOptions) -> Result<Self, UpdaterError> {
        let (owner, slug) = match options.str("project") {
            Some(project) => match project.split_once('/') {
                Some((owner, slug)) if !owner.is_empty() && !slug.is_empty() => {
                    (owner.to_string(), slug.to_string())
                }
                _ => (options.required_str("owner")?, project),
            },
            None => (options.required_str("owner")?, options.required_str("slug")?),
        };

        Ok(Self {
            transport: Arc::clone(&env.transport),
            base_url: options.str("base_url").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            owner,
            slug,
            platform: options.str("platform").unwrap_or_else(|| "PAPER".to_string()).to_ascii_uppercase(),
            channel: options.str("channel"),
            game_versions: options.list("game_versions"),
            allow_unstable: options.bool("allow_unstable").unwrap_or(!env.ignore_unstable),
            require_reviewed: options.bool("require_reviewed").unwrap_or(false),
            max_pages: options.u32("max_pages")?.unwrap_or(env.max_pages),
            page_size: options.u32("page_size")?.unwrap_or(env.page_size),
        })
    }

    fn eligible(&self, version: &HangarVersion) -> bool {
        if version.visibility.as_deref().is_some_and(|v| !v.eq_ignore_ascii_case("public")) {
            return false;
        }
        if self.require_reviewed
            && !matches!(
                version.review_state.as_deref().map(str::to_ascii_lowercase).as_deref(),
                Some("reviewed" | "partially_reviewed")
            )
        {
            return false;
        }
        if let Some(channel) = &version.channel {
            if self.channel.as_ref().is_some_and(|wanted| !wanted.eq_ignore_ascii_case(&channel.name)) {
                return false;
            }
            if !self.allow_unstable && channel.flags.iter().any(|f| f.eq_ignore_ascii_case("UNSTABLE")) {
                return false;
            }
        } else if self.channel.is_some() {
            return false;
        }
        version.downloads.contains_key(&self.platform)
    }

    /// Bucket 0 for pinned versions, then 1 + target-version bucket.
    fn bucket(&self, version: &HangarVersion, targets: &TargetVersions) -> Option<u8> {
        let supported = version.platform_dependencies.get(&self.platform).map(Vec::as_slice).unwrap_or(&[]);
        let target = targets.match_bucket(supported)?;
        let pinned = version.pinned_status.as_deref().is_some_and(|s| !s.eq_ignore_ascii_case("NONE"));
        Some(if pinned { 0 } else { 1 + target })
    }
}

#[async_trait]
impl VersionSource for HangarSource {
    fn provider(&self) -> &'static str {
        "hangar"
    }

    fn describe(&self) -> String {
        format!("hangar:{}/{}", self.owner, self.slug)
    }

    async fn load_latest_build_info(&self, ctx: &ResolveContext<'_>) -> Result<LatestBuild, UpdaterError> {
        let targets = TargetVersions::from_preferences(self.game_versions.clone(), ctx.host_version);
        let limit = u64::from(self.page_size);
        let mut best = BestCandidate::new();
        let mut scanned = 0usize;

        for page_index in 0..u64::from(self.max_pages) {
            let offset = page_index * limit;
            let url = api_url(
                &self.base_url,
                &["projects", &self.owner, &self.slug, "versions"],
                &[("limit", limit.to_string()), ("offset", offset.to_string())],
            )?;
            let page: Page = fetch_json(self.transport.as_ref(), &url).await?;
            if page.result.is_empty() {
                break;
            }
            scanned += page.result.len();

            for version in page.result {
                if !self.eligible(&version) {
                    continue;
                }
                let Some(bucket) = self.bucket(&version, &targets) else {
                    continue;
                };
                let key = RankKey {
                    bucket,
                    published: version.created_at,
                    label: version.name.clone(),
                    id: version.id,
                };
                best.offer(key, version);
            }

            let served_offset = page.pagination.offset.unwrap_or(offset);
            let served_limit = page.pagination.limit.unwrap_or(limit);
            if served_offset + served_limit >= page.pagination.count {
                break;
            }
        }

        let Some((_, version)) = best.into_best() else {
            return Err(UpdaterError::no_candidate(
                ctx.source_name,
                format!("none of {scanned} scanned versions of {}/{} is eligible", self.owner, self.slug),
            ));
        };

        let download = version.downloads.get(&self.platform).cloned().ok_or_else(|| {
            UpdaterError::no_candidate(ctx.source_name, format!("no {} download", self.platform))
        })?;
        let build = resolve_build_number(&version.name, Some(version.id));
        debug!("{}/{} resolved to {} (build {})", self.owner, self.slug, version.name, build);

        let url = download.download_url.clone().or(download.external_url.clone());
        let mut latest = LatestBuild {
            version: version.name,
            build,
            download_url: url,
            asset_name: None,
            is_archive: false,
            checksum: None,
        };
        if let Some(info) = download.file_info {
            latest.is_archive = ReleaseAsset::new(&info.name, "").is_archive;
            latest.checksum = info.sha256_hash.as_deref().map(ChecksumValidator::sha256);
            latest.asset_name = Some(info.name);
        }
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeTransport;

    const BASE: &str = "https://hangar.test/api/v1";

    fn page_url(offset: u32) -> String {
        format!("{BASE}/projects/Owner/Plugin/versions?limit=2&offset={offset}")
    }

    fn version(id: i64, name: &str, created: &str) -> String {
        version_with(id, name, created, "NONE", "public", r#"{"name":"Release","flags":[]}"#)
    }

    fn version_with(id: i64, name: &str, created: &str, pinned: &str, visibility: &str, channel: &str) -> String {
        format!(
            r#"{{"id":{id},"name":"{name}","createdAt":"{created}","visibility":"{visibility}",
               "reviewState":"reviewed","pinnedStatus":"{pinned}","channel":{channel},
               "downloads":{{"PAPER":{{"downloadUrl":"https://hangar.test/dl/{name}.jar",
                  "fileInfo":{{"name":"Plugin-{name}.jar","sha256Hash":null}}}}}},
               "platformDependencies":{{"PAPER":["1.20.1"]}}}}"#
        )
    }

    fn page(count: u64, offset: u64, items: &[String]) -> String {
        format!(
            r#"{{"pagination":{{"count":{count},"limit":2,"offset":{offset}}},"result":[{}]}}"#,
            items.join(",")
        )
    }

    fn source(transport: FakeTransport, extra: &[(&str, toml::Value)]) -> HangarSource {
        let mut table = toml::Table::new();
        table.insert("project".into(), "Owner/Plugin".into());
        table.insert("base_url".into(), BASE.into());
        table.insert("page_size".into(), toml::Value::Integer(2));
        for (k, v) in extra {
            table.insert((*k).into(), v.clone());
        }
        let env = ProviderEnv::new(Arc::new(transport), true);
        HangarSource::from_options(&env, &SourceOptions::new("plugin", table)).unwrap()
    }

    #[tokio::test]
    async fn test_walks_pages_until_count_reached() {
        let transport = FakeTransport::new()
            .with_json(
                &page_url(0),
                &page(
                    3,
                    0,
                    &[
                        version(10, "2.0.0", "2023-09-01T00:00:00Z"),
                        version(11, "2.1.0", "2023-09-05T00:00:00Z"),
                    ],
                ),
            )
            .with_json(&page_url(2), &page(3, 2, &[version(12, "2.2.0", "2023-09-09T00:00:00Z")]));
        let transport = Arc::new(transport);
        let env = ProviderEnv::new(transport.clone(), true);
        let mut table = toml::Table::new();
        table.insert("project".into(), "Owner/Plugin".into());
        table.insert("base_url".into(), BASE.into());
        table.insert("page_size".into(), toml::Value::Integer(2));
        let source = HangarSource::from_options(&env, &SourceOptions::new("plugin", table)).unwrap();

        let latest = source.load_latest_build_info(&ResolveContext::default()).await.unwrap();
        assert_eq!(latest.version, "2.2.0");
        assert_eq!(latest.build, 12);
        assert_eq!(latest.asset_name.as_deref(), Some("Plugin-2.2.0.jar"));
        assert_eq!(transport.requests(), vec![page_url(0), page_url(2)]);
    }

    #[tokio::test]
    async fn test_pinned_version_wins() {
        let pinned = version_with(
            10,
            "1.9.0",
            "2023-01-01T00:00:00Z",
            "VERSION",
            "public",
            r#"{"name":"Release","flags":[]}"#,
        );
        let items = [pinned, version(11, "2.0.0", "2023-09-05T00:00:00Z")];
        let transport = FakeTransport::new().with_json(&page_url(0), &page(2, 0, &items));
        let latest = source(transport, &[]).load_latest_build_info(&ResolveContext::default()).await.unwrap();
        assert_eq!(latest.version, "1.9.0");
    }

    #[tokio::test]
    async fn test_unstable_and_hidden_versions_are_skipped() {
        let unstable = version_with(
            11,
            "2.1.0-SNAPSHOT",
            "2023-09-05T00:00:00Z",
            "NONE",
            "public",
            r#"{"name":"Snapshot","flags":["UNSTABLE"]}"#,
        );
        let hidden = version_with(
            12,
            "2.2.0",
            "2023-09-06T00:00:00Z",
            "NONE",
            "softDelete",
            r#"{"name":"Release","flags":[]}"#,
        );
        let items = [version(10, "2.0.0", "2023-09-01T00:00:00Z"), unstable];
        let transport = FakeTransport::new()
            .with_json(&page_url(0), &page(3, 0, &items))
            .with_json(&page_url(2), &page(3, 2, &[hidden]));
        let latest = source(transport, &[]).load_latest_build_info(&ResolveContext::default()).await.unwrap();
        assert_eq!(latest.version, "2.0.0");
    }

    #[tokio::test]
    async fn test_empty_page_stops_and_reports_no_candidate() {
        let transport = FakeTransport::new().with_json(&page_url(0), &page(0, 0, &[]));
        let err = source(transport, &[]).load_latest_build_info(&ResolveContext::default()).await.unwrap_err();
        assert!(matches!(err, UpdaterError::NoEligibleCandidate { .. }));
    }

    #[tokio::test]
    async fn test_incompatible_game_version_is_excluded() {
        let items = [version(10, "2.0.0", "2023-09-01T00:00:00Z")];
        let transport = FakeTransport::new().with_json(&page_url(0), &page(1, 0, &items));
        let list = toml::Value::Array(vec!["1.19.4".into()]);
        let err = source(transport, &[("game_versions", list)])
            .load_latest_build_info(&ResolveContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, UpdaterError::NoEligibleCandidate { .. }));
    }

    #[test]
    fn test_project_option_forms() {
        let env = ProviderEnv::new(Arc::new(FakeTransport::new()), true);
        let mut table = toml::Table::new();
        table.insert("owner".into(), "A".into());
        table.insert("slug".into(), "B".into());
        let source = HangarSource::from_options(&env, &SourceOptions::new("x", table)).unwrap();
        assert_eq!(source.describe(), "hangar:A/B");

        let missing = HangarSource::from_options(&env, &SourceOptions::new("x", toml::Table::new()));
        assert!(matches!(missing, Err(UpdaterError::Configuration { .. })));
    }
}
