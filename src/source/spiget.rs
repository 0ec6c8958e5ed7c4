//! Plugin marketplace provider (Spiget API over SpigotMC resources).

use super::{LatestBuild, ProviderEnv, ResolveContext, SourceOptions, TargetVersions, VersionSource};
use crate::core::UpdaterError;
use crate::net::{HttpTransport, api_url, fetch_json};
use crate::version::resolve_build_number;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.spiget.org/v2";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Resource {
    #[serde(default)]
    premium: bool,
    #[serde(default)]
    external: bool,
    #[serde(default)]
    file: Option<ResourceFile>,
    #[serde(default)]
    tested_versions: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceFile {
    #[serde(default, rename = "type")]
    file_type: Option<String>,
    #[serde(default)]
    external_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResourceVersion {
    id: i64,
    name: String,
}

/// Spiget resource version source.
pub struct SpigetSource {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    resource: String,
    game_versions: Vec<String>,
}

impl fmt::Debug for SpigetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpigetSource")
            .field("resource", &self.resource)
            .field("game_versions", &self.game_versions)
            .finish_non_exhaustive()
    }
}

impl SpigetSource {
    /// Build from options: `resource` (numeric id, required),
    /// `game_versions`, `base_url`.
    ///
    /// # Errors
    ///
    /// [`UpdaterError::Configuration`] when `resource` is missing or not numeric.
    pub fn from_options(env: &ProviderEnv, options: &SourceOptions) -> Result<Self, UpdaterError> {
        let resource = options.required_str("resource")?;
        if !resource.chars().all(|c| c.is_ascii_digit()) {
            return Err(UpdaterError::config(
                options.source_name(),
                format!("resource id '{resource}' must be numeric"),
            ));
        }
        Ok(Self {
            transport: Arc::clone(&env.transport),
            base_url: options.str("base_url").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            resource,
            game_versions: options.list("game_versions"),
        })
    }
}

#[async_trait]
impl VersionSource for SpigetSource {
    fn provider(&self) -> &'static str {
        "spiget"
    }

    fn describe(&self) -> String {
        format!("spiget:{}", self.resource)
    }

    async fn load_latest_build_info(&self, ctx: &ResolveContext<'_>) -> Result<LatestBuild, UpdaterError> {
        let url = api_url(&self.base_url, &["resources", &self.resource], &[])?;
        let resource: Resource = fetch_json(self.transport.as_ref(), &url).await?;

        if resource.premium {
            return Err(UpdaterError::no_candidate(ctx.source_name, "premium resources cannot be downloaded"));
        }
        let targets = TargetVersions::from_preferences(self.game_versions.clone(), None);
        if targets.match_bucket(&resource.tested_versions).is_none() {
            return Err(UpdaterError::no_candidate(
                ctx.source_name,
                format!("resource is tested on {:?} only", resource.tested_versions),
            ));
        }

        let url = api_url(&self.base_url, &["resources", &self.resource, "versions", "latest"], &[])?;
        let version: ResourceVersion = fetch_json(self.transport.as_ref(), &url).await?;
        let build = resolve_build_number(&version.name, Some(version.id));

        let download_url = if resource.external {
            let external = resource.file.as_ref().and_then(|f| f.external_url.clone());
            match external {
                Some(url) if url.to_ascii_lowercase().ends_with(".jar") => url,
                _ => {
                    return Err(UpdaterError::no_candidate(
                        ctx.source_name,
                        "resource is hosted externally without a direct .jar link",
                    ));
                }
            }
        } else {
            api_url(&self.base_url, &["resources", &self.resource, "download"], &[])?
        };

        let mut latest = LatestBuild::new(version.name, build, download_url);
        latest.is_archive = resource
            .file
            .and_then(|f| f.file_type)
            .is_some_and(|t| t.eq_ignore_ascii_case(".zip"));
        Ok(latest)
    }
}
