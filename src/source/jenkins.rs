//! CI job provider (Jenkins JSON API).
//!
//! Nested job paths `folder/job` map to `/job/folder/job/job`. The selected
//! build (`lastSuccessfulBuild` unless configured) must expose exactly one
//! matching artifact: with several artifacts and no `artifact` or
//! `artifact_pattern` option the source is misconfigured, and guessing would
//! risk installing the wrong file.

use super::{LatestBuild, ProviderEnv, ReleaseAsset, ResolveContext, SourceOptions, VersionSource};
use crate::core::UpdaterError;
use crate::net::{HttpTransport, api_url, fetch_json};
use crate::version::resolve_build_number;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// Fields requested from the build API.
pub const TREE: &str = "number,result,timestamp,url,artifacts[fileName,relativePath]";

#[derive(Debug, Deserialize)]
struct Build {
    number: i64,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    artifacts: Vec<Artifact>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Artifact {
    file_name: String,
    relative_path: String,
}

/// Jenkins job version source.
pub struct JenkinsSource {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    job_path: Vec<String>,
    selector: String,
    artifact: Option<String>,
    artifact_pattern: Option<Regex>,
    ignore_unstable: bool,
}

impl fmt::Debug for JenkinsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JenkinsSource")
            .field("base_url", &self.base_url)
            .field("job_path", &self.job_path)
            .field("selector", &self.selector)
            .field("artifact", &self.artifact)
            .finish_non_exhaustive()
    }
}

impl JenkinsSource {
    /// Build from options: `base_url` and `job` (required), `selector`,
    /// `artifact`, `artifact_pattern`.
    ///
    /// # Errors
    ///
    /// [`UpdaterError::Configuration`] for missing options or an invalid
    /// pattern.
    pub fn from_options(env: &ProviderEnv, options: &SourceOptions) -> Result<Self, UpdaterError> {
        let job = options.required_str("job")?;
        let Some(job_path) = parse_job_path(&job) else {
            return Err(UpdaterError::config(options.source_name(), format!("invalid job path '{job}'")));
        };

        Ok(Self {
            transport: Arc::clone(&env.transport),
            base_url: options.required_str("base_url")?,
            job_path,
            selector: options.str("selector").unwrap_or_else(|| "lastSuccessfulBuild".to_string()),
            artifact: options.str("artifact"),
            artifact_pattern: options.regex("artifact_pattern")?,
            ignore_unstable: env.ignore_unstable,
        })
    }

    fn job_segments(&self) -> Vec<&str> {
        self.job_path.iter().flat_map(|name| ["job", name.as_str()]).collect()
    }

    fn pick_artifact<'b>(&self, ctx: &ResolveContext<'_>, build: &'b Build) -> Result<&'b Artifact, UpdaterError> {
        let matching: Vec<&Artifact> = build
            .artifacts
            .iter()
            .filter(|a| match (&self.artifact, &self.artifact_pattern) {
                (Some(name), _) => &a.file_name == name,
                (None, Some(pattern)) => pattern.is_match(&a.file_name),
                (None, None) => true,
            })
            .collect();

        match matching.as_slice() {
            [only] => Ok(*only),
            [] => Err(UpdaterError::no_candidate(
                ctx.source_name,
                format!("build #{} has no matching artifact", build.number),
            )),
            many if self.artifact.is_none() && self.artifact_pattern.is_none() => Err(UpdaterError::config(
                ctx.source_name,
                format!(
                    "build #{} has multiple artifacts ({}); set 'artifact' or 'artifact_pattern'",
                    build.number,
                    many.iter().map(|a| a.file_name.as_str()).collect::<Vec<_>>().join(", ")
                ),
            )),
            many => Ok(many[0]),
        }
    }
}

#[async_trait]
impl VersionSource for JenkinsSource {
    fn provider(&self) -> &'static str {
        "jenkins"
    }

    fn describe(&self) -> String {
        format!("jenkins:{}", self.job_path.join("/"))
    }

    async fn load_latest_build_info(&self, ctx: &ResolveContext<'_>) -> Result<LatestBuild, UpdaterError> {
        let mut segments = self.job_segments();
        segments.extend([self.selector.as_str(), "api", "json"]);
        let url = api_url(&self.base_url, &segments, &[("tree", TREE.to_string())])?;
        let build: Build = fetch_json(self.transport.as_ref(), &url).await?;

        if self.ignore_unstable
            && let Some(result) = build.result.as_deref()
            && !result.eq_ignore_ascii_case("SUCCESS")
        {
            return Err(UpdaterError::no_candidate(
                ctx.source_name,
                format!("build #{} finished as {result}", build.number),
            ));
        }

        let artifact = self.pick_artifact(ctx, &build)?;
        let build_url = match &build.url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let number = build.number.to_string();
                let mut path = self.job_segments();
                path.push(&number);
                api_url(&self.base_url, &path, &[])?
            }
        };
        let download_url = format!("{build_url}/artifact/{}", artifact.relative_path.trim_start_matches('/'));

        let stem = artifact
            .file_name
            .rsplit_once('.')
            .map_or(artifact.file_name.as_str(), |(stem, _)| stem);
        let version = format!("{stem}-b{}", build.number);
        let number = resolve_build_number(&version, Some(build.number));
        let mut latest = LatestBuild::new(version, number, download_url);
        latest.is_archive = ReleaseAsset::new(&artifact.file_name, "").is_archive;
        latest.asset_name = Some(artifact.file_name.clone());
        Ok(latest)
    }
}

/// Folder and job names of `job`.
///
/// Accepts plain names (`Group/Project`) or the URL form
/// (`job/Group/job/Project`). In the URL form `job` is a separator only at
/// even positions, so a folder that is itself named `job` survives.
fn parse_job_path(job: &str) -> Option<Vec<String>> {
    let segments: Vec<&str> = job.split('/').map(str::trim).filter(|s| !s.is_empty()).collect();
    let names: Vec<String> = if segments.first() == Some(&"job") {
        if segments.len() % 2 != 0 {
            return None;
        }
        let mut names = Vec::with_capacity(segments.len() / 2);
        for pair in segments.chunks(2) {
            if pair[0] != "job" {
                return None;
            }
            names.push(pair[1].to_string());
        }
        names
    } else {
        segments.iter().map(ToString::to_string).collect()
    };
    (!names.is_empty()).then_some(names)
}
