//! Version sources: one strategy per release-hosting provider.
//!
//! Every provider answers the same question ("what is the latest eligible
//! build, and where do I download it?") against a different API. They share
//! one selection algorithm:
//!
//! 1. **Filter** candidates by provider eligibility (stability flags, review
//!    state, platform/loader tags, target-version compatibility).
//! 2. **Rank** survivors by priority bucket → publish time → numeric-token
//!    label order → numeric id (see [`ranking`]).
//! 3. **Page** through paginated APIs up to a configured maximum, keeping a
//!    running best and stopping when the server reports no more results.
//! 4. **Resolve the build number** from the label suffix, the provider id, or
//!    a stable hash (see [`crate::version::build`]).
//!
//! Providers that publish several files per release delegate file choice to
//! [`assets::AssetDisambiguator`].

pub mod assets;
pub mod github;
pub mod hangar;
pub mod jenkins;
pub mod modrinth;
pub mod options;
pub mod paper;
pub mod ranking;
pub mod spiget;

pub use assets::{AssetDisambiguator, AssetKind, ReleaseAsset};
pub use options::SourceOptions;
pub use ranking::{BestCandidate, RankKey, TargetVersions};

use crate::constants::{DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE};
use crate::core::UpdaterError;
use crate::download::ChecksumValidator;
use crate::host::HostModules;
use crate::net::HttpTransport;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Result of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestBuild {
    /// Human-readable label of the chosen build
    pub version: String,
    /// Monotonic build number
    pub build: i64,
    /// Where to download it; `None` when the provider knows the build but
    /// cannot offer a file (e.g. an external-only listing)
    pub download_url: Option<String>,
    /// File name of the chosen asset, when known
    pub asset_name: Option<String>,
    /// Whether the download is an archive wrapping the artifact
    pub is_archive: bool,
    /// Digest published by the provider
    pub checksum: Option<ChecksumValidator>,
}

impl LatestBuild {
    /// A build with a download URL and no extra metadata.
    pub fn new(version: impl Into<String>, build: i64, download_url: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            build,
            download_url: Some(download_url.into()),
            asset_name: None,
            is_archive: false,
            checksum: None,
        }
    }
}

/// Per-call inputs a provider may need besides its own options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveContext<'a> {
    /// Name of the source being resolved (for error messages)
    pub source_name: &'a str,
    /// Version of the running host, if known
    pub host_version: Option<&'a str>,
}

/// Shared construction environment handed to every provider factory.
#[derive(Clone)]
pub struct ProviderEnv {
    /// HTTP transport used for API calls
    pub transport: Arc<dyn HttpTransport>,
    /// Whether unstable/pre-release builds are ignored by default
    pub ignore_unstable: bool,
    /// Default maximum number of pages walked by paginated providers
    pub max_pages: u32,
    /// Default page size for paginated providers
    pub page_size: u32,
}

impl ProviderEnv {
    /// Environment with default paging limits.
    pub fn new(transport: Arc<dyn HttpTransport>, ignore_unstable: bool) -> Self {
        Self {
            transport,
            ignore_unstable,
            max_pages: DEFAULT_MAX_PAGES,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl fmt::Debug for ProviderEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderEnv")
            .field("ignore_unstable", &self.ignore_unstable)
            .field("max_pages", &self.max_pages)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

/// Provider strategy resolving the latest eligible build of one artifact.
#[async_trait]
pub trait VersionSource: Send + Sync + fmt::Debug {
    /// Registration key of the provider (`"github"`, `"paper"`, ...).
    fn provider(&self) -> &'static str;

    /// Short human-readable description, e.g. `github:owner/repo`.
    fn describe(&self) -> String;

    /// Resolve the latest eligible build.
    ///
    /// # Errors
    ///
    /// [`UpdaterError::Network`], [`UpdaterError::HttpStatus`],
    /// [`UpdaterError::Parse`], [`UpdaterError::NoEligibleCandidate`],
    /// [`UpdaterError::Configuration`] or, for multi-asset providers,
    /// [`UpdaterError::AssetSelectionRequired`].
    async fn load_latest_build_info(&self, ctx: &ResolveContext<'_>) -> Result<LatestBuild, UpdaterError>;

    /// Version of the currently installed artifact as reported by the host.
    ///
    /// The default looks up the linked host component; providers for the
    /// host itself override this to report the host's own version.
    fn installed_version(&self, host: &dyn HostModules, component: Option<&str>) -> Option<String> {
        component.and_then(|name| host.installed_version(name))
    }
}
