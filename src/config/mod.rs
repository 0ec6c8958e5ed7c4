//! Updater configuration.
//!
//! A single TOML file describes the host layout and every update source:
//!
//! ```toml
//! [host]
//! root = "~/server"
//! addon_dir = "~/server/plugins"
//! version = "1.20.4"
//!
//! [updates]
//! ignore_unstable = true
//! interval_secs = 3600
//!
//! [updates.sources.server]
//! type = "paper"
//! target = "HOST_ROOT"
//! filename = "paper.jar"
//!
//! [updates.sources.worldedit]
//! type = "modrinth"
//! linked_component = "WorldEdit"
//!
//! [updates.sources.worldedit.options]
//! project = "worldedit"
//! game_versions = ["1.20.4"]
//! ```
//!
//! # Location
//!
//! 1. `--config <path>`
//! 2. `UPDRAFT_CONFIG`
//! 3. `~/.updraft/config.toml`
//!
//! # Legacy layouts
//!
//! Older files listed sources as `[[updates.sources]]` entries with a `name`
//! key, sometimes with provider keys written directly on the entry. Both are
//! accepted on load; [`UpdaterConfig::migrate_file`] rewrites the file in the
//! section layout.

mod sources;

pub use sources::{ParsedSources, SourceEntry};

use crate::constants::{
    DEFAULT_BACKUP_RETENTION, DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT,
    DEFAULT_USER_AGENT,
};
use crate::net::NetOptions;
use crate::utils::atomic_write;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use toml_edit::{DocumentMut, Item, Table as EditTable, value};
use tracing::{debug, info};

/// Environment variable overriding the configuration path.
pub const CONFIG_ENV: &str = "UPDRAFT_CONFIG";

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Host layout
    #[serde(default)]
    pub host: HostConfig,

    /// Update behaviour and sources
    #[serde(default)]
    pub updates: UpdatesConfig,
}

/// `[host]` section.
///
/// Paths accept `~` and environment variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Host installation root (default: current directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,

    /// Add-on directory (default: `<root>/plugins`)
    #[serde(default, alias = "addonDir", skip_serializing_if = "Option::is_none")]
    pub addon_dir: Option<String>,

    /// Version of the running host, used by target-version filters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Build state file (default: `<root>/.updraft/state.toml`)
    #[serde(default, alias = "stateFile", skip_serializing_if = "Option::is_none")]
    pub state_file: Option<String>,

    /// Backup root (default: `<root>/.updraft/backups`)
    #[serde(default, alias = "backupDir", skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<String>,
}

/// `[updates]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatesConfig {
    /// Skip unstable and pre-release builds unless a source overrides it
    #[serde(default = "default_true", alias = "ignoreUnstable")]
    pub ignore_unstable: bool,

    /// Seconds between scheduler cycles
    #[serde(default = "default_interval", alias = "intervalSecs")]
    pub interval_secs: u64,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout", alias = "connectTimeoutSecs")]
    pub connect_timeout_secs: u64,

    /// Per-chunk read timeout in seconds
    #[serde(default = "default_read_timeout", alias = "readTimeoutSecs")]
    pub read_timeout_secs: u64,

    /// Backups kept per source; 0 disables backups
    #[serde(default = "default_retention", alias = "backupRetention")]
    pub backup_retention: usize,

    /// `User-Agent` override
    #[serde(default, alias = "userAgent", skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Configured sources
    #[serde(default)]
    pub sources: ParsedSources,
}

fn default_true() -> bool {
    true
}

fn default_interval() -> u64 {
    DEFAULT_CHECK_INTERVAL_SECS
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT.as_secs()
}

fn default_read_timeout() -> u64 {
    DEFAULT_READ_TIMEOUT.as_secs()
}

fn default_retention() -> usize {
    DEFAULT_BACKUP_RETENTION
}

impl Default for UpdatesConfig {
    fn default() -> Self {
        Self {
            ignore_unstable: true,
            interval_secs: default_interval(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            backup_retention: default_retention(),
            user_agent: None,
            sources: ParsedSources::default(),
        }
    }
}

impl UpdatesConfig {
    /// Interval between scheduler cycles.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    /// Reject timeouts that would fail every request.
    fn validate(&self) -> Result<()> {
        for (key, secs) in [
            ("connect_timeout_secs", self.connect_timeout_secs),
            ("read_timeout_secs", self.read_timeout_secs),
        ] {
            if secs == 0 {
                anyhow::bail!("updates.{key} must be at least 1 second");
            }
        }
        Ok(())
    }

    /// Connection settings for the HTTP transport.
    pub fn net_options(&self) -> NetOptions {
        NetOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            user_agent: self.user_agent.clone().unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        }
    }
}

impl HostConfig {
    /// Host installation root.
    ///
    /// # Errors
    ///
    /// Fails when the configured path references an undefined variable.
    pub fn root_path(&self) -> Result<PathBuf> {
        match &self.root {
            Some(root) => expand_path(root),
            None => Ok(PathBuf::from(".")),
        }
    }

    /// Add-on directory.
    ///
    /// # Errors
    ///
    /// See [`root_path`](Self::root_path).
    pub fn addon_path(&self) -> Result<PathBuf> {
        self.path_or(&self.addon_dir, &["plugins"])
    }

    /// Build state file.
    ///
    /// # Errors
    ///
    /// See [`root_path`](Self::root_path).
    pub fn state_path(&self) -> Result<PathBuf> {
        self.path_or(&self.state_file, &[".updraft", "state.toml"])
    }

    /// Backup root directory.
    ///
    /// # Errors
    ///
    /// See [`root_path`](Self::root_path).
    pub fn backup_path(&self) -> Result<PathBuf> {
        self.path_or(&self.backup_dir, &[".updraft", "backups"])
    }

    fn path_or(&self, configured: &Option<String>, default: &[&str]) -> Result<PathBuf> {
        match configured {
            Some(path) => expand_path(path),
            None => Ok(default.iter().fold(self.root_path()?, |path, part| path.join(part))),
        }
    }
}

/// Expand `~` and `$VAR` in a configured path.
fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw).with_context(|| format!("Failed to expand path '{raw}'"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

impl UpdaterConfig {
    /// Default configuration path: `~/.updraft/config.toml`.
    ///
    /// # Errors
    ///
    /// Fails when the home directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
            .join(".updraft")
            .join("config.toml"))
    }

    /// Resolve the configuration path: explicit, then `UPDRAFT_CONFIG`, then
    /// the default location.
    ///
    /// # Errors
    ///
    /// See [`default_path`](Self::default_path).
    pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        if let Ok(path) = std::env::var(CONFIG_ENV)
            && !path.trim().is_empty()
        {
            return expand_path(&path);
        }
        Self::default_path()
    }

    /// Load from `path`; a missing file yields the default configuration.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or is not valid configuration TOML.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No configuration at {}; using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read config from {}", path.display()));
            }
        };
        Self::parse(&content).with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Parse configuration text.
    ///
    /// # Errors
    ///
    /// Fails on invalid TOML, an unrecognised sources layout or a zero
    /// timeout.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.updates.validate()?;
        Ok(config)
    }

    /// Whether anything in this configuration uses a legacy layout.
    pub fn is_legacy(&self) -> bool {
        self.updates.sources.from_list || self.updates.sources.entries.values().any(|e| !e.legacy.is_empty())
    }

    /// Convert legacy layouts in memory. Returns whether anything changed.
    pub fn migrate(&mut self) -> bool {
        let mut changed = std::mem::take(&mut self.updates.sources.from_list);
        for entry in self.updates.sources.entries.values_mut() {
            changed |= entry.fold_legacy();
        }
        changed
    }

    /// Write the configuration atomically in the section layout.
    ///
    /// # Errors
    ///
    /// Fails on serialization or I/O errors.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || atomic_write(&path, content.as_bytes()))
            .await
            .context("Config writer task panicked")?
    }

    /// Rewrite the file at `path` in the current layout if it uses a legacy
    /// one. Returns whether the file was rewritten.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read, parsed or written.
    pub async fn migrate_file(path: &Path) -> Result<bool> {
        let mut config = Self::load_from(path).await?;
        if !config.migrate() {
            return Ok(false);
        }
        info!("Migrating legacy configuration {}", path.display());
        config.save_to(path).await?;
        Ok(true)
    }
}

/// Set `updates.sources.<source>.options.<key> = value` in place,
/// preserving the rest of the file's formatting.
///
/// A legacy list layout is migrated first.
///
/// # Errors
///
/// Fails when the file cannot be read or written, or when the source does
/// not exist.
pub async fn set_source_option(path: &Path, source: &str, key: &str, option: &str) -> Result<()> {
    UpdaterConfig::migrate_file(path).await?;

    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let mut doc: DocumentMut =
        content.parse().with_context(|| format!("Failed to parse config from {}", path.display()))?;

    let entry = doc
        .get_mut("updates")
        .and_then(|u| u.get_mut("sources"))
        .and_then(|s| s.get_mut(source))
        .and_then(Item::as_table_like_mut)
        .ok_or_else(|| anyhow::anyhow!("Source '{source}' is not configured in {}", path.display()))?;

    if entry.get("options").is_none() {
        let mut options = EditTable::new();
        options.set_implicit(false);
        entry.insert("options", Item::Table(options));
    }
    let options = entry
        .get_mut("options")
        .and_then(Item::as_table_like_mut)
        .ok_or_else(|| anyhow::anyhow!("'options' of source '{source}' is not a table"))?;
    options.insert(key, value(option));

    let rendered = doc.to_string();
    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || atomic_write(&target, rendered.as_bytes()))
        .await
        .context("Config writer task panicked")??;
    debug!("Set {}.{} in {}", source, key, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TargetDirectory;
    use serial_test::serial;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"# managed by hand
[host]
root = "/srv/mc"
version = "1.20.4"

[updates]
ignore_unstable = false
interval_secs = 600

[updates.sources.server]
type = "paper"
target = "HOST_ROOT"
filename = "paper.jar"

[updates.sources.geyser]
type = "github"

[updates.sources.geyser.options]
repository = "GeyserMC/Geyser"
"#;

    #[test]
    fn test_zero_timeouts_rejected() {
        let err = UpdaterConfig::parse("[updates]\nread_timeout_secs = 0\n").unwrap_err();
        assert!(err.to_string().contains("read_timeout_secs"), "{err}");
        assert!(UpdaterConfig::parse("[updates]\nconnectTimeoutSecs = 0\n").is_err());
        assert!(UpdaterConfig::parse("[updates]\nread_timeout_secs = 1\n").is_ok());
    }

    #[test]
    fn test_parse_sections_and_defaults() {
        let config = UpdaterConfig::parse(SAMPLE).unwrap();
        assert!(!config.updates.ignore_unstable);
        assert_eq!(config.updates.interval(), Duration::from_secs(600));
        assert_eq!(config.updates.read_timeout_secs, 10);
        assert_eq!(config.updates.backup_retention, 3);
        assert_eq!(config.updates.sources.entries.len(), 2);
        assert_eq!(config.updates.sources.entries["server"].target, TargetDirectory::HostRoot);
        assert!(!config.is_legacy());

        assert_eq!(config.host.addon_path().unwrap(), PathBuf::from("/srv/mc/plugins"));
        assert_eq!(config.host.state_path().unwrap(), PathBuf::from("/srv/mc/.updraft/state.toml"));
    }

    #[test]
    fn test_empty_config_defaults() {
        let config = UpdaterConfig::parse("").unwrap();
        assert!(config.updates.ignore_unstable);
        assert!(config.updates.sources.entries.is_empty());
        assert_eq!(config.host.root_path().unwrap(), PathBuf::from("."));
    }

    #[tokio::test]
    async fn test_migrate_file_rewrites_legacy_list() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        tokio::fs::write(
            &path,
            r#"
[updates]
ignoreUnstable = true

[[updates.sources]]
name = "luckperms"
type = "github"
url = "https://github.com/LuckPerms/LuckPerms"
"#,
        )
        .await
        .unwrap();

        assert!(UpdaterConfig::migrate_file(&path).await.unwrap());
        let reloaded = UpdaterConfig::load_from(&path).await.unwrap();
        assert!(!reloaded.is_legacy());
        let entry = &reloaded.updates.sources.entries["luckperms"];
        assert_eq!(
            entry.options["url"].as_str(),
            Some("https://github.com/LuckPerms/LuckPerms")
        );
        assert!(!UpdaterConfig::migrate_file(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_source_option_preserves_formatting() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        tokio::fs::write(&path, SAMPLE).await.unwrap();

        set_source_option(&path, "geyser", "asset_pattern", r"^Geyser-\d+\.jar$").await.unwrap();
        set_source_option(&path, "server", "version", "1.20.4").await.unwrap();

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(text.starts_with("# managed by hand"));
        let config = UpdaterConfig::parse(&text).unwrap();
        assert_eq!(
            config.updates.sources.entries["geyser"].options["asset_pattern"].as_str(),
            Some(r"^Geyser-\d+\.jar$")
        );
        assert_eq!(config.updates.sources.entries["server"].options["version"].as_str(), Some("1.20.4"));

        assert!(set_source_option(&path, "missing", "x", "y").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_file_is_default() {
        let temp = TempDir::new().unwrap();
        let config = UpdaterConfig::load_from(&temp.path().join("nope.toml")).await.unwrap();
        assert_eq!(config, UpdaterConfig::default());
    }

    #[test]
    #[serial]
    fn test_resolve_path_precedence() {
        let explicit = PathBuf::from("/tmp/explicit.toml");
        assert_eq!(UpdaterConfig::resolve_path(Some(&explicit)).unwrap(), explicit);

        unsafe { std::env::set_var(CONFIG_ENV, "/tmp/from-env.toml") };
        assert_eq!(UpdaterConfig::resolve_path(None).unwrap(), PathBuf::from("/tmp/from-env.toml"));
        unsafe { std::env::remove_var(CONFIG_ENV) };
    }
}
