//! Named, ordered collection of update sources built from configuration.
//!
//! The registry turns `[updates.sources.<name>]` entries into
//! [`UpdateSource`]s through the [`providers`] registration table. A bad
//! entry (unknown type, missing option, invalid pattern) is logged and
//! skipped; it never prevents the other sources from loading.
//!
//! The source list is immutable once built. Reconfiguration and dynamic
//! registration publish a fresh list under a short write lock, so a running
//! cycle keeps iterating the snapshot it started with.

pub mod providers;

pub use providers::{ProviderRegistration, builtin_providers};

use crate::config::{SourceEntry, UpdatesConfig};
use crate::core::{TargetDirectory, UpdaterError};
use crate::net::HttpTransport;
use crate::source::{ProviderEnv, SourceOptions, VersionSource};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use strsim::levenshtein;
use tracing::{debug, info, warn};

/// One configured, constructed source.
#[derive(Clone)]
pub struct UpdateSource {
    /// Unique name
    pub name: String,
    /// Provider strategy
    pub source: Arc<dyn VersionSource>,
    /// Directory the artifact is installed into
    pub target: TargetDirectory,
    /// Installed file name
    pub filename: String,
    /// Host component whose version is cross-checked
    pub linked_component: Option<String>,
    /// Entry this source was built from
    pub entry: SourceEntry,
}

impl UpdateSource {
    /// Full destination path for this source's artifact.
    pub fn destination(&self, host_root: &Path, addon_dir: &Path) -> PathBuf {
        self.target.resolve(host_root, addon_dir).join(&self.filename)
    }
}

impl fmt::Debug for UpdateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateSource")
            .field("name", &self.name)
            .field("source", &self.source.describe())
            .field("target", &self.target)
            .field("filename", &self.filename)
            .finish_non_exhaustive()
    }
}

/// Outcome of building the registry from configuration.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegistryReport {
    /// Names of sources that loaded
    pub loaded: Vec<String>,
    /// Names of disabled entries
    pub disabled: Vec<String>,
    /// Skipped entries and why
    pub skipped: Vec<(String, String)>,
}

struct RegistryState {
    env: ProviderEnv,
    sources: Arc<Vec<Arc<UpdateSource>>>,
}

/// Thread-safe registry of update sources.
pub struct SourceRegistry {
    providers: Vec<ProviderRegistration>,
    state: RwLock<RegistryState>,
}

impl fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("providers", &self.providers.iter().map(|p| p.key).collect::<Vec<_>>())
            .field("sources", &self.snapshot().iter().map(|s| s.name.clone()).collect::<Vec<_>>())
            .finish()
    }
}

impl SourceRegistry {
    /// Empty registry with the built-in providers.
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self::with_providers(transport, builtin_providers())
    }

    /// Empty registry with a custom registration table.
    pub fn with_providers(transport: Arc<dyn HttpTransport>, providers: Vec<ProviderRegistration>) -> Self {
        Self {
            providers,
            state: RwLock::new(RegistryState {
                env: ProviderEnv::new(transport, true),
                sources: Arc::new(Vec::new()),
            }),
        }
    }

    /// Registry loaded from `config`.
    pub fn from_config(transport: Arc<dyn HttpTransport>, config: &UpdatesConfig) -> (Self, RegistryReport) {
        let registry = Self::new(transport);
        let report = registry.reload(config);
        (registry, report)
    }

    /// Registered type keys.
    pub fn provider_keys(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.key).collect()
    }

    /// Rebuild the whole source list from `config`.
    pub fn reload(&self, config: &UpdatesConfig) -> RegistryReport {
        let env = {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            let mut env = state.env.clone();
            env.ignore_unstable = config.ignore_unstable;
            env
        };

        let mut report = RegistryReport::default();
        let mut sources = Vec::new();
        for (name, entry) in &config.sources.entries {
            if !entry.enabled {
                debug!("Source '{}' is disabled", name);
                report.disabled.push(name.clone());
                continue;
            }
            match self.build(&env, name, entry) {
                Ok(source) => {
                    debug!("Loaded source '{}' ({})", name, source.source.describe());
                    report.loaded.push(name.clone());
                    sources.push(Arc::new(source));
                }
                Err(e) => {
                    warn!("Skipping source '{}': {}", name, e);
                    report.skipped.push((name.clone(), e.to_string()));
                }
            }
        }

        info!("Loaded {} update source(s), skipped {}", report.loaded.len(), report.skipped.len());
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.env = env;
        state.sources = Arc::new(sources);
        report
    }

    /// Add one source at runtime.
    ///
    /// # Errors
    ///
    /// [`UpdaterError::Configuration`] when the name is taken or the entry
    /// cannot be built.
    pub fn register(&self, name: &str, entry: SourceEntry) -> Result<Arc<UpdateSource>, UpdaterError> {
        let env = self.state.read().unwrap_or_else(PoisonError::into_inner).env.clone();
        if self.get(name).is_some() {
            return Err(UpdaterError::config(name, "a source with this name is already registered"));
        }
        let source = Arc::new(self.build(&env, name, &entry)?);

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.sources.iter().any(|s| s.name == name) {
            return Err(UpdaterError::config(name, "a source with this name is already registered"));
        }
        let mut sources = state.sources.as_ref().clone();
        sources.push(Arc::clone(&source));
        state.sources = Arc::new(sources);
        info!("Registered source '{}' ({})", name, source.source.describe());
        Ok(source)
    }

    /// Current source list.
    pub fn snapshot(&self) -> Arc<Vec<Arc<UpdateSource>>> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner).sources)
    }

    /// Look up a source by name.
    pub fn get(&self, name: &str) -> Option<Arc<UpdateSource>> {
        self.snapshot().iter().find(|s| s.name == name).cloned()
    }

    /// Rebuild source `name` with an asset-selection pattern.
    ///
    /// Returns the rebuilt source and the option key the pattern was stored
    /// under, so the caller can persist it.
    ///
    /// # Errors
    ///
    /// [`UpdaterError::Configuration`] when the source is unknown, its
    /// provider has no asset pattern option, or the rebuilt entry is invalid.
    pub fn apply_asset_pattern(
        &self,
        name: &str,
        pattern: &str,
    ) -> Result<(Arc<UpdateSource>, &'static str), UpdaterError> {
        let current = self
            .get(name)
            .ok_or_else(|| UpdaterError::config(name, "no such source is registered"))?;
        let key = self
            .registration(&current.entry.kind)
            .and_then(|r| r.asset_pattern_key)
            .ok_or_else(|| {
                UpdaterError::config(name, format!("provider '{}' does not support asset patterns", current.entry.kind))
            })?;

        let mut entry = current.entry.clone();
        entry.fold_legacy();
        entry.options.insert(key.to_string(), toml::Value::String(pattern.to_string()));

        let env = self.state.read().unwrap_or_else(PoisonError::into_inner).env.clone();
        let rebuilt = Arc::new(self.build(&env, name, &entry)?);

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let sources = state
            .sources
            .iter()
            .map(|s| if s.name == name { Arc::clone(&rebuilt) } else { Arc::clone(s) })
            .collect();
        state.sources = Arc::new(sources);
        info!("Source '{}' now selects assets matching {}", name, pattern);
        Ok((rebuilt, key))
    }

    fn registration(&self, kind: &str) -> Option<&ProviderRegistration> {
        self.providers.iter().find(|p| p.key.eq_ignore_ascii_case(kind))
    }

    fn build(&self, env: &ProviderEnv, name: &str, entry: &SourceEntry) -> Result<UpdateSource, UpdaterError> {
        let registration = self
            .registration(&entry.kind)
            .ok_or_else(|| UpdaterError::config(name, self.unknown_type_message(&entry.kind)))?;
        let source = construct(registration, env, name, entry)?;
        Ok(UpdateSource {
            name: name.to_string(),
            source,
            target: entry.target,
            filename: entry.filename_for(name),
            linked_component: entry.linked_component.clone(),
            entry: entry.clone(),
        })
    }

    fn unknown_type_message(&self, kind: &str) -> String {
        let lowered = kind.to_ascii_lowercase();
        let suggestion = self
            .providers
            .iter()
            .map(|p| (p.key, levenshtein(&lowered, p.key)))
            .filter(|(_, distance)| *distance <= 2)
            .min_by_key(|(_, distance)| *distance)
            .map(|(key, _)| key);
        match suggestion {
            Some(key) => format!("unknown source type '{kind}' (did you mean '{key}'?)"),
            None => format!("unknown source type '{kind}' (known types: {})", self.provider_keys().join(", ")),
        }
    }
}

fn construct(
    registration: &ProviderRegistration,
    env: &ProviderEnv,
    name: &str,
    entry: &SourceEntry,
) -> Result<Arc<dyn VersionSource>, UpdaterError> {
    if !entry.options.is_empty()
        && let Some(with_options) = registration.with_options
    {
        let mut table = entry.legacy.clone();
        table.extend(entry.options.clone());
        return with_options(env, &SourceOptions::new(name, table));
    }
    if !entry.legacy.is_empty()
        && let Some(with_legacy) = registration.with_legacy
    {
        return with_legacy(env, &SourceOptions::new(name, entry.legacy.clone()));
    }
    if let Some(with_flag) = registration.with_flag {
        return Ok(with_flag(env, env.ignore_unstable));
    }
    if let Some(no_arg) = registration.no_arg {
        return Ok(no_arg(env));
    }
    match registration.with_options.or(registration.with_legacy) {
        Some(constructor) => constructor(env, &SourceOptions::new(name, toml::Table::new())),
        None => Err(UpdaterError::config(
            name,
            format!("provider '{}' has no usable constructor", registration.key),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpdaterConfig;
    use crate::test_utils::FakeTransport;

    fn registry(config: &str) -> (SourceRegistry, RegistryReport) {
        let config = UpdaterConfig::parse(config).unwrap();
        SourceRegistry::from_config(Arc::new(FakeTransport::new()), &config.updates)
    }

    #[test]
    fn test_bad_entries_are_skipped() {
        let (registry, report) = registry(
            r#"
[updates.sources.server]
type = "paper"
target = "HOST_ROOT"
filename = "paper.jar"

[updates.sources.broken]
type = "github"

[updates.sources.typo]
type = "modrinht"

[updates.sources.off]
type = "spiget"
enabled = false

[updates.sources.geyser]
type = "github"
[updates.sources.geyser.options]
repository = "GeyserMC/Geyser"
"#,
        );

        assert_eq!(report.loaded, vec!["geyser", "server"]);
        assert_eq!(report.disabled, vec!["off"]);
        assert_eq!(report.skipped.len(), 2);
        let typo = report.skipped.iter().find(|(n, _)| n == "typo").unwrap();
        assert!(typo.1.contains("did you mean 'modrinth'"), "{}", typo.1);
        let broken = report.skipped.iter().find(|(n, _)| n == "broken").unwrap();
        assert!(broken.1.contains("repository") || broken.1.contains("owner"), "{}", broken.1);

        let server = registry.get("server").unwrap();
        assert_eq!(server.source.provider(), "paper");
        assert_eq!(
            server.destination(Path::new("/srv"), Path::new("/srv/plugins")),
            PathBuf::from("/srv/paper.jar")
        );
        let geyser = registry.get("geyser").unwrap();
        assert_eq!(
            geyser.destination(Path::new("/srv"), Path::new("/srv/plugins")),
            PathBuf::from("/srv/plugins/geyser.jar")
        );
    }

    #[test]
    fn test_legacy_flat_entry_uses_legacy_constructor() {
        let (registry, report) = registry(
            r#"
[[updates.sources]]
name = "luckperms"
type = "github"
url = "https://github.com/LuckPerms/LuckPerms"
"#,
        );
        assert_eq!(report.loaded, vec!["luckperms"]);
        assert_eq!(registry.get("luckperms").unwrap().source.describe(), "github:LuckPerms/LuckPerms");
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let (registry, _) = registry(
            r#"
[updates.sources.folia]
type = "folia"
"#,
        );
        let mut entry = SourceEntry::new("hangar");
        entry.options.insert("project".into(), toml::Value::from("ViaVersion/ViaVersion"));

        let added = registry.register("via", entry.clone()).unwrap();
        assert_eq!(added.source.provider(), "hangar");
        assert_eq!(registry.snapshot().len(), 2);

        let err = registry.register("via", entry).unwrap_err();
        assert!(err.to_string().contains("already registered"));
        assert_eq!(registry.snapshot().len(), 2);
    }

    #[test]
    fn test_apply_asset_pattern_replaces_source() {
        let (registry, _) = registry(
            r#"
[updates.sources.geyser]
type = "github"
[updates.sources.geyser.options]
repository = "GeyserMC/Geyser"
"#,
        );
        let before = registry.snapshot();
        let (rebuilt, key) = registry.apply_asset_pattern("geyser", r"^Geyser-Spigot\.jar$").unwrap();
        assert_eq!(key, "asset_pattern");
        assert_eq!(rebuilt.entry.options["asset_pattern"].as_str(), Some(r"^Geyser-Spigot\.jar$"));
        assert!(!Arc::ptr_eq(&before[0], &registry.get("geyser").unwrap()));
        assert!(registry.apply_asset_pattern("missing", "x").is_err());
    }

    #[test]
    fn test_snapshot_survives_reload() {
        let (registry, _) = registry(
            r#"
[updates.sources.server]
type = "paper"
"#,
        );
        let old = registry.snapshot();
        registry.reload(&UpdatesConfig::default());
        assert_eq!(old.len(), 1);
        assert!(registry.snapshot().is_empty());
    }
}
