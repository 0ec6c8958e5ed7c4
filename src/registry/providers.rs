//! Registration table mapping provider type keys to constructors.
//!
//! Adding a provider means adding one [`ProviderRegistration`] to
//! [`builtin_providers`]; the registry itself never matches on type keys.

use crate::core::UpdaterError;
use crate::source::github::GithubSource;
use crate::source::hangar::HangarSource;
use crate::source::jenkins::JenkinsSource;
use crate::source::modrinth::ModrinthSource;
use crate::source::paper::PaperSource;
use crate::source::spiget::SpigetSource;
use crate::source::{ProviderEnv, SourceOptions, VersionSource};
use std::sync::Arc;

/// Constructor taking an options table.
pub type OptionsConstructor = fn(&ProviderEnv, &SourceOptions) -> Result<Arc<dyn VersionSource>, UpdaterError>;

/// Constructor taking only the global "ignore unstable" flag.
pub type FlagConstructor = fn(&ProviderEnv, bool) -> Arc<dyn VersionSource>;

/// Constructor taking nothing but the environment.
pub type NoArgConstructor = fn(&ProviderEnv) -> Arc<dyn VersionSource>;

/// How one provider type is built from a source entry.
///
/// Constructors are tried in declaration order; the first applicable one
/// wins:
///
/// 1. `with_options` when the entry has an `options` table
/// 2. `with_legacy` when the entry carries flat legacy keys
/// 3. `with_flag`
/// 4. `no_arg`
#[derive(Clone, Copy)]
pub struct ProviderRegistration {
    /// Type key used in configuration
    pub key: &'static str,
    /// Options-table constructor
    pub with_options: Option<OptionsConstructor>,
    /// Flat legacy-key constructor
    pub with_legacy: Option<OptionsConstructor>,
    /// Boolean-flag constructor
    pub with_flag: Option<FlagConstructor>,
    /// No-argument constructor
    pub no_arg: Option<NoArgConstructor>,
    /// Option persisting an interactive asset choice, for providers that can
    /// ask for one
    pub asset_pattern_key: Option<&'static str>,
}

impl std::fmt::Debug for ProviderRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistration")
            .field("key", &self.key)
            .field("with_options", &self.with_options.is_some())
            .field("with_legacy", &self.with_legacy.is_some())
            .field("with_flag", &self.with_flag.is_some())
            .field("no_arg", &self.no_arg.is_some())
            .finish()
    }
}

impl ProviderRegistration {
    const fn options_only(key: &'static str, with_options: OptionsConstructor) -> Self {
        Self {
            key,
            with_options: Some(with_options),
            with_legacy: None,
            with_flag: None,
            no_arg: None,
            asset_pattern_key: None,
        }
    }

    /// Same constructor for both tables. `migrate` folds legacy keys into
    /// `options`, so the options constructor must understand them too.
    const fn normalized(key: &'static str, constructor: OptionsConstructor) -> Self {
        let mut registration = Self::options_only(key, constructor);
        registration.with_legacy = Some(constructor);
        registration
    }

    const fn asset_pattern(mut self, key: &'static str) -> Self {
        self.asset_pattern_key = Some(key);
        self
    }
}

macro_rules! release_archive {
    ($key:literal) => {
        ProviderRegistration {
            key: $key,
            with_options: Some(|env, options| Ok(Arc::new(PaperSource::from_options(env, options, $key)?))),
            with_legacy: Some(|env, options| Ok(Arc::new(PaperSource::from_options(env, options, $key)?))),
            with_flag: Some(|env, ignore_unstable| {
                let mut env = env.clone();
                env.ignore_unstable = ignore_unstable;
                Arc::new(PaperSource::for_project(&env, $key))
            }),
            no_arg: None,
            asset_pattern_key: None,
        }
    };
}

/// Every provider shipped with updraft.
pub fn builtin_providers() -> Vec<ProviderRegistration> {
    vec![
        release_archive!("paper"),
        release_archive!("folia"),
        release_archive!("velocity"),
        release_archive!("waterfall"),
        ProviderRegistration::normalized("modrinth", |env, options| {
            Ok(Arc::new(ModrinthSource::from_options(env, &alias(options, "id", "project"))?))
        })
        .asset_pattern("asset_pattern"),
        ProviderRegistration::normalized("hangar", |env, options| {
            Ok(Arc::new(HangarSource::from_options(env, &alias(options, "id", "project"))?))
        }),
        ProviderRegistration::normalized("github", |env, options| {
            Ok(Arc::new(GithubSource::from_options(env, &github_legacy(options))?))
        })
        .asset_pattern("asset_pattern"),
        ProviderRegistration::normalized("jenkins", |env, options| {
            Ok(Arc::new(JenkinsSource::from_options(env, &jenkins_legacy(options))?))
        })
        .asset_pattern("artifact_pattern"),
        ProviderRegistration::normalized("spiget", |env, options| {
            Ok(Arc::new(SpigetSource::from_options(env, &alias(options, "id", "resource"))?))
        }),
    ]
}

/// Copy `from` into `to` unless `to` is already set.
fn alias(options: &SourceOptions, from: &str, to: &str) -> SourceOptions {
    match (options.str(to), options.str(from)) {
        (None, Some(value)) => options.with_str(to, &value),
        _ => options.clone(),
    }
}

/// Legacy GitHub entries carried `url = "https://github.com/<owner>/<repo>"`.
fn github_legacy(options: &SourceOptions) -> SourceOptions {
    if options.str("repository").is_some() {
        return options.clone();
    }
    let Some(url) = options.str("url") else {
        return options.clone();
    };
    let path = url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("www.")
        .trim_start_matches("github.com/");
    let mut parts = path.split('/').filter(|s| !s.is_empty());
    match (parts.next(), parts.next()) {
        (Some(owner), Some(repo)) => options.with_str("repository", &format!("{owner}/{repo}")),
        _ => options.clone(),
    }
}

/// Legacy Jenkins entries carried the full job URL,
/// `url = "https://ci.example.org/job/Group/job/Project/"`.
fn jenkins_legacy(options: &SourceOptions) -> SourceOptions {
    if options.str("job").is_some() {
        return options.clone();
    }
    let Some(url) = options.str("url") else {
        return options.clone();
    };
    let Some((base, job)) = url.split_once("/job/") else {
        return options.clone();
    };
    // keep the URL form so the job parser can tell separators from names
    options.with_str("base_url", base).with_str("job", &format!("job/{}", job.trim_end_matches('/')))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(src: &str) -> SourceOptions {
        SourceOptions::new("test", toml::from_str(src).unwrap())
    }

    #[test]
    fn test_keys_are_unique() {
        let providers = builtin_providers();
        let mut keys: Vec<_> = providers.iter().map(|p| p.key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), providers.len());
    }

    #[test]
    fn test_github_legacy_url() {
        let converted = github_legacy(&options(r#"url = "https://github.com/LuckPerms/LuckPerms/""#));
        assert_eq!(converted.str("repository").as_deref(), Some("LuckPerms/LuckPerms"));
    }

    #[test]
    fn test_jenkins_legacy_url() {
        let converted = jenkins_legacy(&options(r#"url = "https://ci.example.org/job/Group/job/Project/""#));
        assert_eq!(converted.str("base_url").as_deref(), Some("https://ci.example.org"));
        assert_eq!(converted.str("job").as_deref(), Some("job/Group/job/Project"));
    }

    #[test]
    fn test_alias_does_not_override() {
        let converted = alias(&options(r#"id = "a"
project = "b""#), "id", "project");
        assert_eq!(converted.str("project").as_deref(), Some("b"));
        let converted = alias(&options(r#"id = "a""#), "id", "project");
        assert_eq!(converted.str("project").as_deref(), Some("a"));
    }
}
