//! Legacy configuration and state layouts.

use anyhow::Result;
use std::sync::Arc;
use updraft::config::{UpdaterConfig, set_source_option};
use updraft::registry::SourceRegistry;
use updraft::state::BuildStateStore;
use updraft::test_utils::{FakeResponse, FakeTransport, StaticHostModules, plugin_jar};

use crate::common::TestHost;

const LEGACY_CONFIG: &str = r#"
[host]
root = "{root}"

[updates]
ignoreUnstable = true

[[updates.sources]]
name = "luckperms"
type = "github"
url = "https://github.com/LuckPerms/LuckPerms"
base_url = "https://gh.test"

[[updates.sources]]
name = "retired"
type = "spiget"
enabled = false
"#;

const RELEASES: &str = "https://gh.test/repos/LuckPerms/LuckPerms/releases?per_page=25&page=1";

#[tokio::test]
async fn test_legacy_layouts_load_and_respect_stored_builds() -> Result<()> {
    let host = TestHost::new(LEGACY_CONFIG, StaticHostModules::new()).await?;
    assert_eq!(host.report.loaded, vec!["luckperms"]);
    assert_eq!(host.report.disabled, vec!["retired"]);

    let state_path = host.root().join(".updraft/state.toml");
    tokio::fs::create_dir_all(state_path.parent().unwrap()).await?;
    tokio::fs::write(&state_path, "\"luckperms.build\" = 500\n\"luckperms.version\" = \"v5.4.100\"\n").await?;

    host.transport.route(
        RELEASES,
        FakeResponse::Body(
            br#"[{"id":400,"tag_name":"v5.4.120","published_at":"2024-01-01T00:00:00Z",
                 "assets":[{"name":"LuckPerms-Bukkit-5.4.120.jar","browser_download_url":"https://gh.test/dl/lp.jar"}]}]"#
                .to_vec(),
        ),
    );
    host.transport.route("https://gh.test/dl/lp.jar", FakeResponse::Body(plugin_jar("LuckPerms", "5.4.120")));

    let report = host.scheduler.run_cycle(None).await;
    assert!(report.installed.is_empty(), "stored build 500 outranks release id 400: {report:?}");

    let store = BuildStateStore::new(&state_path);
    assert!(store.snapshot()?.legacy);
    assert!(store.migrate()?);
    let record = store.get("luckperms")?.unwrap();
    assert_eq!(record.build, 500);
    assert_eq!(record.version, "v5.4.100");
    Ok(())
}

#[tokio::test]
async fn test_migrated_config_keeps_sources_and_accepts_options() -> Result<()> {
    let host = TestHost::new(LEGACY_CONFIG, StaticHostModules::new()).await?;
    let path = host.config_path();

    assert!(UpdaterConfig::migrate_file(&path).await?);
    set_source_option(&path, "luckperms", "asset_pattern", r"^LuckPerms-Bukkit-\d+\.\d+\.\d+\.jar$").await?;

    let config = UpdaterConfig::load_from(&path).await?;
    assert!(!config.is_legacy());
    let entry = &config.updates.sources.entries["luckperms"];
    assert_eq!(entry.options["url"].as_str(), Some("https://github.com/LuckPerms/LuckPerms"));
    assert!(entry.options.contains_key("asset_pattern"));
    assert!(!config.updates.sources.entries["retired"].enabled);

    let (_, report) = SourceRegistry::from_config(Arc::new(FakeTransport::new()), &config.updates);
    assert_eq!(report.loaded, vec!["luckperms"]);
    assert!(report.skipped.is_empty(), "{:?}", report.skipped);
    Ok(())
}
