//! Full update cycles across several providers.

use anyhow::Result;
use sha2::{Digest, Sha256, Sha512};
use updraft::net::api_url;
use updraft::source::jenkins::TREE;
use updraft::test_utils::{FakeResponse, StaticHostModules, plugin_jar};

use crate::common::TestHost;

const CONFIG: &str = r#"
[host]
root = "{root}"

[updates]
ignore_unstable = true
backup_retention = 2

[updates.sources.server]
type = "paper"
target = "HOST_ROOT"
filename = "paper.jar"

[updates.sources.server.options]
base_url = "https://papi.test/v2"

[updates.sources.worldedit]
type = "modrinth"
linked_component = "WorldEdit"

[updates.sources.worldedit.options]
project = "worldedit"
base_url = "https://modrinth.test/v2"
game_versions = ["1.20.1"]

[updates.sources.builds]
type = "jenkins"

[updates.sources.builds.options]
base_url = "https://ci.test"
job = "Acme/Plugin"
"#;

const PAPER_JAR_URL: &str = "https://papi.test/v2/projects/paper/versions/1.21/builds/11/downloads/paper-1.21-11.jar";

fn jenkins_url() -> String {
    api_url(
        "https://ci.test",
        &["job", "Acme", "job", "Plugin", "lastSuccessfulBuild", "api", "json"],
        &[("tree", TREE.to_string())],
    )
    .unwrap()
}

fn route_paper(host: &TestHost, jar: &[u8]) {
    let t = &host.transport;
    t.route(
        "https://papi.test/v2/projects/paper",
        FakeResponse::Body(br#"{"project_id":"paper","versions":["1.20.4","1.21"]}"#.to_vec()),
    );
    t.route(
        "https://papi.test/v2/projects/paper/versions/1.21",
        FakeResponse::Body(br#"{"builds":[10,11]}"#.to_vec()),
    );
    let detail = format!(
        r#"{{"build":11,"channel":"default","downloads":{{"application":{{"name":"paper-1.21-11.jar","sha256":"{}"}}}}}}"#,
        hex::encode(Sha256::digest(jar))
    );
    t.route(
        "https://papi.test/v2/projects/paper/versions/1.21/builds/11",
        FakeResponse::Body(detail.into_bytes()),
    );
    t.route(PAPER_JAR_URL, FakeResponse::Body(jar.to_vec()));
}

fn route_modrinth(host: &TestHost, jar: &[u8]) {
    let listing = format!(
        r#"[
        {{"id":"AAA","version_number":"7.3.0","version_type":"release","date_published":"2023-09-12T10:00:00Z",
         "game_versions":["1.20"],"loaders":["paper"],
         "files":[{{"url":"https://cdn.test/we-7.3.0.jar","filename":"we-7.3.0.jar","primary":true}}]}},
        {{"id":"BBB","version_number":"7.2.9","version_type":"release","date_published":"2023-09-10T10:00:00Z",
         "game_versions":["1.20.1"],"loaders":["paper"],
         "files":[{{"url":"https://cdn.test/we-7.2.9.jar","filename":"we-7.2.9.jar","primary":true,
                   "hashes":{{"sha512":"{}"}}}}]}}
    ]"#,
        hex::encode(Sha512::digest(jar))
    );
    host.transport.route(
        "https://modrinth.test/v2/project/worldedit/version",
        FakeResponse::Body(listing.into_bytes()),
    );
    host.transport.route("https://cdn.test/we-7.2.9.jar", FakeResponse::Body(jar.to_vec()));
}

#[tokio::test]
async fn test_cycle_installs_eligible_builds_and_isolates_failures() -> Result<()> {
    let host = TestHost::new(CONFIG, StaticHostModules::new().with_host_version("1.21")).await?;
    assert_eq!(host.report.loaded.len(), 3);

    let paper = plugin_jar("Paper", "1.21");
    let worldedit = plugin_jar("WorldEdit", "7.2.9");
    route_paper(&host, &paper);
    route_modrinth(&host, &worldedit);
    host.transport.route(
        &jenkins_url(),
        FakeResponse::Body(
            br#"{"number":57,"result":"SUCCESS","url":"https://ci.test/job/Acme/job/Plugin/57/",
                "artifacts":[{"fileName":"plugin-1.jar","relativePath":"build/libs/plugin-1.jar"},
                             {"fileName":"plugin-2.jar","relativePath":"build/libs/plugin-2.jar"}]}"#
                .to_vec(),
        ),
    );

    let report = host.scheduler.run_cycle(None).await;

    let mut installed = report.installed.clone();
    installed.sort();
    assert_eq!(installed, vec!["server", "worldedit"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "builds");
    assert!(report.failed[0].1.contains("multiple artifacts"), "{}", report.failed[0].1);

    assert_eq!(tokio::fs::read(host.root().join("paper.jar")).await?, paper);
    assert_eq!(tokio::fs::read(host.root().join("plugins/worldedit.jar")).await?, worldedit);

    let deliveries = host.listener.deliveries();
    assert_eq!(deliveries.len(), 2);
    assert!(deliveries.iter().all(|(_, thread)| thread.as_deref() == Some("host-main")));
    let server_event = deliveries.iter().find(|(e, _)| e.source == "server").unwrap();
    assert_eq!(server_event.0.version, "1.21-b11");
    assert_eq!(server_event.0.build, 11);
    assert_eq!(server_event.0.download_url, PAPER_JAR_URL);

    Ok(())
}

#[tokio::test]
async fn test_second_cycle_is_idempotent() -> Result<()> {
    let host = TestHost::new(CONFIG, StaticHostModules::new().with_host_version("1.21")).await?;
    route_paper(&host, &plugin_jar("Paper", "1.21"));
    route_modrinth(&host, &plugin_jar("WorldEdit", "7.2.9"));

    host.scheduler.run_cycle(None).await;
    host.host.set_component("WorldEdit", "7.2.9");
    let second = host.scheduler.run_cycle(None).await;

    assert!(second.installed.is_empty(), "{second:?}");
    assert_eq!(host.transport.request_count(PAPER_JAR_URL), 1);
    assert_eq!(host.transport.request_count("https://cdn.test/we-7.2.9.jar"), 1);
    assert_eq!(host.listener.events().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_corrupt_download_leaves_previous_artifact() -> Result<()> {
    let host = TestHost::new(CONFIG, StaticHostModules::new().with_host_version("1.21")).await?;
    tokio::fs::create_dir_all(host.root()).await?;
    tokio::fs::write(host.root().join("paper.jar"), b"old paper").await?;

    route_paper(&host, &plugin_jar("Paper", "1.21"));
    host.transport.route(PAPER_JAR_URL, FakeResponse::Body(b"tampered".to_vec()));

    let report = host.scheduler.run_cycle(Some("server")).await;
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].1.contains("Checksum mismatch"), "{}", report.failed[0].1);
    assert_eq!(tokio::fs::read(host.root().join("paper.jar")).await?, b"old paper");

    let mut leftovers = tokio::fs::read_dir(host.root()).await?;
    while let Some(entry) = leftovers.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        assert!(!name.ends_with(".part"), "temporary file left behind: {name}");
    }
    assert!(host.pipeline().services().state.get("server")?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_unreachable_provider_is_reported_as_network_error() -> Result<()> {
    let host = TestHost::new(CONFIG, StaticHostModules::new()).await?;
    host.transport.route("https://papi.test/v2/projects/paper", FakeResponse::Unreachable);

    let report = host.scheduler.run_cycle(Some("server")).await;
    assert!(report.network_errors);
    assert_eq!(report.failed.len(), 1);
    Ok(())
}
