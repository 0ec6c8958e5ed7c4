//! Test helpers shared by unit tests and the integration suite.
//!
//! Enabled for `cfg(test)` and for the `test-utils` feature, which the crate
//! turns on for its own dev-dependency so `tests/` can use the same fakes.

pub mod host;
pub mod transport;

pub use host::{RecordingListener, StaticHostModules};
pub use transport::{FakeResponse, FakeTransport};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Respects `RUST_LOG` when set; otherwise uses `level`, or stays silent when
/// neither is provided.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// In-memory zip archive with the given `(name, bytes)` entries.
///
/// A zip is also a valid `.jar`, so this doubles as a fake plugin artifact.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    use std::io::Write;

    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, bytes) in entries {
        writer.start_file(*name, zip::write::SimpleFileOptions::default()).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// A minimal plugin jar whose `plugin.yml` declares `name` and `version`.
pub fn plugin_jar(name: &str, version: &str) -> Vec<u8> {
    let descriptor = format!("name: {name}\nversion: '{version}'\nmain: com.example.Main\n");
    zip_bytes(&[("plugin.yml", descriptor.as_bytes()), ("com/example/Main.class", b"\xca\xfe\xba\xbe")])
}
