//! File-system backed host integration used by the CLI.

use super::{HostModules, Lifecycle, UpdateCompletedEvent};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Descriptor files searched inside an add-on jar, in order.
const DESCRIPTORS: &[&str] = &["paper-plugin.yml", "plugin.yml", "bungee.yml"];

#[derive(Debug, Deserialize)]
struct Descriptor {
    name: String,
    #[serde(default)]
    version: Option<serde_yaml::Value>,
}

/// Reads installed versions from the descriptors packed inside the jars of
/// an add-on directory.
#[derive(Debug, Clone)]
pub struct DirectoryModules {
    addon_dir: PathBuf,
    host_version: Option<String>,
}

impl DirectoryModules {
    /// View over `addon_dir`; `host_version` comes from configuration.
    pub fn new(addon_dir: impl Into<PathBuf>, host_version: Option<String>) -> Self {
        Self {
            addon_dir: addon_dir.into(),
            host_version,
        }
    }

    fn read_descriptor(jar: &Path) -> Option<Descriptor> {
        let file = File::open(jar).ok()?;
        let mut archive = zip::ZipArchive::new(file).ok()?;
        for name in DESCRIPTORS {
            let Ok(mut entry) = archive.by_name(name) else {
                continue;
            };
            let mut text = String::new();
            if entry.read_to_string(&mut text).is_err() {
                continue;
            }
            match serde_yaml::from_str::<Descriptor>(&text) {
                Ok(descriptor) => return Some(descriptor),
                Err(e) => debug!("Unreadable {} in {}: {}", name, jar.display(), e),
            }
        }
        None
    }
}

impl HostModules for DirectoryModules {
    fn installed_version(&self, component: &str) -> Option<String> {
        let entries = std::fs::read_dir(&self.addon_dir).ok()?;
        entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("jar")))
            .filter_map(|path| Self::read_descriptor(&path))
            .find(|descriptor| descriptor.name.eq_ignore_ascii_case(component))
            .and_then(|descriptor| match descriptor.version? {
                serde_yaml::Value::String(s) => Some(s),
                serde_yaml::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    }

    fn host_version(&self) -> Option<String> {
        self.host_version.clone()
    }
}

/// Lifecycle for hosts that cannot hot-reload: the new artifact is picked up
/// on the next restart.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingLifecycle;

impl Lifecycle for LoggingLifecycle {
    fn activate(&self, event: &UpdateCompletedEvent) -> anyhow::Result<()> {
        info!(
            "{} updated to {} (build {}); restart the host to load {}",
            event.source,
            event.version,
            event.build,
            event.destination.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_jar(dir: &Path, file: &str, descriptor: &str, body: &str) {
        let mut writer = zip::ZipWriter::new(File::create(dir.join(file)).unwrap());
        writer.start_file(descriptor, zip::write::SimpleFileOptions::default()).unwrap();
        writer.write_all(body.as_bytes()).unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn test_reads_versions_from_descriptors() {
        let temp = TempDir::new().unwrap();
        write_jar(temp.path(), "WorldEdit.jar", "plugin.yml", "name: WorldEdit\nversion: 7.2.15\nmain: x.Y\n");
        write_jar(temp.path(), "Other.jar", "paper-plugin.yml", "name: Other\nversion: 3\n");
        std::fs::write(temp.path().join("notes.txt"), "not a jar").unwrap();
        std::fs::write(temp.path().join("broken.jar"), "not a zip").unwrap();

        let modules = DirectoryModules::new(temp.path(), Some("1.20.4".into()));
        assert_eq!(modules.installed_version("worldedit").as_deref(), Some("7.2.15"));
        assert_eq!(modules.installed_version("Other").as_deref(), Some("3"));
        assert_eq!(modules.installed_version("Missing"), None);
        assert_eq!(modules.host_version().as_deref(), Some("1.20.4"));
    }

    #[test]
    fn test_missing_directory() {
        let modules = DirectoryModules::new("/nonexistent/updraft/plugins", None);
        assert_eq!(modules.installed_version("x"), None);
    }
}
