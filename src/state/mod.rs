//! Persisted per-source build markers.
//!
//! One TOML file per host installation:
//!
//! ```toml
//! [sources.worldedit]
//! build = 412
//! version = "7.3.0-b412"
//! ```
//!
//! Older installations wrote other layouts, which are still read:
//!
//! - flat keys: `"worldedit.build" = 412` and `"worldedit.version" = "7.3.0"`
//! - nested tables without the `sources` wrapper: `[worldedit] build = 412`
//! - a bare build number: `worldedit = 412`
//!
//! Writes always use the current layout, so the first install after an
//! upgrade migrates the file.

mod lock;

pub use lock::StateLock;

use crate::core::{PersistedBuildRecord, UpdaterError};
use crate::utils::atomic_write;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use toml::{Table, Value};
use tracing::{debug, info};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateDocument {
    #[serde(default)]
    sources: BTreeMap<String, PersistedBuildRecord>,
}

/// Parsed state plus whether it came from a legacy layout.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StateSnapshot {
    /// Records by source name
    pub records: BTreeMap<String, PersistedBuildRecord>,
    /// Whether any legacy entry was found
    pub legacy: bool,
}

/// Reads and writes the state file.
#[derive(Debug, Clone)]
pub struct BuildStateStore {
    path: PathBuf,
}

impl BuildStateStore {
    /// Store backed by `path` (created on first write).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every record; a missing file is empty state.
    ///
    /// # Errors
    ///
    /// [`UpdaterError::Persistence`] when the file exists but cannot be
    /// read or parsed.
    pub fn snapshot(&self) -> Result<StateSnapshot, UpdaterError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(StateSnapshot::default()),
            Err(e) => return Err(self.error(e)),
        };
        let table: Table = toml::from_str(&text).map_err(|e| self.error(e))?;
        Ok(parse_state(table))
    }

    /// Record for one source.
    ///
    /// # Errors
    ///
    /// See [`snapshot`](Self::snapshot).
    pub fn get(&self, source: &str) -> Result<Option<PersistedBuildRecord>, UpdaterError> {
        Ok(self.snapshot()?.records.remove(source))
    }

    /// Persist a successful install of `source`.
    ///
    /// The stored build becomes `max(previous, build)`. The update happens
    /// under an exclusive lock and the file is replaced atomically.
    ///
    /// # Errors
    ///
    /// [`UpdaterError::Persistence`] on any read, lock or write failure.
    pub fn record(&self, source: &str, build: i64, version: &str) -> Result<PersistedBuildRecord, UpdaterError> {
        let _lock = StateLock::acquire(&self.path)?;
        let mut snapshot = self.snapshot()?;

        let record = match snapshot.records.get(source) {
            Some(previous) => previous.advance(build, version),
            None => PersistedBuildRecord {
                build,
                version: version.to_string(),
            },
        };
        debug!("Recording {} build {} ({})", source, record.build, record.version);
        snapshot.records.insert(source.to_string(), record.clone());
        self.write(snapshot.records)?;
        Ok(record)
    }

    /// Rewrite a legacy-layout file in the current layout.
    ///
    /// Returns whether anything was rewritten.
    ///
    /// # Errors
    ///
    /// [`UpdaterError::Persistence`] on read or write failure.
    pub fn migrate(&self) -> Result<bool, UpdaterError> {
        let _lock = StateLock::acquire(&self.path)?;
        let snapshot = self.snapshot()?;
        if !snapshot.legacy {
            return Ok(false);
        }
        info!("Migrating legacy state file {}", self.path.display());
        self.write(snapshot.records)?;
        Ok(true)
    }

    fn write(&self, records: BTreeMap<String, PersistedBuildRecord>) -> Result<(), UpdaterError> {
        let text = toml::to_string(&StateDocument { sources: records }).map_err(|e| self.error(e))?;
        atomic_write(&self.path, text.as_bytes()).map_err(|e| self.error(format!("{e:#}")))
    }

    fn error(&self, e: impl std::fmt::Display) -> UpdaterError {
        UpdaterError::Persistence {
            path: self.path.display().to_string(),
            message: e.to_string(),
        }
    }
}

fn parse_state(table: Table) -> StateSnapshot {
    let mut snapshot = StateSnapshot::default();

    for (key, value) in table {
        if key == "sources"
            && let Value::Table(sources) = value
        {
            for (name, entry) in sources {
                if let Some(record) = record_from_table(&entry) {
                    merge(&mut snapshot.records, name, record);
                }
            }
            continue;
        }

        snapshot.legacy = true;
        if let Some((name, field)) = key.rsplit_once('.') {
            let record = snapshot.records.entry(name.to_string()).or_insert_with(empty_record);
            match (field, value) {
                ("build", Value::Integer(build)) => record.build = record.build.max(build),
                ("version", Value::String(version)) => record.version = version,
                _ => {}
            }
            continue;
        }
        match value {
            Value::Integer(build) => merge(
                &mut snapshot.records,
                key,
                PersistedBuildRecord {
                    build,
                    version: String::new(),
                },
            ),
            entry @ Value::Table(_) => {
                if let Some(record) = record_from_table(&entry) {
                    merge(&mut snapshot.records, key, record);
                }
            }
            _ => {}
        }
    }

    snapshot.records.retain(|_, r| r.build != i64::MIN);
    snapshot
}

fn empty_record() -> PersistedBuildRecord {
    PersistedBuildRecord {
        build: i64::MIN,
        version: String::new(),
    }
}

fn record_from_table(value: &Value) -> Option<PersistedBuildRecord> {
    let table = value.as_table()?;
    Some(PersistedBuildRecord {
        build: table.get("build")?.as_integer()?,
        version: table.get("version").and_then(Value::as_str).unwrap_or_default().to_string(),
    })
}

fn merge(records: &mut BTreeMap<String, PersistedBuildRecord>, name: String, record: PersistedBuildRecord) {
    match records.get_mut(&name) {
        Some(existing) if existing.build >= record.build => {
            if existing.version.is_empty() {
                existing.version = record.version;
            }
        }
        Some(existing) => {
            let version = if record.version.is_empty() { existing.version.clone() } else { record.version };
            *existing = PersistedBuildRecord {
                build: record.build,
                version,
            };
        }
        None => {
            records.insert(name, record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = BuildStateStore::new(temp.path().join("state.toml"));
        assert_eq!(store.get("x").unwrap(), None);
    }

    #[test]
    fn test_record_keeps_max_build() {
        let temp = TempDir::new().unwrap();
        let store = BuildStateStore::new(temp.path().join("state.toml"));

        store.record("worldedit", 12, "7.2.9").unwrap();
        let record = store.record("worldedit", 10, "7.2.8").unwrap();
        assert_eq!(record.build, 12);
        assert_eq!(store.get("worldedit").unwrap().unwrap().build, 12);

        store.record("worldedit", 13, "7.3.0").unwrap();
        assert_eq!(
            store.get("worldedit").unwrap(),
            Some(PersistedBuildRecord {
                build: 13,
                version: "7.3.0".into()
            })
        );
    }

    #[test]
    fn test_reads_and_migrates_legacy_layouts() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.toml");
        std::fs::write(
            &path,
            r#"
"worldedit.build" = 40
"worldedit.version" = "7.2.0"
essentials = 7

[luckperms]
build = 5
version = "5.4"

[sources.server]
build = 496
version = "1.20.4-b496"
"#,
        )
        .unwrap();

        let store = BuildStateStore::new(&path);
        let snapshot = store.snapshot().unwrap();
        assert!(snapshot.legacy);
        assert_eq!(snapshot.records["worldedit"].build, 40);
        assert_eq!(snapshot.records["worldedit"].version, "7.2.0");
        assert_eq!(snapshot.records["essentials"].build, 7);
        assert_eq!(snapshot.records["luckperms"].version, "5.4");
        assert_eq!(snapshot.records["server"].build, 496);

        assert!(store.migrate().unwrap());
        let migrated = store.snapshot().unwrap();
        assert!(!migrated.legacy);
        assert_eq!(migrated.records, snapshot.records);
        assert!(!store.migrate().unwrap());
    }

    #[test]
    fn test_flat_version_without_build_is_dropped() {
        let table: Table = toml::from_str(r#""orphan.version" = "1.0""#).unwrap();
        assert!(parse_state(table).records.is_empty());
    }

    #[test]
    fn test_corrupt_file_is_persistence_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.toml");
        std::fs::write(&path, "not = [valid").unwrap();
        assert!(matches!(
            BuildStateStore::new(&path).snapshot(),
            Err(UpdaterError::Persistence { .. })
        ));
    }
}
