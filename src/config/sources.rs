//! Declarative source entries and the legacy list layout.

use crate::core::TargetDirectory;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use toml::Table;

/// One `[updates.sources.<name>]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEntry {
    /// Provider registration key (`github`, `modrinth`, ...)
    #[serde(rename = "type")]
    pub kind: String,

    /// Directory the artifact is installed into
    #[serde(default)]
    pub target: TargetDirectory,

    /// Installed file name; defaults to `<name>.jar`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Disabled entries are kept in the file but never registered
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Host component whose reported version is compared with the latest label
    #[serde(
        default,
        alias = "linkedComponent",
        alias = "linked_plugin",
        skip_serializing_if = "Option::is_none"
    )]
    pub linked_component: Option<String>,

    /// Provider options
    #[serde(default, skip_serializing_if = "Table::is_empty")]
    pub options: Table,

    /// Provider keys written directly on the entry by older layouts.
    ///
    /// Kept apart from `options` so the registry can route them through the
    /// provider's legacy constructor; `migrate` folds them into `options`.
    #[serde(flatten)]
    pub legacy: Table,
}

fn default_true() -> bool {
    true
}

impl SourceEntry {
    /// Enabled entry of the given provider type with no options.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            target: TargetDirectory::default(),
            filename: None,
            enabled: true,
            linked_component: None,
            options: Table::new(),
            legacy: Table::new(),
        }
    }

    /// File name the artifact of source `name` is installed as.
    pub fn filename_for(&self, name: &str) -> String {
        self.filename.clone().unwrap_or_else(|| format!("{name}.jar"))
    }

    /// Move flat legacy keys into `options`. Keys already present in
    /// `options` win. Returns whether anything moved.
    pub fn fold_legacy(&mut self) -> bool {
        if self.legacy.is_empty() {
            return false;
        }
        for (key, value) in std::mem::take(&mut self.legacy) {
            self.options.entry(key).or_insert(value);
        }
        true
    }
}

/// Entry of the legacy `sources = [ { name = ..., type = ... } ]` list.
#[derive(Debug, Deserialize)]
struct LegacyListEntry {
    name: String,
    #[serde(flatten)]
    entry: SourceEntry,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSources {
    Sections(BTreeMap<String, SourceEntry>),
    List(Vec<LegacyListEntry>),
}

/// Sources parsed from either layout, plus whether the legacy list was used.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParsedSources {
    /// Entries by name
    pub entries: BTreeMap<String, SourceEntry>,
    /// Whether the file used the list layout
    pub from_list: bool,
}

impl<'de> Deserialize<'de> for ParsedSources {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawSources::deserialize(deserializer)? {
            RawSources::Sections(entries) => Self {
                entries,
                from_list: false,
            },
            RawSources::List(list) => {
                let mut entries = BTreeMap::new();
                for item in list {
                    if entries.contains_key(&item.name) {
                        tracing::warn!("Duplicate source '{}' in legacy list; keeping the first", item.name);
                        continue;
                    }
                    entries.insert(item.name, item.entry);
                }
                Self {
                    entries,
                    from_list: true,
                }
            }
        })
    }
}

impl Serialize for ParsedSources {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}
