//! Typed access to a source's free-form `options` table.
//!
//! Options come from TOML written by hand or migrated from older layouts that
//! used camelCase keys, so every getter accepts both `game_versions` and
//! `gameVersions`.

use crate::core::UpdaterError;
use regex::Regex;
use toml::{Table, Value};

/// Free-form provider options of one source entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceOptions {
    source_name: String,
    table: Table,
}

impl SourceOptions {
    /// Wrap an options table for the named source.
    pub fn new(source_name: impl Into<String>, table: Table) -> Self {
        Self {
            source_name: source_name.into(),
            table,
        }
    }

    /// Name of the source these options belong to.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Whether no options were given.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// The raw table.
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Copy of these options with one string option replaced.
    #[must_use]
    pub fn with_str(&self, key: &str, value: &str) -> Self {
        let mut table = self.table.clone();
        table.remove(&camel_case(key));
        table.insert(key.to_string(), Value::String(value.to_string()));
        Self {
            source_name: self.source_name.clone(),
            table,
        }
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.table.get(key).or_else(|| self.table.get(&camel_case(key)))
    }

    /// Optional non-empty string option. Integers are accepted and stringified.
    pub fn str(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Integer(i) => Some(i.to_string()),
            _ => None,
        }
    }

    /// Required string option.
    ///
    /// # Errors
    ///
    /// [`UpdaterError::Configuration`] naming the missing key.
    pub fn required_str(&self, key: &str) -> Result<String, UpdaterError> {
        self.str(key).ok_or_else(|| {
            UpdaterError::config(&self.source_name, format!("missing required option '{key}'"))
        })
    }

    /// Optional boolean option; strings `"true"`/`"false"` are accepted.
    pub fn bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Boolean(b) => Some(*b),
            Value::String(s) => s.trim().parse::<bool>().ok(),
            _ => None,
        }
    }

    /// Optional positive integer option.
    ///
    /// # Errors
    ///
    /// [`UpdaterError::Configuration`] when present but not a positive integer.
    pub fn u32(&self, key: &str) -> Result<Option<u32>, UpdaterError> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Integer(i) => u32::try_from(*i).ok().filter(|v| *v > 0),
            Value::String(s) => s.trim().parse::<u32>().ok().filter(|v| *v > 0),
            _ => None,
        };
        parsed.map(Some).ok_or_else(|| {
            UpdaterError::config(&self.source_name, format!("option '{key}' must be a positive integer"))
        })
    }

    /// List option given either as an array or as a comma-separated string.
    pub fn list(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Integer(i) => Some(i.to_string()),
                    Value::Float(f) => Some(f.to_string()),
                    _ => None,
                })
                .filter(|s| !s.is_empty())
                .collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(|part| part.trim().to_string())
                .filter(|part| !part.is_empty())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Optional regular-expression option.
    ///
    /// # Errors
    ///
    /// [`UpdaterError::Configuration`] when the pattern does not compile.
    pub fn regex(&self, key: &str) -> Result<Option<Regex>, UpdaterError> {
        match self.str(key) {
            None => Ok(None),
            Some(pattern) => Regex::new(&pattern).map(Some).map_err(|e| {
                UpdaterError::config(&self.source_name, format!("option '{key}' is not a valid pattern: {e}"))
            }),
        }
    }
}

/// `game_versions` → `gameVersions`.
fn camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for c in key.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
