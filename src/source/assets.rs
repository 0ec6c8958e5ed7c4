//! Choosing one file out of a multi-file release.
//!
//! When a source has no `asset_pattern`, [`AssetDisambiguator::choose`]
//! applies a fixed preference:
//!
//! | candidates                        | outcome                                   |
//! |-----------------------------------|-------------------------------------------|
//! | exactly one `.jar`                | that jar                                  |
//! | several `.jar`                    | selection required, `PRIMARY_FORMAT`      |
//! | no jar, exactly one archive       | that archive (flagged `is_archive`)       |
//! | no jar, several archives          | selection required, `ARCHIVE`             |
//! | neither, exactly one file         | that file                                 |
//! | neither, several files            | selection required, `UNKNOWN`             |
//! | nothing                           | no eligible candidate                     |
//!
//! Once a requester picks a file, [`pattern_from_filename`] turns its name into
//! a durable pattern so later releases (`plugin-1.4.2.jar` → `plugin-1.5.0.jar`)
//! resolve without asking again.

use crate::constants::{ARCHIVE_EXTENSIONS, PRIMARY_ARTIFACT_EXTENSION};
use crate::core::UpdaterError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A provider-reported candidate file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    /// File name as published
    pub name: String,
    /// Direct download URL
    pub download_url: String,
    /// Whether the file is an archive that wraps the artifact
    pub is_archive: bool,
}

impl ReleaseAsset {
    /// Build an asset, classifying archives by extension.
    pub fn new(name: impl Into<String>, download_url: impl Into<String>) -> Self {
        let name = name.into();
        let is_archive = is_archive_name(&name);
        Self {
            name,
            download_url: download_url.into(),
            is_archive,
        }
    }
}

/// Coarse classification of an ambiguous candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetKind {
    /// Several files in the primary artifact format
    PrimaryFormat,
    /// Several archives and no primary-format file
    Archive,
    /// Nothing recognisable
    Unknown,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrimaryFormat => f.write_str("PRIMARY_FORMAT"),
            Self::Archive => f.write_str("ARCHIVE"),
            Self::Unknown => f.write_str("UNKNOWN"),
        }
    }
}

/// Whether a file name has the primary artifact extension.
pub fn is_primary_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(PRIMARY_ARTIFACT_EXTENSION)
}

/// Whether a file name has an archive extension.
pub fn is_archive_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    ARCHIVE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Asset choice for one release.
#[derive(Debug, Clone, Copy)]
pub struct AssetDisambiguator<'a> {
    /// Name of the source (for error messages)
    pub source_name: &'a str,
    /// Tag or label of the release
    pub release_tag: &'a str,
    /// Resolved version label, carried into a selection request
    pub version: &'a str,
    /// Resolved build number, carried into a selection request
    pub build: i64,
}

impl AssetDisambiguator<'_> {
    /// Pick the asset matching `pattern`, or apply the default preference.
    ///
    /// # Errors
    ///
    /// [`UpdaterError::NoEligibleCandidate`] when nothing matches, and
    /// [`UpdaterError::AssetSelectionRequired`] when the choice is ambiguous.
    pub fn choose(&self, assets: &[ReleaseAsset], pattern: Option<&Regex>) -> Result<ReleaseAsset, UpdaterError> {
        if let Some(pattern) = pattern {
            return assets.iter().find(|a| pattern.is_match(&a.name)).cloned().ok_or_else(|| {
                UpdaterError::no_candidate(
                    self.source_name,
                    format!("no file in release '{}' matches pattern '{}'", self.release_tag, pattern.as_str()),
                )
            });
        }

        let primary: Vec<&ReleaseAsset> = assets.iter().filter(|a| is_primary_name(&a.name)).collect();
        match primary.len() {
            1 => return Ok(primary[0].clone()),
            n if n > 1 => return Err(self.selection(AssetKind::PrimaryFormat, &primary)),
            _ => {}
        }

        let archives: Vec<&ReleaseAsset> = assets.iter().filter(|a| a.is_archive).collect();
        match archives.len() {
            1 => return Ok(archives[0].clone()),
            n if n > 1 => return Err(self.selection(AssetKind::Archive, &archives)),
            _ => {}
        }

        match assets {
            [] => Err(UpdaterError::no_candidate(
                self.source_name,
                format!("release '{}' has no downloadable files", self.release_tag),
            )),
            [only] => Ok(only.clone()),
            many => {
                let all: Vec<&ReleaseAsset> = many.iter().collect();
                Err(self.selection(AssetKind::Unknown, &all))
            }
        }
    }

    fn selection(&self, kind: AssetKind, candidates: &[&ReleaseAsset]) -> UpdaterError {
        UpdaterError::AssetSelectionRequired {
            release_tag: self.release_tag.to_string(),
            kind,
            candidates: candidates.iter().map(|a| (*a).clone()).collect(),
            version: self.version.to_string(),
            build: self.build,
        }
    }
}

/// Turn a chosen file name into an anchored pattern where every digit run is
/// generic.
///
/// ```rust
/// use updraft::source::assets::pattern_from_filename;
///
/// let pattern = regex::Regex::new(&pattern_from_filename("MyPlugin-1.4.2-paper.jar")).unwrap();
/// assert!(pattern.is_match("MyPlugin-1.5.0-paper.jar"));
/// assert!(!pattern.is_match("MyPlugin-1.5.0-folia.jar"));
/// ```
pub fn pattern_from_filename(filename: &str) -> String {
    let mut pattern = String::from("^");
    let mut literal = String::new();
    let mut in_digits = false;

    for c in filename.chars() {
        if c.is_ascii_digit() {
            if !in_digits {
                pattern.push_str(&regex::escape(&literal));
                literal.clear();
                pattern.push_str(r"\d+");
                in_digits = true;
            }
        } else {
            in_digits = false;
            literal.push(c);
        }
    }
    pattern.push_str(&regex::escape(&literal));
    pattern.push('$');
    pattern
}
