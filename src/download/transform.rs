//! Post-download transforms applied to the staged file before commit.
//!
//! A transform works on the temporary file only. If it fails, the
//! downloader discards the temporary file and the installed artifact is
//! never touched.

use crate::constants::PRIMARY_ARTIFACT_EXTENSION;
use crate::core::UpdaterError;
use regex::Regex;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use tracing::debug;

/// Rewrites or validates a staged download in place.
pub trait ArtifactTransform: Send + Sync {
    /// Short name used in error messages.
    fn name(&self) -> &'static str;

    /// Transform the file at `staged`, leaving the result at the same path.
    ///
    /// # Errors
    ///
    /// [`UpdaterError::Transform`] when the file is rejected.
    fn apply(&self, staged: &Path) -> Result<(), UpdaterError>;
}

/// Replace a downloaded `.zip` with the single jar it contains.
#[derive(Debug, Clone, Default)]
pub struct ExtractArchive {
    entry_pattern: Option<Regex>,
}

impl ExtractArchive {
    /// Extract the only primary-format entry, or the only entry whose file
    /// name matches `entry_pattern`.
    pub fn new(entry_pattern: Option<Regex>) -> Self {
        Self { entry_pattern }
    }

    fn fail(&self, message: impl Into<String>) -> UpdaterError {
        UpdaterError::Transform {
            transform: self.name().to_string(),
            message: message.into(),
        }
    }
}

impl ArtifactTransform for ExtractArchive {
    fn name(&self) -> &'static str {
        "extract-archive"
    }

    fn apply(&self, staged: &Path) -> Result<(), UpdaterError> {
        let file = File::open(staged)?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| self.fail(format!("not a zip archive: {e}")))?;

        let candidates: Vec<String> = archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .filter(|name| {
                let base = name.rsplit('/').next().unwrap_or(name);
                match &self.entry_pattern {
                    Some(pattern) => pattern.is_match(base),
                    None => base.to_ascii_lowercase().ends_with(PRIMARY_ARTIFACT_EXTENSION),
                }
            })
            .map(ToString::to_string)
            .collect();

        let entry_name = match candidates.as_slice() {
            [only] => only.clone(),
            [] => return Err(self.fail("archive contains no matching artifact")),
            many => {
                return Err(self.fail(format!(
                    "archive contains {} candidate artifacts ({}); set 'archive_entry_pattern'",
                    many.len(),
                    many.join(", ")
                )));
            }
        };

        let parent = staged.parent().unwrap_or_else(|| Path::new("."));
        // named after the staged file so an interrupted extraction is swept with it
        let prefix = format!("{}.extract-", staged.file_name().map(|n| n.to_string_lossy()).unwrap_or_default());
        let mut extracted = tempfile::Builder::new().prefix(&prefix).suffix(".part").tempfile_in(parent)?;
        {
            let mut entry = archive.by_name(&entry_name).map_err(|e| self.fail(e.to_string()))?;
            io::copy(&mut entry, &mut extracted)?;
        }
        extracted.flush()?;
        extracted.as_file().sync_all()?;
        drop(archive);

        debug!("Extracted {} from archive", entry_name);
        extracted.persist(staged).map_err(|e| UpdaterError::Io(e.error))?;
        Ok(())
    }
}

/// Reject downloads that are not readable jar (zip) files, such as an HTML
/// error page served with status 200.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyJar;

impl ArtifactTransform for VerifyJar {
    fn name(&self) -> &'static str {
        "verify-jar"
    }

    fn apply(&self, staged: &Path) -> Result<(), UpdaterError> {
        let file = File::open(staged)?;
        let archive = zip::ZipArchive::new(file).map_err(|e| UpdaterError::Transform {
            transform: self.name().to_string(),
            message: format!("downloaded file is not a valid jar: {e}"),
        })?;
        if archive.len() == 0 {
            return Err(UpdaterError::Transform {
                transform: self.name().to_string(),
                message: "downloaded jar is empty".to_string(),
            });
        }
        Ok(())
    }
}
