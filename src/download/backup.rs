use crate::core::UpdaterError;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Where and how many backups are kept for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupPolicy {
    /// Root of all backups (e.g. `~/.updraft/backups`)
    pub root: PathBuf,
    /// Per-source directory name under `root`
    pub source_id: String,
    /// Number of most recent backups retained
    pub retention: usize,
}

/// Keeps copies of overwritten artifacts.
///
/// Layout: `<root>/<source_id>/<unix_millis>-<filename>`. The timestamp
/// prefix makes lexical and chronological order agree, so pruning keeps the
/// `retention` entries with the greatest prefixes.
///
/// The original is copied, not moved, so the destination keeps its bytes
/// until the downloader's final rename replaces it.
pub struct BackupManager {
    policy: BackupPolicy,
}

impl BackupManager {
    /// Manager for one policy.
    pub fn new(policy: BackupPolicy) -> Self {
        Self { policy }
    }

    /// Directory holding this source's backups.
    pub fn backup_dir(&self) -> PathBuf {
        self.policy.root.join(sanitize(&self.policy.source_id))
    }

    /// Copy `original` into the backup directory and prune old backups.
    ///
    /// Returns the path of the new backup.
    ///
    /// # Errors
    ///
    /// I/O errors creating the directory or copying the file.
    pub async fn create_backup(&self, original: &Path) -> Result<PathBuf, UpdaterError> {
        let dir = self.backup_dir();
        fs::create_dir_all(&dir).await?;

        let file_name = original
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact".to_string());
        let now = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or_default();
        // stamps stay strictly increasing even within one millisecond
        let stamp = match self.backups().last().and_then(|p| stamp_of(p)) {
            Some(newest) if newest >= now => newest + 1,
            _ => now,
        };
        let backup_path = dir.join(format!("{stamp:013}-{file_name}"));

        info!("Backing up {} to {}", original.display(), backup_path.display());
        fs::copy(original, &backup_path).await?;

        #[cfg(unix)]
        {
            let permissions = fs::metadata(original).await?.permissions();
            fs::set_permissions(&backup_path, permissions).await?;
        }

        self.prune().await;
        Ok(backup_path)
    }

    /// Existing backups, oldest first.
    pub fn backups(&self) -> Vec<PathBuf> {
        let dir = self.backup_dir();
        if !dir.is_dir() {
            return Vec::new();
        }
        let mut entries: Vec<PathBuf> = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .collect();
        entries.sort();
        entries
    }

    /// Remove all but the newest `retention` backups. Failures are logged.
    async fn prune(&self) {
        let backups = self.backups();
        let excess = backups.len().saturating_sub(self.policy.retention);
        for old in backups.into_iter().take(excess) {
            debug!("Pruning backup {}", old.display());
            if let Err(e) = fs::remove_file(&old).await {
                warn!("Failed to prune backup {}: {}", old.display(), e);
            }
        }
    }
}

fn stamp_of(path: &Path) -> Option<u128> {
    let name = path.file_name()?.to_str()?;
    name.split_once('-')?.0.parse().ok()
}

/// Source names become directory names; keep them to one safe path segment.
fn sanitize(source_id: &str) -> String {
    let cleaned: String = source_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect();
    match cleaned.trim_matches('.') {
        "" => "_".to_string(),
        s => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(root: &Path, retention: usize) -> BackupManager {
        BackupManager::new(BackupPolicy {
            root: root.to_path_buf(),
            source_id: "WorldEdit".into(),
            retention,
        })
    }

    #[tokio::test]
    async fn test_backup_copies_and_names_by_timestamp() {
        let temp = TempDir::new().unwrap();
        let original = temp.path().join("WorldEdit.jar");
        std::fs::write(&original, "v1").unwrap();

        let manager = manager(&temp.path().join("backups"), 3);
        let backup = manager.create_backup(&original).await.unwrap();

        assert!(original.exists());
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "v1");
        assert_eq!(backup.parent().unwrap(), temp.path().join("backups/WorldEdit"));
        let name = backup.file_name().unwrap().to_string_lossy().into_owned();
        let (stamp, rest) = name.split_once('-').unwrap();
        assert!(stamp.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(rest, "WorldEdit.jar");
    }

    #[tokio::test]
    async fn test_retention_keeps_newest() {
        let temp = TempDir::new().unwrap();
        let original = temp.path().join("WorldEdit.jar");
        let manager = manager(&temp.path().join("backups"), 3);

        for i in 0..5 {
            std::fs::write(&original, format!("v{i}")).unwrap();
            manager.create_backup(&original).await.unwrap();
        }

        let kept = manager.backups();
        assert_eq!(kept.len(), 3);
        let contents: Vec<String> = kept.iter().map(|p| std::fs::read_to_string(p).unwrap()).collect();
        assert_eq!(contents, vec!["v2", "v3", "v4"]);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("../etc"), "_etc");
        assert_eq!(sanitize("my plugin"), "my_plugin");
        assert_eq!(sanitize(".."), "_");
    }
}
