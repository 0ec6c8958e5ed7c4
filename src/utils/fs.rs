//! File-system helpers built on the temp-then-rename pattern.
//!
//! Readers of a file written through this module see either the old or the
//! new content, never a partial write.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// `EXDEV`: rename across mount points.
const CROSS_DEVICE_ERRNO: i32 = 18;

/// Create `path` and its parents if missing.
///
/// # Errors
///
/// Fails when the directory cannot be created or `path` is a file.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    } else if !path.is_dir() {
        anyhow::bail!("Path exists but is not a directory: {}", path.display());
    }
    Ok(())
}

/// Atomically write `content` to `path`.
///
/// The bytes go to a temporary file in the same directory, are synced, and
/// the temporary file is renamed over `path`. Parent directories are created.
///
/// ```rust,no_run
/// use updraft::utils::atomic_write;
/// use std::path::Path;
///
/// # fn example() -> anyhow::Result<()> {
/// atomic_write(Path::new("state.toml"), b"[sources]\n")?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Any failure creating, writing, syncing or renaming the temporary file.
/// The target is untouched in that case.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    ensure_dir(parent)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".updraft-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .with_context(|| format!("Failed to create temp file in: {}", parent.display()))?;
    temp.write_all(content)
        .with_context(|| format!("Failed to write temp file for: {}", path.display()))?;
    temp.as_file().sync_all().context("Failed to sync file to disk")?;

    temp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;
    Ok(())
}

/// Move `from` over `to`, replacing it.
///
/// Uses an atomic rename. When the two paths live on different devices the
/// rename is impossible, so the content is copied and the source removed;
/// that fallback is not atomic.
///
/// # Errors
///
/// I/O failures of the rename or of the fallback copy.
pub fn replace_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(CROSS_DEVICE_ERRNO) => {
            debug!("Cross-device rename {} -> {}, copying", from.display(), to.display());
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_creates_parents_and_replaces() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/dir/state.toml");
        atomic_write(&path, b"one").unwrap();
        atomic_write(&path, b"two").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");

        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_ensure_dir_rejects_files() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file");
        fs::write(&file, "x").unwrap();
        assert!(ensure_dir(&file).is_err());
        ensure_dir(&temp.path().join("a/b")).unwrap();
        assert!(temp.path().join("a/b").is_dir());
    }

    #[test]
    fn test_replace_file() {
        let temp = TempDir::new().unwrap();
        let from = temp.path().join("new.jar");
        let to = temp.path().join("plugin.jar");
        fs::write(&from, "new").unwrap();
        fs::write(&to, "old").unwrap();
        replace_file(&from, &to).unwrap();
        assert_eq!(fs::read_to_string(&to).unwrap(), "new");
        assert!(!from.exists());
    }
}
