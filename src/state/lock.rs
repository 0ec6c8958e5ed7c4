//! Cross-process lock around state-file updates.

use crate::core::UpdaterError;
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Exclusive advisory lock on `<state file>.lock`, released on drop.
pub struct StateLock {
    file: File,
    path: PathBuf,
}

impl StateLock {
    /// Block until the lock for `state_path` is held.
    ///
    /// # Errors
    ///
    /// [`UpdaterError::Persistence`] when the lock file cannot be opened or
    /// locked.
    pub fn acquire(state_path: &Path) -> Result<Self, UpdaterError> {
        let mut name = state_path.file_name().map(|n| n.to_os_string()).unwrap_or_else(|| "state".into());
        name.push(".lock");
        let path = state_path.with_file_name(name);
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| persistence(&path, e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| persistence(&path, e))?;
        file.lock_exclusive().map_err(|e| persistence(&path, e))?;
        Ok(Self { file, path })
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        #[allow(unstable_name_collisions)]
        if let Err(e) = self.file.unlock() {
            tracing::warn!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}

fn persistence(path: &Path, e: std::io::Error) -> UpdaterError {
    UpdaterError::Persistence {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}
