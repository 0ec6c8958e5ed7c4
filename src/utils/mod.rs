//! Cross-cutting helpers: atomic file replacement and terminal progress.

pub mod fs;
pub mod progress;

pub use fs::{atomic_write, ensure_dir, replace_file};
pub use progress::DownloadProgress;
