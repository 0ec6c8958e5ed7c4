//! Global constants used throughout the updraft codebase.
//!
//! Timeouts, paging limits and retention counts that are shared by several
//! modules live here so the defaults are discoverable in one place.

use std::time::Duration;

/// Default TCP connect timeout for API calls and downloads (5 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default read timeout (10 seconds).
///
/// For downloads this applies to every chunk, not to the whole transfer, so a
/// large artifact on a slow but live connection is never cut off.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Default interval between two scheduler cycles (1 hour).
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 3600;

/// Default number of result pages a paginated provider walks per cycle.
pub const DEFAULT_MAX_PAGES: u32 = 5;

/// Default page size requested from paginated providers.
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Default number of backups kept per source before the oldest are pruned.
pub const DEFAULT_BACKUP_RETENTION: usize = 3;

/// User agent sent with every request unless the configuration overrides it.
pub const DEFAULT_USER_AGENT: &str = concat!("updraft/", env!("CARGO_PKG_VERSION"));

/// Requester identity used for selections raised by the unattended scheduler.
pub const CONSOLE_REQUESTER: &str = "console";

/// File extension treated as the primary artifact format.
pub const PRIMARY_ARTIFACT_EXTENSION: &str = ".jar";

/// File extensions treated as archives that may wrap the primary artifact.
pub const ARCHIVE_EXTENSIONS: &[&str] = &[".zip", ".tar.gz", ".tgz"];

/// Suffix of temporary download files created next to their destination.
pub const PARTIAL_DOWNLOAD_SUFFIX: &str = ".part";
