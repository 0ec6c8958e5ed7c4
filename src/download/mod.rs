//! Atomic network-to-disk delivery of artifacts.
//!
//! [`ArtifactDownloader::download`] guarantees that the destination holds
//! either its previous bytes or the complete new artifact:
//!
//! 1. stream into a temporary `.part` file in the destination directory,
//!    hashing every chunk;
//! 2. verify the digest when a [`ChecksumValidator`] is supplied;
//! 3. run the optional [`ArtifactTransform`] on the temporary file;
//! 4. copy the current destination into the backup directory, if a
//!    [`BackupPolicy`] is supplied;
//! 5. rename the temporary file over the destination, falling back to a
//!    copy when the rename crosses devices.
//!
//! A failure at any step drops the temporary file, which deletes it.

mod backup;
mod checksum;
pub mod transform;

pub use backup::{BackupManager, BackupPolicy};
pub use checksum::{ChecksumAlgorithm, ChecksumValidator, StreamingDigest};
pub use transform::{ArtifactTransform, ExtractArchive, VerifyJar};

use crate::constants::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT, PARTIAL_DOWNLOAD_SUFFIX};
use crate::core::UpdaterError;
use crate::net::HttpTransport;
use crate::utils::replace_file;
use futures::StreamExt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Receives progress notifications from a download.
pub trait DownloadObserver: Send + Sync {
    /// The response arrived; `total` is the advertised length.
    fn started(&self, total: Option<u64>);
    /// `bytes` more bytes were written.
    fn advanced(&self, bytes: u64);
    /// The download ended.
    fn finished(&self, success: bool);
}

/// Everything one download needs.
#[derive(Clone)]
pub struct DownloadRequest {
    /// Source URL
    pub url: String,
    /// Final artifact location
    pub destination: PathBuf,
    /// Time allowed to receive the response headers
    pub connect_timeout: Duration,
    /// Time allowed between two body chunks
    pub read_timeout: Duration,
    /// Expected digest
    pub checksum: Option<ChecksumValidator>,
    /// Backup of the overwritten artifact
    pub backup: Option<BackupPolicy>,
    /// Rewrite applied to the staged file before commit
    pub transform: Option<Arc<dyn ArtifactTransform>>,
    /// Progress sink
    pub observer: Option<Arc<dyn DownloadObserver>>,
}

impl DownloadRequest {
    /// Request with default timeouts and no extras.
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            checksum: None,
            backup: None,
            transform: None,
            observer: None,
        }
    }
}

impl std::fmt::Debug for DownloadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadRequest")
            .field("url", &self.url)
            .field("destination", &self.destination)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("checksum", &self.checksum)
            .field("backup", &self.backup)
            .field("transform", &self.transform.as_ref().map(|t| t.name()))
            .finish_non_exhaustive()
    }
}

/// Result of a committed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// Where the artifact now lives (the request's destination)
    pub path: PathBuf,
    /// Bytes received from the network
    pub bytes: u64,
    /// Copy of the previous artifact, if one was made
    pub backup: Option<PathBuf>,
}

/// Atomic downloader over an [`HttpTransport`].
#[derive(Clone)]
pub struct ArtifactDownloader {
    transport: Arc<dyn HttpTransport>,
}

impl ArtifactDownloader {
    /// Downloader using `transport`.
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Download `request.url` to `request.destination` atomically.
    ///
    /// # Errors
    ///
    /// Transport errors and timeouts ([`UpdaterError::Network`],
    /// [`UpdaterError::HttpStatus`]), [`UpdaterError::ChecksumMismatch`],
    /// [`UpdaterError::Transform`] and local I/O errors. In every case the
    /// destination is unchanged and no temporary file remains.
    pub async fn download(&self, request: &DownloadRequest) -> Result<DownloadOutcome, UpdaterError> {
        let result = self.download_inner(request).await;
        if let Some(observer) = &request.observer {
            observer.finished(result.is_ok());
        }
        result
    }

    async fn download_inner(&self, request: &DownloadRequest) -> Result<DownloadOutcome, UpdaterError> {
        let destination = &request.destination;
        let parent = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&parent).await?;

        let file_name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact".to_string());
        let staging_prefix = format!(".{file_name}.");
        remove_stale_parts(&parent, &staging_prefix).await;
        let mut staged = tempfile::Builder::new()
            .prefix(&staging_prefix)
            .suffix(PARTIAL_DOWNLOAD_SUFFIX)
            .tempfile_in(&parent)?;

        debug!("Downloading {} to {}", request.url, staged.path().display());
        let response = timeout(request.connect_timeout, self.transport.open_stream(&request.url))
            .await
            .map_err(|_| timed_out(&request.url, "connect", request.connect_timeout))??;
        if let Some(observer) = &request.observer {
            observer.started(response.content_length);
        }

        let mut digest = request.checksum.as_ref().map(ChecksumValidator::digest);
        let mut stream = response.stream;
        let mut bytes = 0u64;
        loop {
            let next = timeout(request.read_timeout, stream.next())
                .await
                .map_err(|_| timed_out(&request.url, "read", request.read_timeout))?;
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk?;
            staged.write_all(&chunk)?;
            if let Some(digest) = digest.as_mut() {
                digest.update(&chunk);
            }
            bytes += chunk.len() as u64;
            if let Some(observer) = &request.observer {
                observer.advanced(chunk.len() as u64);
            }
        }
        staged.flush()?;
        staged.as_file().sync_all()?;

        if let (Some(validator), Some(digest)) = (&request.checksum, digest) {
            validator.verify(&request.url, &digest.finalize_hex())?;
        }

        if let Some(transform) = &request.transform {
            debug!("Applying {} to {}", transform.name(), staged.path().display());
            transform.apply(staged.path())?;
        }

        let backup = match &request.backup {
            Some(policy) if destination.is_file() => {
                Some(BackupManager::new(policy.clone()).create_backup(destination).await?)
            }
            _ => None,
        };

        commit(staged.into_temp_path(), destination)?;
        info!("Downloaded {} ({} bytes) to {}", request.url, bytes, destination.display());

        Ok(DownloadOutcome {
            path: destination.clone(),
            bytes,
            backup,
        })
    }
}

/// Delete `.part` files left next to the destination by a process that died
/// mid-download. Downloads of one destination never overlap.
async fn remove_stale_parts(dir: &Path, prefix: &str) {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with(prefix) || !name.ends_with(PARTIAL_DOWNLOAD_SUFFIX) {
            continue;
        }
        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => warn!("Removed stale partial download {}", entry.path().display()),
            Err(e) => debug!("Could not remove {}: {e}", entry.path().display()),
        }
    }
}

/// Move the staged file over `destination`; on failure the staged file is
/// deleted when `staged` drops.
fn commit(staged: tempfile::TempPath, destination: &Path) -> Result<(), UpdaterError> {
    replace_file(&staged, destination)?;
    // already moved; nothing left to delete
    let _ = staged.keep();
    Ok(())
}

fn timed_out(url: &str, phase: &str, limit: Duration) -> UpdaterError {
    UpdaterError::Network {
        url: url.to_string(),
        message: format!("{phase} timed out after {}s", limit.as_secs_f32()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::StreamResponse;
    use crate::test_utils::{FakeResponse, FakeTransport};
    use async_trait::async_trait;
    use sha2::{Digest, Sha256};
    use tempfile::TempDir;

    const URL: &str = "https://cdn.test/plugin.jar";

    fn downloader(transport: FakeTransport) -> ArtifactDownloader {
        ArtifactDownloader::new(Arc::new(transport))
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_downloads_and_replaces() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("plugin.jar");
        std::fs::write(&dest, "old").unwrap();

        let body = b"a fairly long artifact body spanning several chunks";
        let outcome = downloader(FakeTransport::new().with_bytes(URL, body))
            .download(&DownloadRequest::new(URL, &dest))
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), body);
        assert_eq!(outcome.bytes, body.len() as u64);
        assert_eq!(outcome.backup, None);
        assert_eq!(dir_entries(temp.path()), vec!["plugin.jar"]);
    }

    #[tokio::test]
    async fn test_interrupted_download_leaves_destination_untouched() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("plugin.jar");
        std::fs::write(&dest, "previous artifact").unwrap();

        let transport = FakeTransport::new()
            .with_response(URL, FakeResponse::Interrupted(vec![b"partial ".to_vec(), b"bytes".to_vec()]));
        let err = downloader(transport).download(&DownloadRequest::new(URL, &dest)).await.unwrap_err();

        assert!(err.is_network());
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "previous artifact");
        assert_eq!(dir_entries(temp.path()), vec!["plugin.jar"]);
    }

    #[tokio::test]
    async fn test_checksum_mismatch_leaves_destination_untouched() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("plugin.jar");
        std::fs::write(&dest, "previous").unwrap();

        let mut request = DownloadRequest::new(URL, &dest);
        request.checksum = Some(ChecksumValidator::sha256("0".repeat(64)));
        let err = downloader(FakeTransport::new().with_bytes(URL, b"new bytes"))
            .download(&request)
            .await
            .unwrap_err();

        assert!(matches!(err, UpdaterError::ChecksumMismatch { .. }));
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "previous");
        assert_eq!(dir_entries(temp.path()), vec!["plugin.jar"]);
    }

    #[tokio::test]
    async fn test_stale_partial_files_are_removed() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("plugin.jar");
        std::fs::write(temp.path().join(".plugin.jar.Xy12Ab.part"), "left by a crash").unwrap();
        std::fs::write(temp.path().join(".plugin.jar.Xy12Ab.part.extract-Q9.part"), "half extracted").unwrap();
        std::fs::write(temp.path().join(".other.jar.Zz99Zz.part"), "another artifact").unwrap();

        downloader(FakeTransport::new().with_bytes(URL, b"fresh"))
            .download(&DownloadRequest::new(URL, &dest))
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "fresh");
        assert_eq!(dir_entries(temp.path()), vec![".other.jar.Zz99Zz.part", "plugin.jar"]);
    }

    #[tokio::test]
    async fn test_checksum_match_commits() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("plugin.jar");
        let mut request = DownloadRequest::new(URL, &dest);
        request.checksum = Some(ChecksumValidator::sha256(hex::encode(Sha256::digest(b"new bytes"))));

        downloader(FakeTransport::new().with_bytes(URL, b"new bytes")).download(&request).await.unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "new bytes");
    }

    #[tokio::test]
    async fn test_backup_before_overwrite_with_retention() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("plugins/plugin.jar");
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(&dest, "v0").unwrap();

        let transport = Arc::new(FakeTransport::new());
        let downloader = ArtifactDownloader::new(transport.clone());
        let policy = BackupPolicy {
            root: temp.path().join("backups"),
            source_id: "plugin".into(),
            retention: 3,
        };

        for i in 1..=5 {
            transport.route(URL, FakeResponse::Body(format!("v{i}").into_bytes()));
            let mut request = DownloadRequest::new(URL, &dest);
            request.backup = Some(policy.clone());
            let outcome = downloader.download(&request).await.unwrap();
            assert!(outcome.backup.is_some());
        }

        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "v5");
        let kept = BackupManager::new(policy).backups();
        let contents: Vec<String> = kept.iter().map(|p| std::fs::read_to_string(p).unwrap()).collect();
        assert_eq!(contents, vec!["v2", "v3", "v4"]);
    }

    #[tokio::test]
    async fn test_no_backup_for_first_install() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("plugin.jar");
        let mut request = DownloadRequest::new(URL, &dest);
        request.backup = Some(BackupPolicy {
            root: temp.path().join("backups"),
            source_id: "plugin".into(),
            retention: 3,
        });
        let outcome = downloader(FakeTransport::new().with_bytes(URL, b"x")).download(&request).await.unwrap();
        assert_eq!(outcome.backup, None);
    }

    #[tokio::test]
    async fn test_failed_transform_keeps_previous_artifact() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("plugin.jar");
        std::fs::write(&dest, "previous").unwrap();

        let mut request = DownloadRequest::new(URL, &dest);
        request.transform = Some(Arc::new(VerifyJar));
        let err = downloader(FakeTransport::new().with_bytes(URL, b"<html>oops</html>"))
            .download(&request)
            .await
            .unwrap_err();

        assert!(matches!(err, UpdaterError::Transform { .. }));
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "previous");
        assert_eq!(dir_entries(temp.path()), vec!["plugin.jar"]);
    }

    #[tokio::test]
    async fn test_http_error_creates_nothing() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("plugin.jar");
        let err = downloader(FakeTransport::new()).download(&DownloadRequest::new(URL, &dest)).await.unwrap_err();
        assert!(matches!(err, UpdaterError::HttpStatus { status: 404, .. }));
        assert!(dir_entries(temp.path()).is_empty());
    }

    struct StallingTransport;

    #[async_trait]
    impl HttpTransport for StallingTransport {
        async fn get_text(&self, _url: &str) -> Result<String, UpdaterError> {
            unreachable!()
        }

        async fn open_stream(&self, _url: &str) -> Result<StreamResponse, UpdaterError> {
            let first = futures::stream::iter(vec![Ok(b"abc".to_vec())]);
            Ok(StreamResponse {
                content_length: Some(10),
                stream: Box::pin(first.chain(futures::stream::pending())),
            })
        }
    }

    #[tokio::test]
    async fn test_read_timeout_between_chunks() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("plugin.jar");
        let mut request = DownloadRequest::new(URL, &dest);
        request.read_timeout = Duration::from_millis(50);

        let err = ArtifactDownloader::new(Arc::new(StallingTransport)).download(&request).await.unwrap_err();
        match err {
            UpdaterError::Network { message, .. } => assert!(message.contains("read timed out")),
            other => panic!("unexpected: {other}"),
        }
        assert!(dir_entries(temp.path()).is_empty());
    }
}
