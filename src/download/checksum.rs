use crate::core::UpdaterError;
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Digest algorithms published by the supported providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    /// SHA-256 (release archives, marketplaces)
    Sha256,
    /// SHA-512 (search-style APIs)
    Sha512,
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => f.write_str("sha256"),
            Self::Sha512 => f.write_str("sha512"),
        }
    }
}

/// Expected digest of a download.
///
/// Validation is performed on the temporary file before it replaces the
/// destination, so a mismatch never touches the installed artifact.
///
/// ```rust
/// use updraft::download::ChecksumValidator;
///
/// let validator = ChecksumValidator::parse("sha256:DFFD6021BB2BD5B0AF676290809EC3A53191DD81C7F70A4B28688A362182986F").unwrap();
/// let mut digest = validator.digest();
/// digest.update(b"Hello, World!");
/// assert!(validator.verify("https://example.com/a.jar", &digest.finalize_hex()).is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumValidator {
    algorithm: ChecksumAlgorithm,
    expected: String,
}

impl ChecksumValidator {
    /// Expect a hex SHA-256 digest.
    pub fn sha256(expected: impl AsRef<str>) -> Self {
        Self {
            algorithm: ChecksumAlgorithm::Sha256,
            expected: expected.as_ref().trim().to_ascii_lowercase(),
        }
    }

    /// Expect a hex SHA-512 digest.
    pub fn sha512(expected: impl AsRef<str>) -> Self {
        Self {
            algorithm: ChecksumAlgorithm::Sha512,
            expected: expected.as_ref().trim().to_ascii_lowercase(),
        }
    }

    /// Parse `sha256:<hex>` / `sha512:<hex>`, or bare hex whose length names
    /// the algorithm. Returns `None` for anything else.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let (algorithm, hex_digest) = match value.split_once(':') {
            Some((name, digest)) => match name.to_ascii_lowercase().as_str() {
                "sha256" => (ChecksumAlgorithm::Sha256, digest),
                "sha512" => (ChecksumAlgorithm::Sha512, digest),
                _ => return None,
            },
            None => match value.len() {
                64 => (ChecksumAlgorithm::Sha256, value),
                128 => (ChecksumAlgorithm::Sha512, value),
                _ => return None,
            },
        };
        let expected_len = match algorithm {
            ChecksumAlgorithm::Sha256 => 64,
            ChecksumAlgorithm::Sha512 => 128,
        };
        if hex_digest.len() != expected_len || hex::decode(hex_digest).is_err() {
            return None;
        }
        Some(Self {
            algorithm,
            expected: hex_digest.to_ascii_lowercase(),
        })
    }

    /// Digest algorithm.
    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Expected lowercase hex digest.
    pub fn expected(&self) -> &str {
        &self.expected
    }

    /// Fresh streaming digest for this algorithm.
    pub fn digest(&self) -> StreamingDigest {
        match self.algorithm {
            ChecksumAlgorithm::Sha256 => StreamingDigest::Sha256(Sha256::new()),
            ChecksumAlgorithm::Sha512 => StreamingDigest::Sha512(Sha512::new()),
        }
    }

    /// Compare a computed hex digest against the expected one.
    ///
    /// # Errors
    ///
    /// [`UpdaterError::ChecksumMismatch`] when they differ.
    pub fn verify(&self, url: &str, actual_hex: &str) -> Result<(), UpdaterError> {
        if actual_hex.eq_ignore_ascii_case(&self.expected) {
            debug!("{} checksum verified for {}", self.algorithm, url);
            Ok(())
        } else {
            Err(UpdaterError::ChecksumMismatch {
                url: url.to_string(),
                expected: format!("{}:{}", self.algorithm, self.expected),
                actual: format!("{}:{}", self.algorithm, actual_hex.to_ascii_lowercase()),
            })
        }
    }

    /// Hash a file on disk and verify it.
    ///
    /// # Errors
    ///
    /// I/O failures or [`UpdaterError::ChecksumMismatch`].
    pub async fn verify_file(&self, path: &Path) -> Result<(), UpdaterError> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut digest = self.digest();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            digest.update(&buf[..n]);
        }
        self.verify(&path.display().to_string(), &digest.finalize_hex())
    }
}

impl fmt::Display for ChecksumValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.expected)
    }
}

/// Digest fed chunk by chunk while a download streams to disk.
#[derive(Clone)]
pub enum StreamingDigest {
    /// SHA-256 state
    Sha256(Sha256),
    /// SHA-512 state
    Sha512(Sha512),
}

impl StreamingDigest {
    /// Feed bytes.
    pub fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(bytes),
            Self::Sha512(h) => h.update(bytes),
        }
    }

    /// Finish and return the lowercase hex digest.
    pub fn finalize_hex(self) -> String {
        match self {
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Sha512(h) => hex::encode(h.finalize()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HELLO_SHA256: &str = "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f";

    #[test]
    fn test_parse_forms() {
        let prefixed = ChecksumValidator::parse(&format!("sha256:{HELLO_SHA256}")).unwrap();
        assert_eq!(prefixed.algorithm(), ChecksumAlgorithm::Sha256);
        assert_eq!(ChecksumValidator::parse(HELLO_SHA256).unwrap(), prefixed);
        assert_eq!(ChecksumValidator::parse(&"a".repeat(128)).unwrap().algorithm(), ChecksumAlgorithm::Sha512);
        assert!(ChecksumValidator::parse("md5:abc").is_none());
        assert!(ChecksumValidator::parse("sha256:zz").is_none());
        assert!(ChecksumValidator::parse("").is_none());
    }

    #[test]
    fn test_verify_case_insensitive() {
        let validator = ChecksumValidator::sha256(HELLO_SHA256.to_uppercase());
        let mut digest = validator.digest();
        digest.update(b"Hello, ");
        digest.update(b"World!");
        validator.verify("u", &digest.finalize_hex()).unwrap();
    }

    #[test]
    fn test_mismatch_reports_both_digests() {
        let validator = ChecksumValidator::sha256("0".repeat(64));
        let err = validator.verify("https://x/a.jar", HELLO_SHA256).unwrap_err();
        match err {
            UpdaterError::ChecksumMismatch { url, expected, actual } => {
                assert_eq!(url, "https://x/a.jar");
                assert!(expected.starts_with("sha256:000"));
                assert_eq!(actual, format!("sha256:{HELLO_SHA256}"));
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[tokio::test]
    async fn test_verify_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"Hello, World!").unwrap();
        ChecksumValidator::sha256(HELLO_SHA256).verify_file(file.path()).await.unwrap();

        let sha512 = ChecksumValidator::sha512("f".repeat(128));
        assert!(matches!(
            sha512.verify_file(file.path()).await,
            Err(UpdaterError::ChecksumMismatch { .. })
        ));
    }
}
