//! Build-number resolution.
//!
//! The persisted state compares integers, not labels. A provider's chosen
//! label resolves to a build number in this order:
//!
//! 1. a trailing `-b<digits>` suffix in the label (`2.3.0-b412` → `412`)
//! 2. the provider's own numeric id, when it has one
//! 3. `abs(hash(id, label))`, stable across runs and platforms

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

static BUILD_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)-b(\d+)$").expect("build-suffix regex is valid"));

/// Extract a trailing `-b<digits>` build suffix.
pub fn extract_build_number(label: &str) -> Option<i64> {
    BUILD_SUFFIX
        .captures(label.trim())
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
}

/// The label without its trailing `-b<digits>` suffix.
pub fn strip_build_suffix(label: &str) -> &str {
    let trimmed = label.trim();
    match BUILD_SUFFIX.find(trimmed) {
        Some(m) => &trimmed[..m.start()],
        None => trimmed,
    }
}

/// Resolve the build number for a chosen candidate.
pub fn resolve_build_number(label: &str, id: Option<i64>) -> i64 {
    if let Some(build) = extract_build_number(label) {
        return build;
    }
    if let Some(id) = id {
        return id;
    }
    stable_hash(id, label)
}

fn stable_hash(id: Option<i64>, label: &str) -> i64 {
    let mut hasher = Sha256::new();
    hasher.update(id.map(|v| v.to_string()).unwrap_or_default().as_bytes());
    hasher.update(b":");
    hasher.update(label.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    // unsigned_abs keeps i64::MIN representable after the shift below
    (i64::from_be_bytes(bytes).unsigned_abs() >> 1) as i64
}
