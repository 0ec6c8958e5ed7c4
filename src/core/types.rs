//! Small value types that cross module boundaries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Directory an updated artifact is written into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TargetDirectory {
    /// The host installation root (the host's own binary lives here).
    #[serde(rename = "HOST_ROOT", alias = "host_root", alias = "ROOT", alias = "root")]
    HostRoot,
    /// The host's add-on directory.
    #[default]
    #[serde(rename = "ADDON_DIR", alias = "addon_dir", alias = "PLUGINS", alias = "plugins")]
    AddonDir,
}

impl TargetDirectory {
    /// Resolve this target against the host layout.
    pub fn resolve(self, host_root: &Path, addon_dir: &Path) -> PathBuf {
        match self {
            Self::HostRoot => host_root.to_path_buf(),
            Self::AddonDir => addon_dir.to_path_buf(),
        }
    }
}

impl fmt::Display for TargetDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HostRoot => f.write_str("HOST_ROOT"),
            Self::AddonDir => f.write_str("ADDON_DIR"),
        }
    }
}

impl FromStr for TargetDirectory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HOST_ROOT" | "ROOT" => Ok(Self::HostRoot),
            "ADDON_DIR" | "PLUGINS" => Ok(Self::AddonDir),
            other => Err(format!("unknown target directory '{other}'")),
        }
    }
}

/// Build marker persisted after a successful install of one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedBuildRecord {
    /// Monotonic build number of the installed artifact
    pub build: i64,
    /// Human-readable version label of the installed artifact
    pub version: String,
}

impl PersistedBuildRecord {
    /// Merge a freshly installed build into this record.
    ///
    /// The build number never decreases; the version label always follows the
    /// latest install.
    #[must_use]
    pub fn advance(&self, build: i64, version: &str) -> Self {
        Self {
            build: self.build.max(build),
            version: version.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_directory_parsing() {
        assert_eq!("HOST_ROOT".parse::<TargetDirectory>().unwrap(), TargetDirectory::HostRoot);
        assert_eq!("addon_dir".parse::<TargetDirectory>().unwrap(), TargetDirectory::AddonDir);
        assert!("elsewhere".parse::<TargetDirectory>().is_err());
    }

    #[test]
    fn test_target_directory_resolve() {
        let root = Path::new("/srv/host");
        let addons = Path::new("/srv/host/plugins");
        assert_eq!(TargetDirectory::HostRoot.resolve(root, addons), root);
        assert_eq!(TargetDirectory::AddonDir.resolve(root, addons), addons);
    }

    #[test]
    fn test_record_build_never_decreases() {
        let record = PersistedBuildRecord { build: 40, version: "1.2.0".into() };
        let advanced = record.advance(12, "1.2.1");
        assert_eq!(advanced.build, 40);
        assert_eq!(advanced.version, "1.2.1");
        assert_eq!(record.advance(41, "1.3.0").build, 41);
    }
}
