//! Version ordering for update decisions.
//!
//! Release-hosting APIs label builds inconsistently (`1.20.1`, `v2.3.0-beta`,
//! `build-412`, `5.2.0-SNAPSHOT-b88`). Instead of forcing those into semantic
//! versions, updraft orders labels with two pure comparators:
//!
//! - [`VersionComparator::compare_dotted`] - coarse dotted-numeric ordering used
//!   for host-version checks (`1.20` vs `1.20.1`).
//! - [`VersionComparator::compare_tokens`] - extracts every digit run regardless
//!   of separator and compares the sequences after zero-padding. Used to rank
//!   candidate releases and files.
//!
//! The [`build`] submodule resolves the integer build number that the
//! persisted state is keyed on.

pub mod build;
pub mod comparison;

pub use build::{extract_build_number, resolve_build_number, strip_build_suffix};
pub use comparison::VersionComparator;
