//! Core types shared by every layer of updraft.
//!
//! - [`error`] - the [`UpdaterError`] taxonomy and CLI-facing [`ErrorContext`]
//! - [`types`] - source identity types ([`TargetDirectory`], [`PersistedBuildRecord`])

pub mod error;
pub mod types;

pub use error::{ErrorContext, UpdaterError, user_friendly_error};
pub use types::{PersistedBuildRecord, TargetDirectory};
