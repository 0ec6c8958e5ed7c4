//! Error handling for updraft
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** ([`UpdaterError`]) at every seam the update
//!    pipeline crosses, so the scheduler can decide per variant whether a
//!    failure is retried, logged once, or suspends a source.
//! 2. **User-friendly messages** ([`ErrorContext`]) for the CLI, with details
//!    and an actionable suggestion.
//!
//! # Error Categories
//!
//! - **Transport**: [`UpdaterError::Network`], [`UpdaterError::HttpStatus`]
//! - **Provider data**: [`UpdaterError::Parse`], [`UpdaterError::NoEligibleCandidate`]
//! - **Interactive**: [`UpdaterError::AssetSelectionRequired`] is not a failure.
//!   It suspends one source until a requester picks an asset.
//! - **Integrity**: [`UpdaterError::ChecksumMismatch`], [`UpdaterError::Transform`]
//! - **Setup**: [`UpdaterError::Configuration`], [`UpdaterError::Persistence`]
//!
//! # Examples
//!
//! ```rust,no_run
//! use updraft::core::{UpdaterError, user_friendly_error};
//!
//! let error = UpdaterError::HttpStatus {
//!     url: "https://api.example.com/projects/paper".to_string(),
//!     status: 503,
//!     body: "maintenance".to_string(),
//! };
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display();
//! ```

use crate::source::assets::{AssetKind, ReleaseAsset};
use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for update resolution and delivery.
///
/// Providers, the downloader and the pipeline steps all return this type so
/// that the scheduler can classify a failure without string matching.
#[derive(Error, Debug)]
pub enum UpdaterError {
    /// The remote host could not be reached (DNS, refused connection, timeout).
    ///
    /// Retried automatically on the next cycle; the scheduler logs it once
    /// until a cycle completes without connectivity problems.
    #[error("Network error while contacting {url}: {message}")]
    Network {
        /// URL that was being requested
        url: String,
        /// Underlying transport message
        message: String,
    },

    /// The server answered with a non-2xx status.
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// URL that was being requested
        url: String,
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// The response could not be decoded into the expected shape.
    #[error("Failed to parse response from {url}: {message}")]
    Parse {
        /// URL (or file) whose content was malformed
        url: String,
        /// Decoder message
        message: String,
    },

    /// Every candidate was filtered out by the provider's eligibility rules.
    ///
    /// Fatal for the current cycle of this source only.
    #[error("No eligible build found for '{source_name}': {reason}")]
    NoEligibleCandidate {
        /// Name of the source being resolved
        source_name: String,
        /// Why nothing qualified
        reason: String,
    },

    /// A release exposes several plausible files and no selector is configured.
    ///
    /// This is a suspension, not a failure: the candidates are handed to a
    /// requester who resolves them with a 1-based index.
    #[error("Release '{release_tag}' has {} candidate files; a selection is required", candidates.len())]
    AssetSelectionRequired {
        /// Tag or label of the release the candidates belong to
        release_tag: String,
        /// Coarse classification of the candidates
        kind: AssetKind,
        /// Ordered candidate list shown to the requester
        candidates: Vec<ReleaseAsset>,
        /// Version label of the release
        version: String,
        /// Build number of the release
        build: i64,
    },

    /// The downloaded bytes did not match the published digest.
    #[error("Checksum mismatch for {url}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// URL the artifact was downloaded from
        url: String,
        /// Digest advertised by the provider
        expected: String,
        /// Digest computed while streaming
        actual: String,
    },

    /// A source definition or provider option is invalid.
    #[error("Configuration error for '{source_name}': {message}")]
    Configuration {
        /// Name of the offending source entry
        source_name: String,
        /// Description of the problem
        message: String,
    },

    /// The persisted build state could not be read or written.
    #[error("Failed to persist update state at {path}: {message}")]
    Persistence {
        /// Path of the state file
        path: String,
        /// Underlying failure
        message: String,
    },

    /// A post-download transform rejected or failed to rewrite the artifact.
    #[error("Post-download transform '{transform}' failed: {message}")]
    Transform {
        /// Name of the transform
        transform: String,
        /// Failure description
        message: String,
    },

    /// Local filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UpdaterError {
    /// Shorthand for a [`UpdaterError::Configuration`].
    pub fn config(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a [`UpdaterError::NoEligibleCandidate`].
    pub fn no_candidate(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NoEligibleCandidate {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`UpdaterError::Parse`].
    pub fn parse(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Parse {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Whether this error means the remote host was unreachable.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// Whether this error suspends the source instead of failing it.
    pub fn is_selection_required(&self) -> bool {
        matches!(self, Self::AssetSelectionRequired { .. })
    }

    /// Whether this error must abort the run even though it is not a
    /// transport problem.
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(self, Self::ChecksumMismatch { .. } | Self::Persistence { .. })
    }
}

/// Error wrapper with a user-facing explanation.
///
/// Mirrors the layout printed by the CLI: the error line in red, optional
/// details in yellow and an optional suggestion in green.
#[derive(Debug)]
pub struct ErrorContext {
    /// Primary message
    pub message: String,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new context from a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining the error.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the context to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.message);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`].
///
/// Recognizes [`UpdaterError`] variants, [`std::io::Error`] and TOML decode
/// errors anywhere in the `anyhow` chain; everything else is shown with its
/// full context chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(updater_error) = error.chain().find_map(|c| c.downcast_ref::<UpdaterError>()) {
        let ctx = create_error_context(updater_error);
        // Wrapped errors carry the caller's context; show the whole chain.
        return if error.chain().count() > 1 {
            ctx.with_details(format!("{error:#}"))
        } else {
            ctx
        };
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        return match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => ErrorContext::new(error.to_string())
                .with_suggestion("Check that the host directories are writable by this user"),
            std::io::ErrorKind::NotFound => ErrorContext::new(error.to_string())
                .with_suggestion("Check that the configured host root and add-on directory exist"),
            _ => ErrorContext::new(error.to_string()),
        };
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new("Invalid TOML syntax")
            .with_details(toml_error.to_string())
            .with_suggestion("Check the configuration file for unbalanced quotes or brackets");
    }

    ErrorContext::new(format!("{error:#}"))
}

fn create_error_context(error: &UpdaterError) -> ErrorContext {
    let ctx = ErrorContext::new(error.to_string());
    match error {
        UpdaterError::Network { .. } => ctx
            .with_suggestion("Check your internet connection; the source is retried next cycle"),
        UpdaterError::HttpStatus { status, body, .. } => {
            let ctx = if body.is_empty() { ctx } else { ctx.with_details(body.clone()) };
            match status {
                404 => ctx.with_suggestion("Verify the project, owner or job name in the source options"),
                403 | 429 => ctx.with_suggestion("The API is rate limiting requests; increase updates.interval_secs"),
                _ => ctx,
            }
        }
        UpdaterError::NoEligibleCandidate { .. } => ctx.with_suggestion(
            "Relax the source filters (game_versions, loaders, channel) or set updates.ignore_unstable = false",
        ),
        UpdaterError::AssetSelectionRequired { candidates, .. } => ctx
            .with_details(
                candidates
                    .iter()
                    .enumerate()
                    .map(|(i, asset)| format!("  {}. {}", i + 1, asset.name))
                    .collect::<Vec<_>>()
                    .join("\n"),
            )
            .with_suggestion("Run 'updraft check --interactive' or set an asset_pattern option"),
        UpdaterError::ChecksumMismatch { .. } => ctx
            .with_details("The previously installed artifact was left untouched")
            .with_suggestion("Retry later; a persistent mismatch usually means a broken upload"),
        UpdaterError::Configuration { .. } => {
            ctx.with_suggestion("Fix the entry under [updates.sources] in the configuration file")
        }
        UpdaterError::Persistence { .. } => {
            ctx.with_suggestion("Check permissions on the state file and its directory")
        }
        UpdaterError::Parse { .. } | UpdaterError::Transform { .. } | UpdaterError::Io(_) => ctx,
    }
}
