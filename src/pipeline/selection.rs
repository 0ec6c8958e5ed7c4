//! Pending interactive asset selections.
//!
//! When a release offers several plausible files the run for that source is
//! suspended and parked here under the requester's identity. Other sources
//! keep running. The requester later answers with a 1-based index; a newer
//! suspension for the same requester replaces the older one.

use super::UpdateContext;
use crate::core::UpdaterError;
use crate::source::{AssetKind, ReleaseAsset};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, info};
use uuid::Uuid;

/// A suspended run waiting for a file choice.
#[derive(Debug, Clone)]
pub struct PendingSelection {
    /// Identifier shown to the requester
    pub id: Uuid,
    /// Suspended run
    pub context: UpdateContext,
    /// Ordered candidates
    pub candidates: Vec<ReleaseAsset>,
    /// Coarse classification of the candidates
    pub kind: AssetKind,
    /// Release the candidates belong to
    pub release_tag: String,
    /// When the run was suspended
    pub created_at: DateTime<Utc>,
}

impl PendingSelection {
    /// Park `context` with the candidates carried by an
    /// [`UpdaterError::AssetSelectionRequired`]. Any other error is returned
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns `error` itself when it is not a selection request.
    pub fn from_error(context: UpdateContext, error: UpdaterError) -> Result<Self, UpdaterError> {
        match error {
            UpdaterError::AssetSelectionRequired {
                release_tag,
                kind,
                candidates,
                ..
            } => Ok(Self {
                id: Uuid::new_v4(),
                context,
                candidates,
                kind,
                release_tag,
                created_at: Utc::now(),
            }),
            other => Err(other),
        }
    }

    /// Requester this selection belongs to.
    pub fn requester(&self) -> &str {
        &self.context.requester
    }

    /// Candidate at 1-based `index`.
    pub fn candidate(&self, index: usize) -> Option<&ReleaseAsset> {
        index.checked_sub(1).and_then(|i| self.candidates.get(i))
    }
}

/// Pending selections keyed by requester.
#[derive(Debug, Default)]
pub struct PendingSelections {
    by_requester: DashMap<String, PendingSelection>,
}

impl PendingSelections {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a selection, discarding any older one of the same requester.
    pub fn insert(&self, selection: PendingSelection) {
        let requester = selection.requester().to_string();
        info!(
            "Source '{}' needs a file choice from '{}' ({} candidates in {})",
            selection.context.source_name(),
            requester,
            selection.candidates.len(),
            selection.release_tag
        );
        if let Some(previous) = self.by_requester.insert(requester, selection) {
            debug!(
                "Discarded older selection {} for source '{}'",
                previous.id,
                previous.context.source_name()
            );
        }
    }

    /// Copy of the requester's pending selection.
    pub fn get(&self, requester: &str) -> Option<PendingSelection> {
        self.by_requester.get(requester).map(|entry| entry.value().clone())
    }

    /// Remove and return the requester's pending selection if `index` is a
    /// valid 1-based choice; otherwise leave it in place.
    ///
    /// # Errors
    ///
    /// [`UpdaterError::Configuration`] when nothing is pending or the index is
    /// out of range.
    pub fn take_choice(&self, requester: &str, index: usize) -> Result<(PendingSelection, ReleaseAsset), UpdaterError> {
        let removed = self
            .by_requester
            .remove_if(requester, |_, pending| pending.candidate(index).is_some());
        if let Some((_, selection)) = removed
            && let Some(asset) = selection.candidate(index).cloned()
        {
            return Ok((selection, asset));
        }
        match self.by_requester.get(requester) {
            Some(pending) => Err(UpdaterError::config(
                pending.context.source_name(),
                format!("choose a file between 1 and {}", pending.candidates.len()),
            )),
            None => Err(UpdaterError::config(requester, "no file selection is pending")),
        }
    }

    /// Drop the requester's pending selection.
    pub fn discard(&self, requester: &str) -> Option<PendingSelection> {
        self.by_requester.remove(requester).map(|(_, selection)| selection)
    }

    /// Number of pending selections.
    pub fn len(&self) -> usize {
        self.by_requester.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.by_requester.is_empty()
    }

    /// Requesters with a pending selection.
    pub fn requesters(&self) -> Vec<String> {
        self.by_requester.iter().map(|entry| entry.key().clone()).collect()
    }
}
