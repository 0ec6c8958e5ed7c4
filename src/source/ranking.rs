//! The total order used to pick "latest eligible build".
//!
//! Candidates are compared by:
//!
//! 1. priority bucket, lower first (pinned releases, exact target match)
//! 2. publish timestamp, later first (missing timestamps sort last)
//! 3. label, by [`VersionComparator::compare_tokens`]
//! 4. numeric id, larger first; the final deterministic tie-break

use crate::version::VersionComparator;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// Sort key of one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankKey {
    /// Priority bucket; `0` is the most preferred
    pub bucket: u8,
    /// Publish time
    pub published: Option<DateTime<Utc>>,
    /// Version label
    pub label: String,
    /// Provider id
    pub id: i64,
}

impl RankKey {
    /// Compare two keys; `Greater` means `self` is the better candidate.
    pub fn preference(&self, other: &Self) -> Ordering {
        other
            .bucket
            .cmp(&self.bucket)
            .then_with(|| self.published.cmp(&other.published))
            .then_with(|| VersionComparator::compare_tokens(&self.label, &other.label))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Running best across one or more pages of candidates.
#[derive(Debug)]
pub struct BestCandidate<T> {
    best: Option<(RankKey, T)>,
    seen: usize,
}

impl<T> Default for BestCandidate<T> {
    fn default() -> Self {
        Self { best: None, seen: 0 }
    }
}

impl<T> BestCandidate<T> {
    /// Empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer an eligible candidate; keeps it if it beats the current best.
    pub fn offer(&mut self, key: RankKey, item: T) {
        self.seen += 1;
        let replace = match &self.best {
            None => true,
            Some((current, _)) => key.preference(current) == Ordering::Greater,
        };
        if replace {
            self.best = Some((key, item));
        }
    }

    /// Number of eligible candidates offered so far.
    pub fn seen(&self) -> usize {
        self.seen
    }

    /// The winner, if any candidate was offered.
    pub fn into_best(self) -> Option<(RankKey, T)> {
        self.best
    }
}

/// Target-version compatibility rule of a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetVersions {
    /// Explicit allow-list from the source options
    AllowList(Vec<String>),
    /// The running host version
    Host(String),
    /// No constraint
    Any,
}

impl TargetVersions {
    /// Allow-list when configured, else the host version, else unconstrained.
    pub fn from_preferences(allow_list: Vec<String>, host_version: Option<&str>) -> Self {
        if !allow_list.is_empty() {
            Self::AllowList(allow_list)
        } else if let Some(host) = host_version.filter(|v| !v.trim().is_empty()) {
            Self::Host(host.to_string())
        } else {
            Self::Any
        }
    }

    /// Priority bucket of a candidate that targets `supported` versions.
    ///
    /// `Some(0)` for an exact match, `Some(1)` for a same `major.minor`
    /// family match, `None` when incompatible. Unconstrained targets and
    /// candidates that declare no versions always match with bucket `0`.
    pub fn match_bucket(&self, supported: &[String]) -> Option<u8> {
        let wanted: &[String] = match self {
            Self::Any => return Some(0),
            Self::AllowList(list) => list,
            Self::Host(host) => std::slice::from_ref(host),
        };
        if supported.is_empty() {
            return Some(0);
        }

        let exact = supported.iter().any(|s| {
            wanted
                .iter()
                .any(|w| VersionComparator::compare_dotted(s, w) == Ordering::Equal && has_digits(s))
        });
        if exact {
            return Some(0);
        }
        let family = supported
            .iter()
            .any(|s| wanted.iter().any(|w| VersionComparator::same_family(s, w)));
        family.then_some(1)
    }
}

fn has_digits(s: &str) -> bool {
    VersionComparator::has_numeric_tokens(s)
}
