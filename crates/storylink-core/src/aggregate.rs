//! Story-id aggregation across sources.
//!
//! Precedence for the **primary** id (used for single-target updates such as
//! annotating a pull-request title): branch name, then commit message.
//!
//! The **full** list is the primary id followed by pull-request commit ids
//! (push events only) and release-body ids (release events only). Duplicates
//! are kept: each occurrence is an independent reference and callers doing
//! idempotent updates may collapse them.

use serde::{Deserialize, Serialize};

use crate::branch::BranchIdPattern;
use crate::domain::event::EventKind;
use crate::marker::{extract_all, extract_one, StoryId};

/// Identifiers already extracted from each source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierSources {
    pub event_kind: EventKind,
    pub from_branch: Option<StoryId>,
    pub from_commit_message: Option<StoryId>,
    #[serde(default)]
    pub from_pull_request_commits: Vec<StoryId>,
    #[serde(default)]
    pub from_release_body: Vec<StoryId>,
}

impl IdentifierSources {
    pub fn new(event_kind: EventKind) -> Self {
        Self {
            event_kind,
            from_branch: None,
            from_commit_message: None,
            from_pull_request_commits: Vec::new(),
            from_release_body: Vec::new(),
        }
    }

    /// Build sources from raw text.
    ///
    /// `pull_request_commits` holds one list of commit messages per pull
    /// request, in pull-request order.
    pub fn collect<S: AsRef<str>>(
        event_kind: EventKind,
        branch: &str,
        pattern: &BranchIdPattern,
        commit_message: Option<&str>,
        pull_request_commits: &[Vec<S>],
        release_body: Option<&str>,
    ) -> Self {
        Self {
            event_kind,
            from_branch: pattern.extract(branch),
            from_commit_message: commit_message.and_then(extract_one),
            from_pull_request_commits: pull_request_commits
                .iter()
                .flatten()
                .flat_map(|message| extract_all(message.as_ref()))
                .collect(),
            from_release_body: release_body.map(extract_all).unwrap_or_default(),
        }
    }
}

/// The aggregation result.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AggregatedIds {
    pub primary: Option<StoryId>,
    pub all: Vec<StoryId>,
}

impl AggregatedIds {
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

/// Combine `sources` by precedence.
pub fn aggregate(sources: &IdentifierSources) -> AggregatedIds {
    let primary = sources.from_branch.or(sources.from_commit_message);

    let mut all: Vec<StoryId> = primary.into_iter().collect();
    if sources.event_kind == EventKind::Push {
        all.extend_from_slice(&sources.from_pull_request_commits);
    }
    if sources.event_kind == EventKind::Release {
        all.extend_from_slice(&sources.from_release_body);
    }

    AggregatedIds { primary, all }
}
