//! Event-to-story sync orchestration.
//!
//! [`StorySync::run`] drives one event through the whole flow:
//!
//! 1. resolve the target column from the rule table
//! 2. gather story ids from the branch, the head commit, pull-request commits
//!    (push) or release notes (release)
//! 3. aggregate them by precedence
//! 4. move every story to the target, concurrently
//! 5. annotate the pull-request title with the primary id
//!
//! Collaborator failures while gathering degrade to "no ids from that
//! source". Failures while updating are collected per story and never stop
//! the remaining updates.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn, Instrument};

use crate::aggregate::{aggregate, AggregatedIds, IdentifierSources};
use crate::branch::BranchIdPattern;
use crate::collaborators::{VersionControlHost, WorkTracker};
use crate::domain::event::EventKind;
use crate::domain::rule::RuleTable;
use crate::marker::{annotate_title, extract_all, extract_one, StoryId};
use crate::matcher::{resolve_target, Target};
use crate::metrics::METRICS;
use crate::obs;
use crate::webhook::EventContext;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// A story that could not be moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryUpdateFailure {
    pub story: StoryId,
    pub error: String,
}

/// What happened to the pull-request title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TitleUpdate {
    /// Not a pull-request event, no primary id, or annotation disabled.
    NotApplicable,
    AlreadyAnnotated,
    Updated { title: String },
    Failed { error: String },
}

/// Result of a sync that reached the update step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub target: Target,
    pub ids: AggregatedIds,
    pub updated: Vec<StoryId>,
    pub failed: Vec<StoryUpdateFailure>,
    pub title: TitleUpdate,
}

impl SyncReport {
    /// True when every story moved and the title step did not fail.
    pub fn passed(&self) -> bool {
        self.failed.is_empty() && !matches!(self.title, TitleUpdate::Failed { .. })
    }
}

/// Outcome of [`StorySync::run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// No rule matches the event.
    NoTarget,
    /// A rule matched but no story id was found.
    NothingToUpdate { target: Target },
    Updated(SyncReport),
}

impl SyncOutcome {
    pub fn target(&self) -> Option<&Target> {
        match self {
            SyncOutcome::NoTarget => None,
            SyncOutcome::NothingToUpdate { target } => Some(target),
            SyncOutcome::Updated(report) => Some(&report.target),
        }
    }
}

// ---------------------------------------------------------------------------
// StorySync
// ---------------------------------------------------------------------------

/// Links host events to tracker stories.
pub struct StorySync {
    host: Arc<dyn VersionControlHost>,
    tracker: Arc<dyn WorkTracker>,
    table: RuleTable,
    pattern: BranchIdPattern,
    annotate_titles: bool,
}

impl StorySync {
    pub fn new(
        host: Arc<dyn VersionControlHost>,
        tracker: Arc<dyn WorkTracker>,
        table: RuleTable,
    ) -> Self {
        Self {
            host,
            tracker,
            table,
            pattern: BranchIdPattern::default(),
            annotate_titles: true,
        }
    }

    pub fn with_branch_pattern(mut self, pattern: BranchIdPattern) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn with_title_annotation(mut self, enabled: bool) -> Self {
        self.annotate_titles = enabled;
        self
    }

    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    /// Run the full flow for one event.
    pub async fn run(&self, ctx: &EventContext) -> SyncOutcome {
        self.run_inner(ctx)
            .instrument(obs::event_span(&ctx.descriptor))
            .await
    }

    async fn run_inner(&self, ctx: &EventContext) -> SyncOutcome {
        METRICS.inc_events_processed();

        let target = resolve_target(&ctx.descriptor, &self.table);
        obs::emit_target_resolved(
            target.as_ref().map(|t| t.id.as_str()),
            target.as_ref().map(|t| t.rule_index),
        );
        let Some(target) = target else {
            return SyncOutcome::NoTarget;
        };
        METRICS.inc_targets_resolved();

        let sources = self.gather(ctx).await;
        let ids = aggregate(&sources);
        obs::emit_identifiers_aggregated(ids.primary, ids.all.len());
        if ids.is_empty() {
            return SyncOutcome::NothingToUpdate { target };
        }

        let (updated, failed) = self.move_stories(&ids.all, &target).await;
        let title = self.annotate(ctx, ids.primary).await;

        SyncOutcome::Updated(SyncReport {
            target,
            ids,
            updated,
            failed,
            title,
        })
    }

    /// Collect ids from every source that applies to `ctx`.
    pub async fn gather(&self, ctx: &EventContext) -> IdentifierSources {
        let kind = ctx.descriptor.kind;
        let mut sources = IdentifierSources::new(kind);
        sources.from_branch = self.pattern.extract(&ctx.descriptor.branch);

        if sources.from_branch.is_none() {
            if let Some(sha) = ctx.sha.as_deref() {
                sources.from_commit_message = match self.host.commit_message(sha).await {
                    Ok(message) => extract_one(&message),
                    Err(e) => {
                        warn!(sha = %sha, error = %e, "cannot read commit message");
                        None
                    }
                };
            }
        }

        match kind {
            EventKind::Push => {
                if let Some(sha) = ctx.sha.as_deref() {
                    sources.from_pull_request_commits = self.pull_request_commit_ids(sha).await;
                }
            }
            EventKind::Release => {
                sources.from_release_body = self.release_body_ids(ctx).await;
            }
            EventKind::PullRequest | EventKind::PullRequestReview => {}
        }

        debug!(?sources, "identifier sources gathered");
        sources
    }

    async fn pull_request_commit_ids(&self, sha: &str) -> Vec<StoryId> {
        let numbers = match self.host.pull_requests_for_commit(sha).await {
            Ok(numbers) => numbers,
            Err(e) => {
                warn!(sha = %sha, error = %e, "cannot list pull requests for commit");
                return Vec::new();
            }
        };

        let fetches = numbers
            .iter()
            .map(|&number| self.host.pull_request_commit_messages(number));
        let results = join_all(fetches).await;

        numbers
            .iter()
            .zip(results)
            .flat_map(|(number, result)| match result {
                Ok(messages) => messages,
                Err(e) => {
                    warn!(pull_request = number, error = %e, "cannot read pull request commits");
                    Vec::new()
                }
            })
            .flat_map(|message| extract_all(&message))
            .collect()
    }

    async fn release_body_ids(&self, ctx: &EventContext) -> Vec<StoryId> {
        if let Some(body) = ctx.release_body.as_deref() {
            return extract_all(body);
        }
        match self.host.latest_release_body().await {
            Ok(body) => body.as_deref().map(extract_all).unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "cannot read latest release");
                Vec::new()
            }
        }
    }

    async fn move_stories(
        &self,
        stories: &[StoryId],
        target: &Target,
    ) -> (Vec<StoryId>, Vec<StoryUpdateFailure>) {
        let moves = stories
            .iter()
            .map(|&story| self.tracker.move_story(story, &target.id));
        let results = join_all(moves).await;

        let mut updated = Vec::new();
        let mut failed = Vec::new();
        for (&story, result) in stories.iter().zip(results) {
            match result {
                Ok(()) => {
                    METRICS.inc_stories_updated();
                    obs::emit_story_updated(story, target.id.as_str());
                    updated.push(story);
                }
                Err(e) => {
                    METRICS.inc_update_failures();
                    obs::emit_story_update_failed(story, &e);
                    failed.push(StoryUpdateFailure {
                        story,
                        error: e.to_string(),
                    });
                }
            }
        }
        (updated, failed)
    }

    async fn annotate(&self, ctx: &EventContext, primary: Option<StoryId>) -> TitleUpdate {
        if !self.annotate_titles {
            return TitleUpdate::NotApplicable;
        }
        let (Some(number), Some(id)) = (ctx.pull_request, primary) else {
            return TitleUpdate::NotApplicable;
        };

        let current = match self.host.pull_request_title(number).await {
            Ok(title) => title,
            Err(e) => {
                warn!(pull_request = number, error = %e, "cannot read pull request title");
                return TitleUpdate::Failed {
                    error: e.to_string(),
                };
            }
        };
        let Some(title) = annotate_title(&current, id) else {
            return TitleUpdate::AlreadyAnnotated;
        };

        match self.host.update_pull_request_title(number, &title).await {
            Ok(()) => {
                obs::emit_title_annotated(number, &title);
                TitleUpdate::Updated { title }
            }
            Err(e) => {
                warn!(pull_request = number, error = %e, "pull request title could not be updated");
                TitleUpdate::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}
