//! Structured observability hooks for the sync lifecycle.
//!
//! This module provides:
//! - An event-scoped tracing span via the `EventSpan` RAII guard
//! - Emission functions for key lifecycle points: config validated, target
//!   resolved, ids aggregated, story updated, title annotated
//!
//! Events are emitted at `info!` level unless noted. For JSON output pass
//! `--json` to the CLI.

use tracing::info;

use crate::domain::event::EventDescriptor;
use crate::marker::StoryId;

/// RAII guard that enters an event-scoped tracing span.
///
/// # Example
///
/// ```ignore
/// let _span = EventSpan::enter(&descriptor);
/// // every log line now carries kind=push branch=feature/sc-1
/// ```
pub struct EventSpan {
    _span: tracing::span::EnteredSpan,
}

impl EventSpan {
    pub fn enter(descriptor: &EventDescriptor) -> Self {
        Self {
            _span: event_span(descriptor).entered(),
        }
    }
}

/// Event-scoped span for async work; attach with `Instrument::instrument`.
pub fn event_span(descriptor: &EventDescriptor) -> tracing::Span {
    tracing::info_span!(
        "storylink.event",
        kind = %descriptor.kind,
        sub_type = ?descriptor.sub_type,
        branch = %descriptor.branch,
    )
}

/// Emit event: rule table validated.
pub fn emit_config_validated(rules: usize, findings: usize, passed: bool) {
    info!(
        event = "config.validated",
        rules = rules,
        findings = findings,
        passed = passed,
    );
}

/// Emit event: target resolved (or not) for the current event.
pub fn emit_target_resolved(target: Option<&str>, rule_index: Option<usize>) {
    match target {
        Some(target) => info!(event = "target.resolved", column = %target, rule_index = ?rule_index),
        None => info!(event = "target.none", "no rule matches this event"),
    }
}

/// Emit event: story ids aggregated across sources.
pub fn emit_identifiers_aggregated(primary: Option<StoryId>, total: usize) {
    info!(
        event = "ids.aggregated",
        primary = ?primary.map(|id| id.0),
        total = total,
    );
}

/// Emit event: a story was moved to its target column.
pub fn emit_story_updated(story: StoryId, target: &str) {
    info!(event = "story.updated", story = story.0, column = %target);
}

/// Emit event: moving a story failed (warning level).
pub fn emit_story_update_failed(story: StoryId, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "story.update_failed", story = story.0, error = %error);
}

/// Emit event: pull-request title annotated with the story marker.
pub fn emit_title_annotated(pull_request: u64, title: &str) {
    info!(event = "title.annotated", pull_request = pull_request, title = %title);
}
