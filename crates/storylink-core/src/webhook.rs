//! Webhook payload decoding.
//!
//! Turns the raw JSON a version-control host delivers (plus the event name
//! from the `X-GitHub-Event` header or `GITHUB_EVENT_NAME`) into an
//! [`EventContext`]: the normalized [`EventDescriptor`] plus the few extra
//! facts the sync step needs (commit sha, pull-request number, release body).
//!
//! Raw payload structs only name the fields we read; everything else in the
//! payload is ignored.

use serde::{Deserialize, Serialize};

use crate::domain::error::EventError;
use crate::domain::event::{EventDescriptor, EventKind, EventSubType};

const BRANCH_REF_PREFIX: &str = "refs/heads/";
const TAG_REF_PREFIX: &str = "refs/tags/";

/// A decoded event with the context needed to gather story ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContext {
    pub descriptor: EventDescriptor,
    /// Commit the event is about (push head, pull-request head).
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub pull_request: Option<u64>,
    #[serde(default)]
    pub release_body: Option<String>,
}

impl EventContext {
    pub fn new(descriptor: EventDescriptor) -> Self {
        Self {
            descriptor,
            sha: None,
            pull_request: None,
            release_body: None,
        }
    }

    pub fn with_sha(mut self, sha: impl Into<String>) -> Self {
        self.sha = Some(sha.into());
        self
    }

    pub fn with_pull_request(mut self, number: u64) -> Self {
        self.pull_request = Some(number);
        self
    }

    pub fn with_release_body(mut self, body: impl Into<String>) -> Self {
        self.release_body = Some(body.into());
        self
    }
}

/// Decode a webhook payload for `event_name`.
///
/// # Errors
///
/// - `EventError::UnknownEventKind`: `event_name` is not a supported kind.
/// - `EventError::UnsupportedSubType`: the payload `action` is not valid for the kind.
/// - `EventError::TagRef`: a push to a tag rather than a branch.
/// - `EventError::MalformedPayload`: the payload lacks a required field.
pub fn decode_event(event_name: &str, payload: &[u8]) -> Result<EventContext, EventError> {
    let kind: EventKind = event_name.parse()?;
    match kind {
        EventKind::Push => decode_push(payload),
        EventKind::PullRequest => decode_pull_request(payload),
        EventKind::PullRequestReview => decode_review(payload),
        EventKind::Release => decode_release(payload),
    }
}

/// Strip `refs/heads/` from a ref, rejecting tag refs.
pub fn branch_from_ref(git_ref: &str) -> Result<String, EventError> {
    if git_ref.starts_with(TAG_REF_PREFIX) {
        return Err(EventError::TagRef(git_ref.to_string()));
    }
    Ok(git_ref
        .strip_prefix(BRANCH_REF_PREFIX)
        .unwrap_or(git_ref)
        .to_string())
}

// ============================================================================
// Raw payload structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawPushPayload {
    #[serde(rename = "ref")]
    git_ref: String,
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPullRequestPayload {
    action: String,
    pull_request: RawPullRequest,
}

#[derive(Debug, Deserialize)]
struct RawReviewPayload {
    action: String,
    review: Option<RawReview>,
    pull_request: RawPullRequest,
}

#[derive(Debug, Deserialize)]
struct RawReview {
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPullRequest {
    number: u64,
    head: RawHead,
}

#[derive(Debug, Deserialize)]
struct RawHead {
    #[serde(rename = "ref")]
    git_ref: String,
    sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawReleasePayload {
    action: String,
    release: RawRelease,
}

#[derive(Debug, Deserialize)]
struct RawRelease {
    target_commitish: Option<String>,
    body: Option<String>,
}

fn parse<'a, T: Deserialize<'a>>(kind: EventKind, payload: &'a [u8]) -> Result<T, EventError> {
    serde_json::from_slice(payload).map_err(|e| EventError::MalformedPayload {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}

fn decode_push(payload: &[u8]) -> Result<EventContext, EventError> {
    let raw: RawPushPayload = parse(EventKind::Push, payload)?;
    let branch = branch_from_ref(&raw.git_ref)?;
    let mut ctx = EventContext::new(EventDescriptor::new(EventKind::Push, branch));
    ctx.sha = raw.after;
    Ok(ctx)
}

fn decode_pull_request(payload: &[u8]) -> Result<EventContext, EventError> {
    let raw: RawPullRequestPayload = parse(EventKind::PullRequest, payload)?;
    let sub_type = EventSubType::parse_for(EventKind::PullRequest, &raw.action)?;
    Ok(pull_request_context(
        EventKind::PullRequest,
        sub_type,
        raw.pull_request,
    ))
}

fn decode_review(payload: &[u8]) -> Result<EventContext, EventError> {
    let raw: RawReviewPayload = parse(EventKind::PullRequestReview, payload)?;
    let approved = raw
        .review
        .as_ref()
        .and_then(|r| r.state.as_deref())
        .is_some_and(|state| state.eq_ignore_ascii_case("approved"));
    let sub_type = if raw.action == "submitted" && approved {
        EventSubType::Approved
    } else {
        EventSubType::parse_for(EventKind::PullRequestReview, &raw.action)?
    };
    Ok(pull_request_context(
        EventKind::PullRequestReview,
        sub_type,
        raw.pull_request,
    ))
}

fn pull_request_context(kind: EventKind, sub_type: EventSubType, pr: RawPullRequest) -> EventContext {
    let mut ctx = EventContext::new(EventDescriptor::new(kind, pr.head.git_ref).with_sub_type(sub_type))
        .with_pull_request(pr.number);
    ctx.sha = pr.head.sha;
    ctx
}

fn decode_release(payload: &[u8]) -> Result<EventContext, EventError> {
    let raw: RawReleasePayload = parse(EventKind::Release, payload)?;
    let sub_type = EventSubType::parse_for(EventKind::Release, &raw.action)?;
    let branch = raw.release.target_commitish.unwrap_or_default();
    let mut ctx =
        EventContext::new(EventDescriptor::new(EventKind::Release, branch).with_sub_type(sub_type));
    ctx.release_body = raw.release.body;
    Ok(ctx)
}
