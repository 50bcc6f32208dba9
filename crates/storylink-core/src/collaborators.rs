//! Collaborator trait definitions for storylink
//!
//! The core never talks to the network itself. These traits describe the
//! two external services at their data boundary:
//! - `VersionControlHost`: commits, pull requests, releases and PR titles
//! - `WorkTracker`: moving a story to a workflow-state column
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use async_trait::async_trait;

use crate::domain::error::CollaboratorError;
use crate::domain::rule::TargetId;
use crate::marker::StoryId;

/// Result type for collaborator calls
pub type CollaboratorResult<T> = std::result::Result<T, CollaboratorError>;

// ---------------------------------------------------------------------------
// VersionControlHost
// ---------------------------------------------------------------------------

#[async_trait]
pub trait VersionControlHost: Send + Sync {
    /// Full message of the commit at `sha`.
    async fn commit_message(&self, sha: &str) -> CollaboratorResult<String>;

    /// Numbers of the pull requests that contain the commit at `sha`.
    async fn pull_requests_for_commit(&self, sha: &str) -> CollaboratorResult<Vec<u64>>;

    /// Messages of every commit in pull request `number`, oldest first.
    async fn pull_request_commit_messages(&self, number: u64) -> CollaboratorResult<Vec<String>>;

    /// Body of the latest release. `None` when the release has no body.
    async fn latest_release_body(&self) -> CollaboratorResult<Option<String>>;

    /// Current title of pull request `number`.
    async fn pull_request_title(&self, number: u64) -> CollaboratorResult<String>;

    /// Replace the title of pull request `number`.
    async fn update_pull_request_title(&self, number: u64, title: &str) -> CollaboratorResult<()>;
}

// ---------------------------------------------------------------------------
// WorkTracker
// ---------------------------------------------------------------------------

#[async_trait]
pub trait WorkTracker: Send + Sync {
    /// Move `story` into the workflow-state column `target`.
    async fn move_story(&self, story: StoryId, target: &TargetId) -> CollaboratorResult<()>;
}
