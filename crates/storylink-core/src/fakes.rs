//! In-memory fakes for collaborator traits (testing only)
//!
//! Provides `InMemoryHost` and `RecordingTracker` that satisfy the trait
//! contracts without any network access. The CLI's offline `plan` command
//! runs against these too.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::collaborators::{CollaboratorResult, VersionControlHost, WorkTracker};
use crate::domain::error::CollaboratorError;
use crate::domain::rule::TargetId;
use crate::marker::StoryId;

// ---------------------------------------------------------------------------
// InMemoryHost
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct PullRequestState {
    title: String,
    commit_messages: Vec<String>,
}

/// In-memory version-control host.
///
/// Operations named via [`InMemoryHost::fail_on`] return
/// `CollaboratorError::Request` instead of data.
#[derive(Debug, Default)]
pub struct InMemoryHost {
    commits: HashMap<String, String>,
    commit_pull_requests: HashMap<String, Vec<u64>>,
    pull_requests: Mutex<HashMap<u64, PullRequestState>>,
    release_body: Option<String>,
    failing: HashSet<String>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_commit(mut self, sha: impl Into<String>, message: impl Into<String>) -> Self {
        self.commits.insert(sha.into(), message.into());
        self
    }

    /// Pull requests containing the commit at `sha`.
    pub fn with_pull_requests(mut self, sha: impl Into<String>, numbers: Vec<u64>) -> Self {
        self.commit_pull_requests.insert(sha.into(), numbers);
        self
    }

    pub fn with_pull_request(
        self,
        number: u64,
        title: impl Into<String>,
        commit_messages: &[&str],
    ) -> Self {
        self.pull_requests.lock().unwrap().insert(
            number,
            PullRequestState {
                title: title.into(),
                commit_messages: commit_messages.iter().map(|m| m.to_string()).collect(),
            },
        );
        self
    }

    pub fn with_release_body(mut self, body: impl Into<String>) -> Self {
        self.release_body = Some(body.into());
        self
    }

    /// Make `operation` (a trait method name) fail.
    pub fn fail_on(mut self, operation: impl Into<String>) -> Self {
        self.failing.insert(operation.into());
        self
    }

    /// Current title of pull request `number`.
    pub fn title(&self, number: u64) -> Option<String> {
        self.pull_requests
            .lock()
            .unwrap()
            .get(&number)
            .map(|pr| pr.title.clone())
    }

    fn check(&self, operation: &str) -> CollaboratorResult<()> {
        if self.failing.contains(operation) {
            return Err(CollaboratorError::request(operation, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl VersionControlHost for InMemoryHost {
    async fn commit_message(&self, sha: &str) -> CollaboratorResult<String> {
        self.check("commit_message")?;
        self.commits
            .get(sha)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound(format!("commit {sha}")))
    }

    async fn pull_requests_for_commit(&self, sha: &str) -> CollaboratorResult<Vec<u64>> {
        self.check("pull_requests_for_commit")?;
        Ok(self.commit_pull_requests.get(sha).cloned().unwrap_or_default())
    }

    async fn pull_request_commit_messages(&self, number: u64) -> CollaboratorResult<Vec<String>> {
        self.check("pull_request_commit_messages")?;
        self.pull_requests
            .lock()
            .unwrap()
            .get(&number)
            .map(|pr| pr.commit_messages.clone())
            .ok_or_else(|| CollaboratorError::NotFound(format!("pull request #{number}")))
    }

    async fn latest_release_body(&self) -> CollaboratorResult<Option<String>> {
        self.check("latest_release_body")?;
        Ok(self.release_body.clone())
    }

    async fn pull_request_title(&self, number: u64) -> CollaboratorResult<String> {
        self.check("pull_request_title")?;
        self.title(number)
            .ok_or_else(|| CollaboratorError::NotFound(format!("pull request #{number}")))
    }

    async fn update_pull_request_title(&self, number: u64, title: &str) -> CollaboratorResult<()> {
        self.check("update_pull_request_title")?;
        let mut prs = self.pull_requests.lock().unwrap();
        let pr = prs
            .get_mut(&number)
            .ok_or_else(|| CollaboratorError::NotFound(format!("pull request #{number}")))?;
        pr.title = title.to_string();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingTracker
// ---------------------------------------------------------------------------

/// Work tracker that records every successful move.
#[derive(Debug, Default)]
pub struct RecordingTracker {
    moves: Mutex<Vec<(StoryId, TargetId)>>,
    failing: HashSet<StoryId>,
}

impl RecordingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make moves of `story` fail.
    pub fn fail_story(mut self, story: StoryId) -> Self {
        self.failing.insert(story);
        self
    }

    /// Successful moves, in completion order.
    pub fn moves(&self) -> Vec<(StoryId, TargetId)> {
        self.moves.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkTracker for RecordingTracker {
    async fn move_story(&self, story: StoryId, target: &TargetId) -> CollaboratorResult<()> {
        if self.failing.contains(&story) {
            return Err(CollaboratorError::request(
                "move_story",
                format!("story {story} rejected"),
            ));
        }
        self.moves.lock().unwrap().push((story, target.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn host_updates_titles() {
        let host = InMemoryHost::new().with_pull_request(1, "Title", &["a"]);
        host.update_pull_request_title(1, "Title [sc-1]").await.unwrap();
        assert_eq!(host.pull_request_title(1).await.unwrap(), "Title [sc-1]");
    }

    #[tokio::test]
    async fn host_injects_failures() {
        let host = InMemoryHost::new()
            .with_commit("abc", "msg")
            .fail_on("commit_message");
        let err = host.commit_message("abc").await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Request { .. }));
    }

    #[tokio::test]
    async fn unknown_commit_is_not_found() {
        let err = InMemoryHost::new().commit_message("nope").await.unwrap_err();
        assert!(matches!(err, CollaboratorError::NotFound(_)));
    }

    #[tokio::test]
    async fn tracker_records_and_fails() {
        let tracker = RecordingTracker::new().fail_story(StoryId(2));
        tracker.move_story(StoryId(1), &"7".into()).await.unwrap();
        assert!(tracker.move_story(StoryId(2), &"7".into()).await.is_err());
        assert_eq!(tracker.moves(), vec![(StoryId(1), TargetId::new("7"))]);
    }
}
