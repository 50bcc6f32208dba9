//! Event kinds, sub-types and the normalized event descriptor.
//!
//! Both enums are closed: every boundary that receives untyped input goes
//! through [`EventKind::from_str`] or [`EventSubType::parse_for`], which yield
//! a typed value or an [`EventError`] naming the valid options.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::EventError;

/// Classification of a version-control host lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Push,
    PullRequest,
    PullRequestReview,
    Release,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::Push,
        EventKind::PullRequest,
        EventKind::PullRequestReview,
        EventKind::Release,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Push => "push",
            EventKind::PullRequest => "pull_request",
            EventKind::PullRequestReview => "pull_request_review",
            EventKind::Release => "release",
        }
    }

    /// Sub-types that are meaningful for this kind. Empty for `push`.
    pub fn sub_types(&self) -> &'static [EventSubType] {
        use EventSubType::*;
        match self {
            EventKind::Push => &[],
            EventKind::PullRequest => &[
                Opened,
                Closed,
                Reopened,
                Synchronize,
                Edited,
                ReadyForReview,
                ConvertedToDraft,
            ],
            EventKind::PullRequestReview => &[Submitted, Edited, Dismissed, Approved],
            EventKind::Release => &[Published],
        }
    }

    /// Whether `sub_type` is a valid refinement of this kind.
    pub fn accepts(&self, sub_type: EventSubType) -> bool {
        self.sub_types().contains(&sub_type)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(EventError::MissingKind);
        }
        EventKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| EventError::UnknownEventKind {
                kind: s.to_string(),
                valid: join(EventKind::ALL.iter().map(|k| k.as_str())),
            })
    }
}

/// Refinement of an [`EventKind`] (the webhook `action`).
///
/// Validity depends on the kind, see [`EventKind::sub_types`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSubType {
    Opened,
    Closed,
    Reopened,
    Synchronize,
    Edited,
    ReadyForReview,
    ConvertedToDraft,
    Submitted,
    Dismissed,
    Approved,
    Published,
}

impl EventSubType {
    const ALL: [EventSubType; 11] = [
        EventSubType::Opened,
        EventSubType::Closed,
        EventSubType::Reopened,
        EventSubType::Synchronize,
        EventSubType::Edited,
        EventSubType::ReadyForReview,
        EventSubType::ConvertedToDraft,
        EventSubType::Submitted,
        EventSubType::Dismissed,
        EventSubType::Approved,
        EventSubType::Published,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventSubType::Opened => "opened",
            EventSubType::Closed => "closed",
            EventSubType::Reopened => "reopened",
            EventSubType::Synchronize => "synchronize",
            EventSubType::Edited => "edited",
            EventSubType::ReadyForReview => "ready_for_review",
            EventSubType::ConvertedToDraft => "converted_to_draft",
            EventSubType::Submitted => "submitted",
            EventSubType::Dismissed => "dismissed",
            EventSubType::Approved => "approved",
            EventSubType::Published => "published",
        }
    }

    /// Look up a sub-type by wire name, regardless of kind.
    pub fn from_name(s: &str) -> Option<Self> {
        EventSubType::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Parse `s` as a sub-type of `kind`.
    ///
    /// A name that exists for another kind (e.g. `published` on
    /// `pull_request`) is rejected just like an unknown name.
    pub fn parse_for(kind: EventKind, s: &str) -> Result<Self, EventError> {
        EventSubType::ALL
            .into_iter()
            .find(|t| t.as_str() == s && kind.accepts(*t))
            .ok_or_else(|| EventError::UnsupportedSubType {
                kind: kind.to_string(),
                sub_type: s.to_string(),
                valid: if kind.sub_types().is_empty() {
                    "none".to_string()
                } else {
                    join(kind.sub_types().iter().map(|t| t.as_str()))
                },
            })
    }
}

impl fmt::Display for EventSubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One concrete occurrence: `{kind, sub_type?, branch}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDescriptor {
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<EventSubType>,
    pub branch: String,
}

impl EventDescriptor {
    pub fn new(kind: EventKind, branch: impl Into<String>) -> Self {
        Self {
            kind,
            sub_type: None,
            branch: branch.into(),
        }
    }

    pub fn with_sub_type(mut self, sub_type: EventSubType) -> Self {
        self.sub_type = Some(sub_type);
        self
    }
}

/// An untyped descriptor as it arrives from environment variables or flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEventDescriptor {
    #[serde(default, alias = "eventName")]
    pub kind: Option<String>,
    #[serde(default, alias = "eventType")]
    pub sub_type: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

impl RawEventDescriptor {
    /// Decode into a typed [`EventDescriptor`].
    ///
    /// A missing branch decodes as an empty string; the matcher reports it.
    pub fn decode(&self) -> Result<EventDescriptor, EventError> {
        let kind: EventKind = self.kind.as_deref().unwrap_or_default().parse()?;
        let sub_type = match self.sub_type.as_deref() {
            None | Some("") => None,
            Some(s) => Some(EventSubType::parse_for(kind, s)?),
        };
        Ok(EventDescriptor {
            kind,
            sub_type,
            branch: self.branch.clone().unwrap_or_default(),
        })
    }
}

fn join<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.collect::<Vec<_>>().join(", ")
}
