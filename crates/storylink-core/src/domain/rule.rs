//! Declarative rule table: which work-tracker column an event maps to.
//!
//! The JSON shape is the one rule authors already write:
//!
//! ```json
//! { "validEvents": [
//!     { "events": [{ "eventName": "pull_request", "eventTypes": ["opened"] }],
//!       "branches": ["feature/*"],
//!       "columnId": "500001600" } ] }
//! ```
//!
//! Decoding is deliberately lenient about shape (missing arrays decode as
//! empty, a missing `columnId` as `None`) so that the validator can report
//! every problem at once instead of failing on the first.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::event::{EventKind, EventSubType};

/// Opaque identifier of a work-tracker target (a workflow-state column).
///
/// Accepts either a JSON string or a JSON number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawTargetId")]
pub struct TargetId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTargetId {
    Number(u64),
    Text(String),
}

impl From<RawTargetId> for TargetId {
    fn from(raw: RawTargetId) -> Self {
        match raw {
            RawTargetId::Number(n) => TargetId(n.to_string()),
            RawTargetId::Text(s) => TargetId(s),
        }
    }
}

impl TargetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric form consumed by the tracker's update-story call.
    pub fn as_number(&self) -> Option<u64> {
        self.0.trim().parse().ok()
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for TargetId {
    fn from(n: u64) -> Self {
        TargetId(n.to_string())
    }
}

impl From<&str> for TargetId {
    fn from(s: &str) -> Self {
        TargetId(s.to_string())
    }
}

/// One `(kind, sub-types)` entry of a rule's `events` list.
///
/// An empty `sub_types` list is a wildcard over every sub-type of `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventSelector {
    #[serde(rename = "eventName")]
    pub kind: EventKind,
    #[serde(rename = "eventTypes", skip_serializing_if = "Vec::is_empty")]
    pub sub_types: Vec<EventSubType>,
}

/// An `events` item whose name or sub-type is not recognized.
///
/// Kept on the entry so the validator can report it; the matcher never sees
/// it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnrecognizedEvent {
    /// `eventName` is empty or not a supported kind.
    Kind { position: usize, name: String },
    /// A sub-type name that does not exist for any kind.
    SubType {
        position: usize,
        kind: EventKind,
        name: String,
    },
}

impl UnrecognizedEvent {
    /// Index of the offending item in the rule's `events` list.
    pub fn position(&self) -> usize {
        match self {
            UnrecognizedEvent::Kind { position, .. }
            | UnrecognizedEvent::SubType { position, .. } => *position,
        }
    }
}

/// Selector as written by rule authors; names stay strings until checked.
#[derive(Deserialize)]
struct RawEventSelector {
    #[serde(default, rename = "eventName")]
    kind: String,
    #[serde(default, rename = "eventTypes")]
    sub_types: Vec<String>,
    // Older tables use a single `eventType`.
    #[serde(default, rename = "eventType")]
    sub_type: Option<String>,
}

impl RawEventSelector {
    fn decode(self, position: usize) -> Result<EventSelector, UnrecognizedEvent> {
        let kind: EventKind = self
            .kind
            .parse()
            .map_err(|_| UnrecognizedEvent::Kind {
                position,
                name: self.kind.clone(),
            })?;

        let mut sub_types = Vec::with_capacity(self.sub_types.len() + 1);
        for name in self.sub_type.into_iter().chain(self.sub_types) {
            match EventSubType::from_name(&name) {
                Some(sub_type) => sub_types.push(sub_type),
                None => return Err(UnrecognizedEvent::SubType { position, kind, name }),
            }
        }
        Ok(EventSelector { kind, sub_types })
    }
}

impl EventSelector {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            sub_types: Vec::new(),
        }
    }

    pub fn with_sub_type(mut self, sub_type: EventSubType) -> Self {
        self.sub_types.push(sub_type);
        self
    }

    /// Whether this selector accepts an event of `kind` / `sub_type`.
    ///
    /// An unset sub-type is a wildcard on either side.
    pub fn accepts(&self, kind: EventKind, sub_type: Option<EventSubType>) -> bool {
        if self.kind != kind {
            return false;
        }
        match sub_type {
            None => true,
            Some(s) => self.sub_types.is_empty() || self.sub_types.contains(&s),
        }
    }

    /// Whether some concrete event could satisfy both selectors.
    pub fn overlaps(&self, other: &EventSelector) -> bool {
        self.kind == other.kind
            && (self.sub_types.is_empty()
                || other.sub_types.is_empty()
                || self.sub_types.iter().any(|s| other.sub_types.contains(s)))
    }

    /// Expand into `(kind, sub_type)` pairs; a wildcard yields `(kind, None)`.
    pub fn pairs(&self) -> Vec<(EventKind, Option<EventSubType>)> {
        if self.sub_types.is_empty() {
            vec![(self.kind, None)]
        } else {
            self.sub_types.iter().map(|s| (self.kind, Some(*s))).collect()
        }
    }

    /// Whether every listed sub-type exists for `kind`.
    pub fn is_well_formed(&self) -> bool {
        self.sub_types.iter().all(|s| self.kind.accepts(*s))
    }
}

/// One declarative row mapping events and branches to a target.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawRuleEntry")]
pub struct RuleEntry {
    pub events: Vec<EventSelector>,
    pub branches: Vec<String>,
    #[serde(rename = "columnId", skip_serializing_if = "Option::is_none")]
    pub target_id: Option<TargetId>,
    #[serde(rename = "columnName", skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
    /// `events` items that could not be decoded.
    #[serde(skip_serializing)]
    pub unrecognized_events: Vec<UnrecognizedEvent>,
}

#[derive(Deserialize)]
struct RawRuleEntry {
    #[serde(default)]
    events: Vec<RawEventSelector>,
    #[serde(default)]
    branches: Vec<String>,
    #[serde(default, rename = "columnId", alias = "targetId")]
    target_id: Option<TargetId>,
    #[serde(default, rename = "columnName", alias = "targetName")]
    target_name: Option<String>,
}

impl From<RawRuleEntry> for RuleEntry {
    fn from(raw: RawRuleEntry) -> Self {
        let mut events = Vec::with_capacity(raw.events.len());
        let mut unrecognized_events = Vec::new();
        for (position, selector) in raw.events.into_iter().enumerate() {
            match selector.decode(position) {
                Ok(selector) => events.push(selector),
                Err(bad) => unrecognized_events.push(bad),
            }
        }
        Self {
            events,
            branches: raw.branches,
            target_id: raw.target_id,
            target_name: raw.target_name,
            unrecognized_events,
        }
    }
}

impl RuleEntry {
    pub fn new(target_id: impl Into<TargetId>) -> Self {
        Self {
            target_id: Some(target_id.into()),
            ..Self::default()
        }
    }

    /// Add an event selector (builder pattern).
    pub fn with_event(mut self, selector: EventSelector) -> Self {
        self.events.push(selector);
        self
    }

    /// Add a branch selector (builder pattern).
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branches.push(branch.into());
        self
    }

    pub fn with_target_name(mut self, name: impl Into<String>) -> Self {
        self.target_name = Some(name.into());
        self
    }

    /// The target id, treating a blank id as absent.
    pub fn target(&self) -> Option<&TargetId> {
        self.target_id.as_ref().filter(|id| !id.is_blank())
    }
}

/// Ordered rule table. Order is significant: the first matching entry wins.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuleTable {
    #[serde(default, rename = "validEvents")]
    pub entries: Vec<RuleEntry>,
}

impl RuleTable {
    pub fn new(entries: Vec<RuleEntry>) -> Self {
        Self { entries }
    }

    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn from_json_slice(json: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(json)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RuleEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
