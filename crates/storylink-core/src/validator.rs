//! Static analysis of a [`RuleTable`].
//!
//! [`validate`] inspects the whole table in one pass and returns a
//! [`ValidationReport`] listing every [`Finding`], each tagged with a
//! [`Severity`]. The validator never repairs the table. Whether findings stop
//! the run is decided separately by [`ValidationReport::enforce`] under a
//! caller-chosen [`FailurePolicy`].
//!
//! Cross-rule overlap compares branch selectors as literal strings: two rules
//! overlap when they share an exact selector, not when their patterns could
//! both accept some branch.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::branch::is_valid_selector_pattern;
use crate::domain::error::ConfigError;
use crate::domain::event::{EventKind, EventSubType};
use crate::domain::rule::{RuleEntry, RuleTable, UnrecognizedEvent};

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

/// How serious a finding is. Ordered `Advisory < Warning < Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Wasteful but harmless; never blocks.
    Advisory,
    /// Ambiguous routing; blocks only under `AbortOnWarning`.
    Warning,
    /// Malformed configuration.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Advisory => "advisory",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// What a finding is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FindingKind {
    /// The table has no entries at all.
    EmptyTable,
    /// An entry has no event selectors.
    EmptyEvents,
    /// `events[position].eventName` is empty or not a supported kind.
    UnknownEvent { position: usize, name: String },
    /// `events[position]` names a sub-type that does not exist.
    UnsupportedSubType {
        position: usize,
        kind: EventKind,
        sub_type: String,
    },
    /// The same `(kind, sub_type)` pair appears twice in one entry.
    DuplicateEvent {
        kind: EventKind,
        sub_type: Option<EventSubType>,
    },
    /// A sub-type that does not exist for its kind (e.g. `push` / `opened`).
    SubTypeNotApplicable {
        kind: EventKind,
        sub_type: EventSubType,
    },
    /// An entry has no branch selectors.
    EmptyBranches,
    /// A branch selector is empty or whitespace.
    BlankBranch { position: usize },
    /// The same branch selector appears twice in one entry.
    DuplicateBranch { branch: String },
    /// A branch selector is not a valid pattern and can only match literally.
    InvalidBranchPattern { branch: String },
    /// An entry has no (or a blank) target id.
    MissingTarget,
    /// Two entries accept the same traffic but route it to different targets.
    AmbiguousRoute { other: usize, branches: Vec<String> },
    /// Two entries accept the same traffic and route it to the same target.
    RedundantRoute { other: usize, branches: Vec<String> },
}

impl FindingKind {
    pub fn severity(&self) -> Severity {
        match self {
            FindingKind::AmbiguousRoute { .. } => Severity::Warning,
            FindingKind::RedundantRoute { .. } | FindingKind::InvalidBranchPattern { .. } => {
                Severity::Advisory
            }
            _ => Severity::Error,
        }
    }
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Index of the offending entry (`None` for table-level findings).
    pub rule: Option<usize>,
    pub severity: Severity,
    pub kind: FindingKind,
    /// Human-readable explanation naming the rule and field.
    pub message: String,
}

impl Finding {
    fn new(rule: Option<usize>, kind: FindingKind, message: String) -> Self {
        Self {
            rule,
            severity: kind.severity(),
            kind,
            message,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// What to do with findings once they are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Log every finding and continue.
    LogOnly,
    /// Fail when any `Error` finding exists.
    AbortOnError,
    /// Fail when any `Error` or `Warning` finding exists.
    #[default]
    AbortOnWarning,
}

impl FailurePolicy {
    /// Lowest severity that fails the run, if any.
    pub fn threshold(&self) -> Option<Severity> {
        match self {
            FailurePolicy::LogOnly => None,
            FailurePolicy::AbortOnError => Some(Severity::Error),
            FailurePolicy::AbortOnWarning => Some(Severity::Warning),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "log-only" => Ok(FailurePolicy::LogOnly),
            "abort-on-error" => Ok(FailurePolicy::AbortOnError),
            "abort-on-warning" => Ok(FailurePolicy::AbortOnWarning),
            other => Err(format!(
                "unknown failure policy '{other}' (expected log-only, abort-on-error or abort-on-warning)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Every finding produced by one validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub findings: Vec<Finding>,
}

impl ValidationReport {
    /// Whether there are no findings at all.
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    /// Whether any finding is an `Error`.
    pub fn has_errors(&self) -> bool {
        self.worst() == Some(Severity::Error)
    }

    /// The most serious severity present.
    pub fn worst(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }

    /// Findings at or above `severity`.
    pub fn at_least(&self, severity: Severity) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.severity >= severity)
    }

    /// Findings about the entry at `rule`.
    pub fn for_rule(&self, rule: usize) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.rule == Some(rule))
    }

    /// Log every finding and apply `policy`.
    ///
    /// # Errors
    ///
    /// `ConfigError::Rejected` when a finding reaches the policy's threshold.
    pub fn enforce(&self, policy: FailurePolicy) -> Result<(), ConfigError> {
        for finding in &self.findings {
            match finding.severity {
                Severity::Error => tracing::error!(rule = ?finding.rule, "{}", finding.message),
                Severity::Warning => tracing::warn!(rule = ?finding.rule, "{}", finding.message),
                Severity::Advisory => tracing::info!(rule = ?finding.rule, "{}", finding.message),
            }
        }

        let Some(threshold) = policy.threshold() else {
            return Ok(());
        };
        let blocking: Vec<&Finding> = self.at_least(threshold).collect();
        if blocking.is_empty() {
            return Ok(());
        }
        Err(ConfigError::Rejected {
            count: blocking.len(),
            threshold: threshold.to_string(),
            summary: blocking
                .iter()
                .map(|f| f.message.as_str())
                .collect::<Vec<_>>()
                .join("; "),
        })
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Validate `table`, reporting every finding across the whole table.
pub fn validate(table: &RuleTable) -> ValidationReport {
    let mut findings = Vec::new();

    if table.is_empty() {
        findings.push(Finding::new(
            None,
            FindingKind::EmptyTable,
            "rule table has no entries (validEvents is missing or empty)".to_string(),
        ));
        return ValidationReport { findings };
    }

    for (index, entry) in table.iter().enumerate() {
        check_entry(index, entry, &mut findings);
    }

    for (i, a) in table.iter().enumerate() {
        for (j, b) in table.iter().enumerate().skip(i + 1) {
            if let Some(f) = check_pair(i, a, j, b) {
                findings.push(f);
            }
        }
    }

    ValidationReport { findings }
}

fn check_entry(index: usize, entry: &RuleEntry, findings: &mut Vec<Finding>) {
    if entry.events.is_empty() && entry.unrecognized_events.is_empty() {
        findings.push(Finding::new(
            Some(index),
            FindingKind::EmptyEvents,
            format!("rule #{index}: events is empty"),
        ));
    }

    for bad in &entry.unrecognized_events {
        findings.push(match bad {
            UnrecognizedEvent::Kind { position, name } => Finding::new(
                Some(index),
                FindingKind::UnknownEvent {
                    position: *position,
                    name: name.clone(),
                },
                format!("rule #{index}: events[{position}].eventName '{name}' is not a supported event"),
            ),
            UnrecognizedEvent::SubType {
                position,
                kind,
                name,
            } => Finding::new(
                Some(index),
                FindingKind::UnsupportedSubType {
                    position: *position,
                    kind: *kind,
                    sub_type: name.clone(),
                },
                format!(
                    "rule #{index}: events[{position}] event type '{name}' is not supported for '{kind}'"
                ),
            ),
        });
    }

    let mut seen_pairs = HashSet::new();
    let mut reported_pairs = HashSet::new();
    for selector in &entry.events {
        for sub_type in &selector.sub_types {
            if !selector.kind.accepts(*sub_type) {
                findings.push(Finding::new(
                    Some(index),
                    FindingKind::SubTypeNotApplicable {
                        kind: selector.kind,
                        sub_type: *sub_type,
                    },
                    format!(
                        "rule #{index}: event type '{sub_type}' does not exist for '{}'",
                        selector.kind
                    ),
                ));
            }
        }
        for pair in selector.pairs() {
            if !seen_pairs.insert(pair) && reported_pairs.insert(pair) {
                findings.push(Finding::new(
                    Some(index),
                    FindingKind::DuplicateEvent {
                        kind: pair.0,
                        sub_type: pair.1,
                    },
                    format!(
                        "rule #{index}: event '{}' is listed more than once",
                        describe_pair(pair)
                    ),
                ));
            }
        }
    }

    if entry.branches.is_empty() {
        findings.push(Finding::new(
            Some(index),
            FindingKind::EmptyBranches,
            format!("rule #{index}: branches is missing or empty"),
        ));
    }

    let mut seen_branches = HashSet::new();
    let mut reported_branches = HashSet::new();
    for (position, branch) in entry.branches.iter().enumerate() {
        if branch.trim().is_empty() {
            findings.push(Finding::new(
                Some(index),
                FindingKind::BlankBranch { position },
                format!("rule #{index}: branches[{position}] is blank"),
            ));
            continue;
        }
        if !seen_branches.insert(branch.as_str()) {
            if reported_branches.insert(branch.as_str()) {
                findings.push(Finding::new(
                    Some(index),
                    FindingKind::DuplicateBranch {
                        branch: branch.clone(),
                    },
                    format!("rule #{index}: branch '{branch}' is listed more than once"),
                ));
            }
            continue;
        }
        if !is_valid_selector_pattern(branch) {
            findings.push(Finding::new(
                Some(index),
                FindingKind::InvalidBranchPattern {
                    branch: branch.clone(),
                },
                format!(
                    "rule #{index}: branch '{branch}' is not a valid pattern and only matches literally"
                ),
            ));
        }
    }

    if entry.target().is_none() {
        findings.push(Finding::new(
            Some(index),
            FindingKind::MissingTarget,
            format!("rule #{index}: columnId is missing"),
        ));
    }
}

fn check_pair(i: usize, a: &RuleEntry, j: usize, b: &RuleEntry) -> Option<Finding> {
    let (target_a, target_b) = (a.target()?, b.target()?);

    let shared_event = a
        .events
        .iter()
        .find_map(|ea| b.events.iter().find(|eb| ea.overlaps(eb)).map(|_| ea.kind))?;

    let mut shared_branches: Vec<String> = Vec::new();
    for branch in &a.branches {
        if !branch.trim().is_empty() && b.branches.contains(branch) && !shared_branches.contains(branch)
        {
            shared_branches.push(branch.clone());
        }
    }
    if shared_branches.is_empty() {
        return None;
    }

    let branches = shared_branches
        .iter()
        .map(|b| format!("'{b}'"))
        .collect::<Vec<_>>()
        .join(", ");

    Some(if target_a == target_b {
        Finding::new(
            Some(i),
            FindingKind::RedundantRoute {
                other: j,
                branches: shared_branches,
            },
            format!(
                "rules #{i} and #{j} both route '{shared_event}' on {branches} to column {target_a}"
            ),
        )
    } else {
        Finding::new(
            Some(i),
            FindingKind::AmbiguousRoute {
                other: j,
                branches: shared_branches,
            },
            format!(
                "rules #{i} and #{j} both match '{shared_event}' on {branches} but target different columns ({target_a} vs {target_b}); rule #{i} wins"
            ),
        )
    })
}

fn describe_pair(pair: (EventKind, Option<EventSubType>)) -> String {
    match pair.1 {
        Some(sub_type) => format!("{}/{}", pair.0, sub_type),
        None => pair.0.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rule::EventSelector;

    fn push_rule(target: &str, branch: &str) -> RuleEntry {
        RuleEntry::new(target)
            .with_event(EventSelector::new(EventKind::Push))
            .with_branch(branch)
    }

    #[test]
    fn empty_table_is_an_error() {
        let report = validate(&RuleTable::default());
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].kind, FindingKind::EmptyTable);
        assert!(report.has_errors());
    }

    #[test]
    fn disjoint_rules_are_clean() {
        let table = RuleTable::new(vec![push_rule("1", "main"), push_rule("2", "staging")]);
        assert!(validate(&table).is_clean());
    }

    #[test]
    fn same_target_on_disjoint_rules_is_clean() {
        let table = RuleTable::new(vec![push_rule("1", "main"), push_rule("1", "staging")]);
        assert!(validate(&table).is_clean());
    }

    #[test]
    fn overlap_with_different_targets_is_a_warning() {
        let table = RuleTable::new(vec![push_rule("1", "main"), push_rule("2", "main")]);
        let report = validate(&table);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.worst(), Some(Severity::Warning));
        assert!(matches!(
            report.findings[0].kind,
            FindingKind::AmbiguousRoute { other: 1, .. }
        ));
        assert!(report.findings[0].message.contains("rule #0 wins"));
    }

    #[test]
    fn overlap_with_same_target_is_advisory() {
        let table = RuleTable::new(vec![push_rule("1", "main"), push_rule("1", "main")]);
        let report = validate(&table);
        assert_eq!(report.worst(), Some(Severity::Advisory));
        assert!(report.enforce(FailurePolicy::AbortOnWarning).is_ok());
    }

    #[test]
    fn duplicate_event_pair_is_reported_once() {
        let entry = push_rule("1", "main")
            .with_event(EventSelector::new(EventKind::Push))
            .with_event(EventSelector::new(EventKind::Push));
        let report = validate(&RuleTable::new(vec![entry]));
        let dups: Vec<_> = report
            .findings
            .iter()
            .filter(|f| matches!(f.kind, FindingKind::DuplicateEvent { .. }))
            .collect();
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].rule, Some(0));
    }

    #[test]
    fn repeated_sub_type_is_a_duplicate_event() {
        let entry = RuleEntry::new("1")
            .with_event(
                EventSelector::new(EventKind::PullRequest)
                    .with_sub_type(EventSubType::Opened)
                    .with_sub_type(EventSubType::Opened),
            )
            .with_branch("main");
        let report = validate(&RuleTable::new(vec![entry]));
        assert!(report.findings.iter().any(|f| f.kind
            == FindingKind::DuplicateEvent {
                kind: EventKind::PullRequest,
                sub_type: Some(EventSubType::Opened),
            }));
    }

    #[test]
    fn sub_type_for_wrong_kind_is_an_error() {
        let entry = RuleEntry::new("1")
            .with_event(EventSelector::new(EventKind::Push).with_sub_type(EventSubType::Opened))
            .with_branch("main");
        let report = validate(&RuleTable::new(vec![entry]));
        assert!(report
            .findings
            .iter()
            .any(|f| matches!(f.kind, FindingKind::SubTypeNotApplicable { .. })));
    }

    #[test]
    fn branch_problems_are_all_reported() {
        let entry = RuleEntry::new("1")
            .with_event(EventSelector::new(EventKind::Push))
            .with_branch("main")
            .with_branch("")
            .with_branch("main")
            .with_branch("main")
            .with_branch("release/(");
        let report = validate(&RuleTable::new(vec![entry]));
        let kinds: Vec<_> = report.findings.iter().map(|f| f.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                FindingKind::BlankBranch { position: 1 },
                FindingKind::DuplicateBranch {
                    branch: "main".to_string()
                },
                FindingKind::InvalidBranchPattern {
                    branch: "release/(".to_string()
                },
            ]
        );
    }

    #[test]
    fn missing_shape_reports_every_problem() {
        let report = validate(&RuleTable::new(vec![RuleEntry::default()]));
        let kinds: Vec<_> = report.findings.iter().map(|f| f.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                FindingKind::EmptyEvents,
                FindingKind::EmptyBranches,
                FindingKind::MissingTarget
            ]
        );
    }

    #[test]
    fn unrecognized_events_are_reported_for_every_rule() {
        let table = RuleTable::from_json_str(
            r#"{"validEvents": [
                {"events": [{"eventName": ""}], "branches": ["main"], "columnId": "1"},
                {"events": [{"eventName": "pull_request", "eventTypes": ["labeled"]}], "branches": ["main"]}
            ]}"#,
        )
        .unwrap();
        let report = validate(&table);

        let kinds = |rule| report.for_rule(rule).map(|f| f.kind.clone()).collect::<Vec<_>>();
        assert_eq!(
            kinds(0),
            vec![FindingKind::UnknownEvent {
                position: 0,
                name: String::new()
            }]
        );
        assert_eq!(
            kinds(1),
            vec![
                FindingKind::UnsupportedSubType {
                    position: 0,
                    kind: EventKind::PullRequest,
                    sub_type: "labeled".to_string()
                },
                FindingKind::MissingTarget
            ]
        );
        assert!(report.findings[0].message.contains("rule #0: events[0].eventName"));
        assert!(report.enforce(FailurePolicy::AbortOnError).is_err());
    }

    #[test]
    fn policy_thresholds() {
        let table = RuleTable::new(vec![push_rule("1", "main"), push_rule("2", "main")]);
        let report = validate(&table);
        assert!(report.enforce(FailurePolicy::LogOnly).is_ok());
        assert!(report.enforce(FailurePolicy::AbortOnError).is_ok());
        let err = report.enforce(FailurePolicy::AbortOnWarning).unwrap_err();
        assert!(matches!(err, ConfigError::Rejected { count: 1, .. }));
    }

    #[test]
    fn policy_parses_from_kebab_case() {
        assert_eq!("log-only".parse::<FailurePolicy>(), Ok(FailurePolicy::LogOnly));
        assert_eq!(
            "abort-on-error".parse::<FailurePolicy>(),
            Ok(FailurePolicy::AbortOnError)
        );
        assert!("strict".parse::<FailurePolicy>().is_err());
        assert_eq!(FailurePolicy::default(), FailurePolicy::AbortOnWarning);
    }
}
