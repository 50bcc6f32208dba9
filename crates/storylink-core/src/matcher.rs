//! Event-to-target rule matcher.
//!
//! Scans a [`RuleTable`] in order and returns the target of the **first**
//! entry whose events and branches both accept the descriptor. This is
//! first-match, not best-match: more specific rules must be listed earlier.
//! Ambiguity is detected by [`crate::validator`], never resolved here.

use serde::{Deserialize, Serialize};

use crate::branch::branch_set_matches;
use crate::domain::error::MatchError;
use crate::domain::event::{EventDescriptor, RawEventDescriptor};
use crate::domain::rule::{RuleEntry, RuleTable, TargetId};

/// The matched rule's target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Position of the matching entry in the table.
    pub rule_index: usize,
}

/// Whether `entry` accepts `descriptor`.
///
/// Entries without a target never match. Selectors naming a sub-type that
/// does not exist for their kind, and blank branch selectors, are ignored, so
/// an entry made only of those never matches either.
pub fn entry_matches(entry: &RuleEntry, descriptor: &EventDescriptor) -> bool {
    entry.target().is_some()
        && entry
            .events
            .iter()
            .filter(|e| e.is_well_formed())
            .any(|e| e.accepts(descriptor.kind, descriptor.sub_type))
        && branch_set_matches(&entry.branches, &descriptor.branch)
}

/// Resolve the target for `descriptor`, surfacing precondition failures.
///
/// # Errors
///
/// - `MatchError::MissingBranch`: `descriptor.branch` is empty or blank.
pub fn try_resolve(
    descriptor: &EventDescriptor,
    table: &RuleTable,
) -> Result<Option<Target>, MatchError> {
    if descriptor.branch.trim().is_empty() {
        return Err(MatchError::MissingBranch);
    }

    Ok(table
        .iter()
        .enumerate()
        .find(|(_, entry)| entry_matches(entry, descriptor))
        .and_then(|(rule_index, entry)| {
            entry.target().map(|id| Target {
                id: id.clone(),
                name: entry.target_name.clone(),
                rule_index,
            })
        }))
}

/// Resolve the target for `descriptor`.
///
/// Precondition failures are reported via `tracing::error!` and yield `None`,
/// leaving the caller to decide whether a missing target is fatal.
pub fn resolve_target(descriptor: &EventDescriptor, table: &RuleTable) -> Option<Target> {
    match try_resolve(descriptor, table) {
        Ok(target) => target,
        Err(e) => {
            tracing::error!(kind = %descriptor.kind, error = %e, "cannot resolve target");
            None
        }
    }
}

/// Decode an untyped descriptor and resolve its target.
///
/// Unrecognized kinds or sub-types are reported and yield `None`.
pub fn resolve_raw(raw: &RawEventDescriptor, table: &RuleTable) -> Option<Target> {
    match raw.decode() {
        Ok(descriptor) => resolve_target(&descriptor, table),
        Err(e) => {
            tracing::error!(error = %e, "unrecognized event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::{EventKind, EventSubType};
    use crate::domain::rule::EventSelector;

    fn table() -> RuleTable {
        RuleTable::new(vec![
            RuleEntry::new("10")
                .with_event(EventSelector::new(EventKind::Push))
                .with_branch("staging"),
            RuleEntry::new("20")
                .with_event(EventSelector::new(EventKind::Push))
                .with_branch("stag"),
        ])
    }

    #[test]
    fn first_match_wins() {
        let target = try_resolve(&EventDescriptor::new(EventKind::Push, "staging"), &table())
            .unwrap()
            .unwrap();
        assert_eq!(target.id, TargetId::new("10"));
        assert_eq!(target.rule_index, 0);
    }

    #[test]
    fn later_rule_matches_when_earlier_does_not() {
        let target = try_resolve(&EventDescriptor::new(EventKind::Push, "stage-2"), &table())
            .unwrap()
            .unwrap();
        assert_eq!(target.id, TargetId::new("20"));
    }

    #[test]
    fn empty_branch_is_missing_branch() {
        let err = try_resolve(&EventDescriptor::new(EventKind::Push, ""), &table()).unwrap_err();
        assert_eq!(err, MatchError::MissingBranch);
        assert_eq!(
            resolve_target(&EventDescriptor::new(EventKind::Push, "  "), &table()),
            None
        );
    }

    #[test]
    fn entry_without_target_is_skipped() {
        let mut table = table();
        table.entries.insert(
            0,
            RuleEntry {
                target_id: None,
                ..RuleEntry::default()
            }
            .with_event(EventSelector::new(EventKind::Push))
            .with_branch("staging"),
        );
        let target = resolve_target(&EventDescriptor::new(EventKind::Push, "staging"), &table)
            .unwrap();
        assert_eq!(target.rule_index, 1);
    }

    #[test]
    fn blank_branch_selector_does_not_shadow_later_rules() {
        let table = RuleTable::new(vec![
            RuleEntry::new("1")
                .with_event(EventSelector::new(EventKind::Push))
                .with_branch(""),
            RuleEntry::new("2")
                .with_event(EventSelector::new(EventKind::Push))
                .with_branch("main"),
        ]);
        let target = try_resolve(&EventDescriptor::new(EventKind::Push, "main"), &table)
            .unwrap()
            .unwrap();
        assert_eq!(target.id, TargetId::new("2"));
        assert_eq!(target.rule_index, 1);
    }

    #[test]
    fn inapplicable_sub_type_selector_is_ignored() {
        let table = RuleTable::new(vec![
            RuleEntry::new("1")
                .with_event(EventSelector::new(EventKind::Push).with_sub_type(EventSubType::Opened))
                .with_branch("main"),
            RuleEntry::new("2")
                .with_event(EventSelector::new(EventKind::Push))
                .with_branch("main"),
        ]);
        let target = resolve_target(&EventDescriptor::new(EventKind::Push, "main"), &table).unwrap();
        assert_eq!(target.rule_index, 1);
    }

    #[test]
    fn rule_with_unrecognized_event_only_matches_its_valid_selectors() {
        let table = RuleTable::from_json_str(
            r#"{"validEvents": [
                {"events": [{"eventName": "pull_request", "eventType": "labeled"}], "branches": ["main"], "columnId": 1},
                {"events": [{"eventName": "deploy"}, {"eventName": "push"}], "branches": ["main"], "columnId": 2},
                {"events": [{"eventName": "pull_request"}], "branches": ["main"], "columnId": 3}
            ]}"#,
        )
        .unwrap();

        let pr = EventDescriptor::new(EventKind::PullRequest, "main").with_sub_type(EventSubType::Opened);
        assert_eq!(resolve_target(&pr, &table).unwrap().rule_index, 2);

        let push = EventDescriptor::new(EventKind::Push, "main");
        assert_eq!(resolve_target(&push, &table).unwrap().rule_index, 1);
    }

    #[test]
    fn unrecognized_raw_event_yields_none() {
        let raw = RawEventDescriptor {
            kind: Some("invalid_event_name".to_string()),
            sub_type: None,
            branch: Some("staging".to_string()),
        };
        assert_eq!(resolve_raw(&raw, &table()), None);
    }

    #[test]
    fn sub_type_mismatch_does_not_match() {
        let table = RuleTable::new(vec![RuleEntry::new("30")
            .with_event(
                EventSelector::new(EventKind::PullRequest).with_sub_type(EventSubType::Opened),
            )
            .with_branch("main")]);
        let closed =
            EventDescriptor::new(EventKind::PullRequest, "main").with_sub_type(EventSubType::Closed);
        assert_eq!(resolve_target(&closed, &table), None);

        let any = EventDescriptor::new(EventKind::PullRequest, "main");
        assert!(resolve_target(&any, &table).is_some());
    }
}
