//! storylink core library
//!
//! Links version-control host events to work-tracker stories: story ids are
//! found in branch names and `[sc-<id>]` markers, and a declarative rule table
//! decides which workflow column an event moves them to.

pub mod aggregate;
pub mod branch;
pub mod collaborators;
pub mod config;
pub mod domain;
pub mod fakes;
pub mod marker;
pub mod matcher;
pub mod metrics;
pub mod obs;
pub mod sync;
pub mod telemetry;
pub mod validator;
pub mod webhook;

pub use domain::{
    CollaboratorError, ConfigError, EventDescriptor, EventError, EventKind, EventSelector,
    EventSubType, MatchError, PatternError, RawEventDescriptor, Result, RuleEntry, RuleTable,
    StorylinkError, TargetId,
};

pub use aggregate::{aggregate, AggregatedIds, IdentifierSources};
pub use branch::{
    branch_selector_matches, branch_set_matches, BranchIdPattern, DEFAULT_BRANCH_PATTERN,
};
pub use collaborators::{CollaboratorResult, VersionControlHost, WorkTracker};
pub use config::{load_checked, load_rule_table, Settings, DEFAULT_CONFIG_PATH};
pub use marker::{annotate_title, extract_all, extract_one, format_marker, markers, StoryId};
pub use matcher::{entry_matches, resolve_raw, resolve_target, try_resolve, Target};
pub use sync::{StorySync, StoryUpdateFailure, SyncOutcome, SyncReport, TitleUpdate};
pub use validator::{
    validate, FailurePolicy, Finding, FindingKind, Severity, ValidationReport,
};
pub use webhook::{decode_event, EventContext};

pub use metrics::{MetricsSnapshot, METRICS};
pub use obs::{
    emit_config_validated, emit_identifiers_aggregated, emit_story_update_failed,
    emit_story_updated, emit_target_resolved, emit_title_annotated, event_span, EventSpan,
};
pub use telemetry::init_tracing;

/// storylink version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
