//! Domain models for storylink.
//!
//! Canonical definitions for the core entities:
//! - `EventKind` / `EventSubType` / `EventDescriptor`: a normalized host event
//! - `RuleEntry` / `RuleTable`: the declarative event-to-target mapping
//! - `StorylinkError`: the error taxonomy shared by every module

pub mod error;
pub mod event;
pub mod rule;

// Re-export main types and errors
pub use error::{
    CollaboratorError, ConfigError, EventError, MatchError, PatternError, Result, StorylinkError,
};
pub use event::{EventDescriptor, EventKind, EventSubType, RawEventDescriptor};
pub use rule::{EventSelector, RuleEntry, RuleTable, TargetId, UnrecognizedEvent};
